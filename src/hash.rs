// src/hash.rs

//! SHA-256 hashing for artifact integrity
//!
//! Release archives are verified against the checksum declared in the
//! recipe before anything is written under the staging root. SHA-256 is the
//! only algorithm in play: it is what upstream release digests use.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// A validated SHA-256 checksum (64 lowercase hex chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Hex length of a SHA-256 digest
    pub const HEX_LEN: usize = 64;

    /// Validate and normalize a hex digest string
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() != Self::HEX_LEN {
            return Err(Error::ParseError(format!(
                "invalid sha256 length: expected {} hex chars, got {}",
                Self::HEX_LEN,
                value.len()
            )));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::ParseError(format!("invalid hex in sha256: {}", value)));
        }
        Ok(Self(value.to_lowercase()))
    }

    /// Parse a digest that may carry a `sha256:` prefix (GitHub asset
    /// digests and recipe checksums both use this form)
    pub fn parse_prefixed(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("sha256", hex)) => Self::new(hex),
            Some((algo, _)) => Err(Error::ParseError(format!(
                "unsupported checksum algorithm: {} (only sha256)",
                algo
            ))),
            None => Self::new(s),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Sha256Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_prefixed(s)
    }
}

/// Compute the SHA-256 of a byte slice
pub fn sha256_bytes(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Sha256Hash(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA-256 of a reader, streaming in 8 KiB chunks
pub fn sha256_reader<R: Read>(reader: &mut R) -> std::io::Result<Sha256Hash> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Sha256Hash(format!("{:x}", hasher.finalize())))
}

/// Compute the SHA-256 of a file without loading it into memory
pub fn sha256_file(path: &Path) -> Result<Sha256Hash> {
    let mut file = std::fs::File::open(path)?;
    Ok(sha256_reader(&mut file)?)
}

/// Verify bytes against an expected digest
pub fn verify_bytes(data: &[u8], expected: &Sha256Hash) -> Result<()> {
    let actual = sha256_bytes(data);
    if &actual == expected {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Verify a file against an expected digest, streaming the content
pub fn verify_file(path: &Path, expected: &Sha256Hash) -> Result<()> {
    let actual = sha256_file(path)?;
    if &actual == expected {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        let hash = sha256_bytes(b"Hello, World!");
        assert_eq!(
            hash.as_str(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_sha256_reader_matches_bytes() {
        let data = b"streaming and one-shot must agree";
        let mut cursor = std::io::Cursor::new(&data[..]);
        assert_eq!(sha256_reader(&mut cursor).unwrap(), sha256_bytes(data));
    }

    #[test]
    fn test_hash_validation() {
        assert!(
            Sha256Hash::new("dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f")
                .is_ok()
        );
        assert!(Sha256Hash::new("abc123").is_err());
        assert!(
            Sha256Hash::new("gggg6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f")
                .is_err()
        );
    }

    #[test]
    fn test_uppercase_normalized() {
        let upper = "DFFD6021BB2BD5B0AF676290809EC3A53191DD81C7F70A4B28688A362182986F";
        let hash = Sha256Hash::new(upper).unwrap();
        assert_eq!(hash, sha256_bytes(b"Hello, World!"));
    }

    #[test]
    fn test_parse_prefixed() {
        let bare = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";
        let prefixed = format!("sha256:{}", bare);

        assert_eq!(Sha256Hash::parse_prefixed(&prefixed).unwrap().as_str(), bare);
        assert_eq!(Sha256Hash::parse_prefixed(bare).unwrap().as_str(), bare);
        assert!(Sha256Hash::parse_prefixed("md5:abc123").is_err());
    }

    #[test]
    fn test_verify_bytes() {
        let expected = sha256_bytes(b"payload");
        assert!(verify_bytes(b"payload", &expected).is_ok());

        let err = verify_bytes(b"tampered", &expected).unwrap_err();
        match err {
            Error::ChecksumMismatch { expected: e, actual } => {
                assert_eq!(e, expected.to_string());
                assert_eq!(actual, sha256_bytes(b"tampered").to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_verify_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, b"archive content").unwrap();

        let expected = sha256_bytes(b"archive content");
        assert!(verify_file(&path, &expected).is_ok());

        std::fs::write(&path, b"tampered content").unwrap();
        assert!(verify_file(&path, &expected).is_err());
    }
}
