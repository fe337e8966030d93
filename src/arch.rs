// src/arch.rs

//! Target architecture selector
//!
//! Recipes for prebuilt binaries carry one source descriptor per supported
//! CPU architecture. Exactly two are supported; anything else fails before
//! any network or filesystem activity.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported CPU architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    /// Get the architecture name as used in recipe source tables and
    /// release artifact names
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }

    /// All supported architectures, in recipe order
    pub const ALL: [Arch; 2] = [Arch::X86_64, Arch::Aarch64];

    /// Detect the architecture of the running host
    ///
    /// Returns an error when the host CPU is not one of the two supported
    /// targets, so a bad default is caught before any work starts.
    pub fn host() -> crate::Result<Self> {
        std::env::consts::ARCH.parse()
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported() {
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("amd64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Aarch64);
        assert_eq!("arm64".parse::<Arch>().unwrap(), Arch::Aarch64);
    }

    #[test]
    fn test_parse_unsupported() {
        let err = "riscv64".parse::<Arch>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedArch(a) if a == "riscv64"));
    }

    #[test]
    fn test_display_roundtrip() {
        for arch in Arch::ALL {
            assert_eq!(arch.as_str().parse::<Arch>().unwrap(), arch);
            assert_eq!(format!("{}", arch), arch.as_str());
        }
    }
}
