// src/kitchen/archive.rs

//! Release archive extraction
//!
//! Archives are extracted fully into a scratch workdir before any install
//! step runs, so a truncated or hostile archive can never leave a partial
//! install behind.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use xz2::read::XzDecoder;

/// Extract an archive into a destination directory
///
/// Supports: .tar.gz, .tgz, .tar.xz, .txz, .tar
///
/// The tar reader refuses entries that would escape the destination, so
/// `../`-style member names in a crafted archive are rejected rather than
/// written outside the workdir.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let filename = archive.file_name().and_then(|n| n.to_str()).unwrap_or("");

    debug!("Extracting {} to {}", archive.display(), dest.display());

    let file = File::open(archive)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", archive.display(), e)))?;

    if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        unpack_tar(GzDecoder::new(file), dest)
    } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
        unpack_tar(XzDecoder::new(file), dest)
    } else if filename.ends_with(".tar") {
        unpack_tar(file, dest)
    } else {
        Err(Error::ParseError(format!(
            "Unknown archive format: {}",
            filename
        )))
    }
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::IoError(format!("Failed to extract archive: {}", e)))?;
    Ok(())
}

/// Locate the archive root directory
///
/// Release tarballs usually wrap their contents in a single top-level
/// directory (`Keyguard-2.3.3/bin/...`). When the extracted workdir holds
/// exactly one directory and nothing else, plan paths resolve against it;
/// otherwise they resolve against the workdir itself.
pub fn archive_root(workdir: &Path) -> Result<std::path::PathBuf> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(workdir)? {
        entries.push(entry?);
    }

    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        return Ok(entries[0].path());
    }

    Ok(workdir.to_path_buf())
}
