// src/kitchen/stager.rs

//! Staging-root file placement
//!
//! Executes the install plan's filesystem operations against the staging
//! root. Every destination path goes through traversal validation before
//! anything is written.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Executes install-plan operations under a staging root
pub struct Stager {
    /// Install root directory (e.g. "/" or "/tmp/galley-stage")
    staging_root: PathBuf,
}

impl Stager {
    /// Create a new stager
    pub fn new<P: AsRef<Path>>(staging_root: P) -> Result<Self> {
        let staging_root = staging_root.as_ref().to_path_buf();

        if !staging_root.exists() {
            fs::create_dir_all(&staging_root)?;
            debug!("Created staging root: {:?}", staging_root);
        }

        Ok(Self { staging_root })
    }

    /// Validate and compute a safe target path within the staging root
    ///
    /// Prevents path traversal by:
    /// 1. Normalizing the path to remove `.` and `..` components
    /// 2. Verifying the result stays within the staging root
    ///
    /// Returns an error if the path would escape the staging root.
    pub fn safe_target_path(&self, path: &str) -> Result<PathBuf> {
        let relative_path = path.trim_start_matches('/');

        let mut normalized = PathBuf::new();
        for component in Path::new(relative_path).components() {
            match component {
                Component::Normal(c) => normalized.push(c),
                Component::CurDir => {}
                Component::ParentDir => {
                    warn!("Path traversal attempt detected: {}", path);
                    return Err(Error::InvalidPath(format!(
                        "Path traversal detected: {}",
                        path
                    )));
                }
                Component::Prefix(_) | Component::RootDir => {}
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(Error::InvalidPath("Empty path after normalization".to_string()));
        }

        let target_path = self.staging_root.join(&normalized);

        // Defense in depth: the component walk above already rejects
        // escapes, but verify the join stayed inside anyway.
        if !target_path.starts_with(&self.staging_root) {
            warn!("Path escaped staging root: {} -> {:?}", path, target_path);
            return Err(Error::InvalidPath(format!(
                "Path escapes staging root: {}",
                path
            )));
        }

        Ok(target_path)
    }

    /// Copy a directory tree into the staging root, preserving modes
    ///
    /// Returns the destination directory.
    pub fn copy_tree(&self, from: &Path, to: &str) -> Result<PathBuf> {
        let dest_root = self.safe_target_path(to)?;
        fs::create_dir_all(&dest_root)?;

        for entry in WalkDir::new(from) {
            let entry = entry
                .map_err(|e| Error::IoError(format!("Failed to walk {}: {}", from.display(), e)))?;
            let rel = entry
                .path()
                .strip_prefix(from)
                .map_err(|e| Error::InvalidPath(e.to_string()))?;
            if rel.as_os_str().is_empty() {
                continue;
            }
            let dest = dest_root.join(rel);

            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&dest)?;
            } else if file_type.is_symlink() {
                let target = fs::read_link(entry.path())?;
                if dest.exists() || dest.symlink_metadata().is_ok() {
                    fs::remove_file(&dest)?;
                }
                #[cfg(unix)]
                std::os::unix::fs::symlink(&target, &dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &dest)?;
            }
        }

        info!("Staged tree: {} -> {}", from.display(), dest_root.display());
        Ok(dest_root)
    }

    /// Install a single file with explicit mode bits
    pub fn install_file(&self, from: &Path, to: &str, mode: u32) -> Result<PathBuf> {
        let target_path = self.safe_target_path(to)?;

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if target_path.exists() {
            fs::remove_file(&target_path)?;
        }

        fs::copy(from, &target_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to install {} -> {}: {}",
                from.display(),
                target_path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target_path, fs::Permissions::from_mode(mode))?;
        }

        info!("Staged file: {} (mode: {:o})", to, mode);
        Ok(target_path)
    }

    /// Create a symlink under the staging root
    ///
    /// The link location is validated against the staging root; the target
    /// is stored verbatim, as packaging symlinks point at their final
    /// absolute location (`/opt/...`), not into the staging tree.
    pub fn install_symlink(&self, link: &str, target: &str) -> Result<PathBuf> {
        let link_path = self.safe_target_path(link)?;

        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if link_path.symlink_metadata().is_ok() {
            fs::remove_file(&link_path)?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &link_path)?;

        info!("Staged symlink: {} -> {}", link, target);
        Ok(link_path)
    }

    /// Mark an already staged file executable (mode 755)
    pub fn mark_executable(&self, path: &str) -> Result<PathBuf> {
        let target_path = self.safe_target_path(path)?;

        if !target_path.exists() {
            return Err(Error::MissingFile(format!(
                "Cannot mark executable, not staged: {}",
                path
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target_path, fs::Permissions::from_mode(0o755))?;
        }

        debug!("Marked executable: {}", path);
        Ok(target_path)
    }
}
