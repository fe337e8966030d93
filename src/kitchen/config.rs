// src/kitchen/config.rs

//! Configuration types for the Kitchen

use std::path::{Path, PathBuf};

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Directory for downloaded release archives
    pub source_cache: PathBuf,
    /// Root the install plan is staged into ("/" for a live install)
    pub staging_root: PathBuf,
    /// Keep the extraction workdir after completion (for debugging)
    pub keep_workdir: bool,
    /// Suppress download progress bars
    pub quiet: bool,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            source_cache: PathBuf::from("/var/cache/galley/sources"),
            staging_root: PathBuf::from("/"),
            keep_workdir: false,
            quiet: false,
        }
    }
}

impl KitchenConfig {
    /// Configuration that stages into a directory instead of the live root
    ///
    /// This is how packaging runs work: everything the plan places lands
    /// under `root`, ready to be archived or inspected.
    pub fn staged(root: &Path) -> Self {
        Self {
            staging_root: root.to_path_buf(),
            ..Self::default()
        }
    }
}

/// Result of installing a recipe
#[derive(Debug)]
pub struct InstallReport {
    /// Package name and version that was installed
    pub package: String,
    /// Architecture the archive was fetched for
    pub arch: crate::arch::Arch,
    /// Path to the verified archive in the source cache
    pub archive_path: PathBuf,
    /// Files and directories placed under the staging root, in plan order
    pub installed_paths: Vec<PathBuf>,
    /// Whether the archive came from the cache rather than the network
    pub from_cache: bool,
    /// Warnings generated during the install
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = KitchenConfig::default();
        assert_eq!(config.staging_root, PathBuf::from("/"));
        assert!(!config.keep_workdir);
        assert!(!config.quiet);
    }

    #[test]
    fn test_config_staged() {
        let config = KitchenConfig::staged(Path::new("/tmp/stage"));
        assert_eq!(config.staging_root, PathBuf::from("/tmp/stage"));
        assert_eq!(config.source_cache, KitchenConfig::default().source_cache);
    }
}
