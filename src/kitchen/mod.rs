// src/kitchen/mod.rs

//! Kitchen: where recipes are executed
//!
//! The Kitchen handles the whole packaging pipeline:
//! - Fetching release archives (with a checksum-keyed cache)
//! - Verifying archives against the recipe checksum
//! - Extracting into a scratch workdir
//! - Preflight-checking the install plan against the archive contents
//! - Executing the plan against the staging root
//!
//! # Failure Ordering
//!
//! Nothing is written under the staging root until the archive has been
//! verified, extracted, and every path the plan references has been found
//! in the archive. A recipe that names a file the archive does not contain
//! fails before the first copy, not halfway through.

mod archive;
mod config;
mod stager;

pub use archive::{archive_root, extract_archive};
pub use config::{InstallReport, KitchenConfig};
pub use stager::Stager;

use crate::arch::Arch;
use crate::client::HttpClient;
use crate::desktop;
use crate::error::{Error, Result};
use crate::hash::{self, Sha256Hash};
use crate::recipe::Recipe;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The Kitchen: executes packaging recipes
pub struct Kitchen {
    config: KitchenConfig,
}

impl Kitchen {
    /// Create a new Kitchen with the given configuration
    pub fn new(config: KitchenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Fetch and verify the release archive for one architecture
    ///
    /// Returns the path to the verified archive in the source cache and
    /// whether it was already cached.
    pub fn fetch(&self, recipe: &Recipe, arch: Arch) -> Result<(PathBuf, bool)> {
        let url = recipe.archive_url(arch)?;
        let checksum = recipe.source_for(arch)?.checksum()?;

        info!(
            "Fetching {} {} for {}",
            recipe.package.name, recipe.package.version, arch
        );

        self.fetch_source(&url, &checksum)
    }

    /// Fetch archives for every architecture the recipe supports
    pub fn fetch_all(&self, recipe: &Recipe) -> Result<Vec<PathBuf>> {
        let mut fetched = Vec::new();
        for arch in recipe.architectures() {
            let (path, _) = self.fetch(recipe, arch)?;
            fetched.push(path);
        }
        Ok(fetched)
    }

    /// Check whether the archive for an architecture is already cached
    pub fn source_cached(&self, recipe: &Recipe, arch: Arch) -> Result<bool> {
        let checksum = recipe.source_for(arch)?.checksum()?;
        Ok(self.cached_path(&checksum).exists())
    }

    /// Install a recipe for one architecture into the staging root
    ///
    /// This is the main entry point: fetch, verify, extract, preflight,
    /// then execute the install plan.
    pub fn install(&self, recipe: &Recipe, arch: Arch) -> Result<InstallReport> {
        let mut warnings = Vec::new();

        let (archive_path, from_cache) = self.fetch(recipe, arch)?;

        // Extract into a scratch workdir named after the archive so the
        // kept directory is recognizable when keep_workdir is set.
        let workdir = tempfile::Builder::new()
            .prefix(&format!("galley-{}-", recipe.package.name))
            .tempdir()
            .map_err(|e| Error::IoError(format!("Failed to create workdir: {}", e)))?;

        extract_archive(&archive_path, workdir.path())?;
        let root = archive_root(workdir.path())?;

        // Everything the plan references must exist before the first write
        self.preflight(recipe, &root)?;

        let stager = Stager::new(&self.config.staging_root)?;
        let mut installed_paths = Vec::new();

        for tree in &recipe.install.trees {
            let dest = stager.copy_tree(&root.join(&tree.from), &tree.to)?;
            installed_paths.push(dest);
        }

        for file in &recipe.install.files {
            let dest = stager.install_file(&root.join(&file.from), &file.to, file.mode_bits()?)?;
            installed_paths.push(dest);
        }

        if let Some(exec_path) = &recipe.install.executable {
            stager.mark_executable(exec_path)?;
        }

        for symlink in &recipe.install.symlinks {
            let dest = stager.install_symlink(&symlink.link, &symlink.target)?;
            installed_paths.push(dest);
        }

        if let Some(rule) = &recipe.install.desktop {
            // Preflight guaranteed the plan places this file
            let staged = stager.safe_target_path(&rule.file)?;
            desktop::rewrite_exec_file(&staged, &rule.exec)?;
            info!("Rewrote Exec= in {} to {}", rule.file, rule.exec);
        }

        if self.config.keep_workdir {
            let kept = workdir.keep();
            warnings.push(format!("Workdir kept at {}", kept.display()));
        }

        info!(
            "Installed {} {} ({} paths) into {}",
            recipe.package.name,
            recipe.package.version,
            installed_paths.len(),
            self.config.staging_root.display()
        );

        Ok(InstallReport {
            package: format!("{}-{}", recipe.package.name, recipe.package.version),
            arch,
            archive_path,
            installed_paths,
            from_cache,
            warnings,
        })
    }

    /// Verify every plan source against the extracted archive
    ///
    /// Trees must be directories and files must be regular files; the
    /// executable and desktop-rewrite paths must be producible by the plan.
    fn preflight(&self, recipe: &Recipe, root: &Path) -> Result<()> {
        for tree in &recipe.install.trees {
            let src = root.join(&tree.from);
            if !src.is_dir() {
                return Err(Error::MissingFile(format!(
                    "Archive has no directory {} (wanted for {})",
                    tree.from, tree.to
                )));
            }
        }

        for file in &recipe.install.files {
            let src = root.join(&file.from);
            if !src.is_file() {
                return Err(Error::MissingFile(format!(
                    "Archive has no file {} (wanted for {})",
                    file.from, file.to
                )));
            }
        }

        if let Some(exec_path) = &recipe.install.executable {
            if !self.plan_produces(recipe, root, exec_path) {
                return Err(Error::MissingFile(format!(
                    "Executable {} is not produced by the install plan",
                    exec_path
                )));
            }
        }

        if let Some(rule) = &recipe.install.desktop {
            if !self.plan_produces(recipe, root, &rule.file) {
                return Err(Error::MissingFile(format!(
                    "Desktop rewrite target {} is not produced by the install plan",
                    rule.file
                )));
            }
        }

        debug!("Preflight passed for {}", recipe.package.name);
        Ok(())
    }

    /// Check whether a staged path will exist once the plan has run
    fn plan_produces(&self, recipe: &Recipe, root: &Path, staged: &str) -> bool {
        if recipe.install.files.iter().any(|f| f.to == staged) {
            return true;
        }

        for tree in &recipe.install.trees {
            if let Some(rest) = staged.strip_prefix(&tree.to) {
                let rel = rest.trim_start_matches('/');
                if root.join(&tree.from).join(rel).exists() {
                    return true;
                }
            }
        }

        false
    }

    fn cached_path(&self, checksum: &Sha256Hash) -> PathBuf {
        self.config.source_cache.join(checksum.as_str())
    }

    /// Fetch a release archive (with caching)
    ///
    /// The cache is keyed by the expected checksum, so a version bump in
    /// the recipe naturally misses the cache. Local paths and `file://`
    /// URLs are copied into the cache instead of downloaded, which also
    /// gives offline installs from pre-fetched archives.
    fn fetch_source(&self, url: &str, checksum: &Sha256Hash) -> Result<(PathBuf, bool)> {
        fs::create_dir_all(&self.config.source_cache)?;

        let cached = self.cached_path(checksum);

        if cached.exists() {
            debug!("Using cached archive: {}", cached.display());
            match hash::verify_file(&cached, checksum) {
                Ok(()) => return Ok((cached, true)),
                Err(Error::ChecksumMismatch { .. }) => {
                    warn!("Cached archive checksum mismatch, refetching");
                    fs::remove_file(&cached)?;
                }
                Err(e) => return Err(e),
            }
        }

        let temp_path = self
            .config
            .source_cache
            .join(format!("{}.tmp", checksum.as_str()));

        if let Some(local) = local_source(url) {
            debug!("Copying local archive: {}", local.display());
            fs::copy(&local, &temp_path).map_err(|e| {
                Error::DownloadError(format!("Failed to read {}: {}", local.display(), e))
            })?;
        } else {
            info!("Downloading: {}", url);
            let client = if self.config.quiet {
                HttpClient::quiet()?
            } else {
                HttpClient::new()?
            };
            client.download_to_file(url, &temp_path)?;
        }

        // A mismatched archive never reaches the cache
        if let Err(e) = hash::verify_file(&temp_path, checksum) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &cached)?;
        Ok((cached, false))
    }
}

/// Interpret a source URL as a local filesystem path if it is one
fn local_source(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if !url.contains("://") {
        return Some(PathBuf::from(url));
    }
    None
}
