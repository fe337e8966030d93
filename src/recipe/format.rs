// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files that describe how to package a prebuilt binary
//! release: where to fetch the release archive for each supported CPU
//! architecture, the checksum it must match, and a fixed install plan that
//! places the archive's contents into the staging root.
//!
//! Unlike a source build recipe there are no build steps: the plan is purely
//! declarative (tree copies, single files with mode bits, symlinks, and at
//! most one desktop-file `Exec=` rewrite), read once and executed once.

use crate::arch::Arch;
use crate::error::{Error, Result};
use crate::hash::Sha256Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete recipe for packaging a prebuilt binary release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    pub package: PackageSection,

    /// Variables for substitution (optional)
    ///
    /// Used alongside the built-ins `%(name)s`, `%(version)s`, `%(release)s`
    /// and `%(arch)s`. Upstreams that tag releases independently of the
    /// artifact version keep the tag here (e.g. `release_tag`).
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// One source descriptor per supported architecture
    ///
    /// Keyed by architecture name (`x86_64`, `aarch64`). An architecture
    /// without an entry is unsupported and fails before download.
    #[serde(default)]
    pub source: BTreeMap<Arch, SourceSection>,

    /// The install plan
    pub install: InstallSection,
}

impl Recipe {
    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s` patterns with their values from:
    /// 1. Built-in variables (name, version, release, arch)
    /// 2. Custom variables from the [variables] section
    pub fn substitute(&self, template: &str, arch: Arch) -> String {
        let mut result = template.to_string();

        result = result.replace("%(name)s", &self.package.name);
        result = result.replace("%(version)s", &self.package.version);
        result = result.replace("%(release)s", &self.package.release);
        result = result.replace("%(arch)s", arch.as_str());

        for (key, value) in &self.variables {
            result = result.replace(&format!("%({})s", key), value);
        }

        result
    }

    /// Look up the source descriptor for an architecture
    pub fn source_for(&self, arch: Arch) -> Result<&SourceSection> {
        self.source
            .get(&arch)
            .ok_or_else(|| Error::UnsupportedArch(arch.to_string()))
    }

    /// Get the archive URL for an architecture with variables substituted
    pub fn archive_url(&self, arch: Arch) -> Result<String> {
        Ok(self.substitute(&self.source_for(arch)?.url, arch))
    }

    /// Get the archive filename from the resolved URL
    pub fn archive_filename(&self, arch: Arch) -> Result<String> {
        let url = self.archive_url(arch)?;
        Ok(url
            .split('/')
            .next_back()
            .unwrap_or("release.tar.gz")
            .to_string())
    }

    /// Architectures this recipe supports
    pub fn architectures(&self) -> Vec<Arch> {
        self.source.keys().copied().collect()
    }
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Package version
    pub version: String,

    /// Release number (for repackagings of the same version)
    #[serde(default = "default_release")]
    pub release: String,

    /// Short description
    #[serde(default)]
    pub description: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,

    /// Homepage URL
    #[serde(default)]
    pub homepage: Option<String>,

    /// Runtime dependencies
    #[serde(default)]
    pub depends: Vec<String>,

    /// Package names this recipe provides
    #[serde(default)]
    pub provides: Vec<String>,

    /// Package names this recipe conflicts with
    #[serde(default)]
    pub conflicts: Vec<String>,

    /// Packaging options (e.g. `!strip` for prebuilt binaries)
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_release() -> String {
    "1".to_string()
}

/// Source descriptor for one architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Download URL for the release archive
    ///
    /// Supports `%(version)s` and friends.
    pub url: String,

    /// SHA-256 checksum the downloaded archive must match exactly
    pub sha256: String,
}

impl SourceSection {
    /// Parse the declared checksum (accepts bare hex or `sha256:` prefix)
    pub fn checksum(&self) -> Result<Sha256Hash> {
        Sha256Hash::parse_prefixed(&self.sha256)
    }
}

/// The install plan: a fixed list of filesystem operations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstallSection {
    /// Directory trees copied verbatim from the archive
    #[serde(default)]
    pub trees: Vec<TreeEntry>,

    /// Single files installed with explicit mode bits
    #[serde(default)]
    pub files: Vec<FileEntry>,

    /// Symlinks to create under the staging root
    #[serde(default)]
    pub symlinks: Vec<SymlinkEntry>,

    /// Path (under the staging root) marked executable after the copies
    #[serde(default)]
    pub executable: Option<String>,

    /// Desktop-file `Exec=` rewrite rule
    #[serde(default)]
    pub desktop: Option<DesktopRule>,
}

impl InstallSection {
    /// A plan with nothing to do is a recipe authoring error
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty() && self.files.is_empty() && self.symlinks.is_empty()
    }
}

/// Recursive copy of a directory from the archive into the staging root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Source directory, relative to the archive root
    pub from: String,
    /// Destination directory, absolute within the staging root
    pub to: String,
}

/// Single-file install with mode bits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Source file, relative to the archive root
    pub from: String,
    /// Destination path, absolute within the staging root
    pub to: String,
    /// Octal mode string ("644", "755")
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "644".to_string()
}

impl FileEntry {
    /// Parse the octal mode string into permission bits
    pub fn mode_bits(&self) -> Result<u32> {
        u32::from_str_radix(&self.mode, 8)
            .map_err(|_| Error::ParseError(format!("invalid octal mode: {}", self.mode)))
    }
}

/// Symlink placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymlinkEntry {
    /// Symlink location, absolute within the staging root
    pub link: String,
    /// Symlink target (stored verbatim, usually absolute)
    pub target: String,
}

/// Rewrite rule for the desktop-integration descriptor
///
/// After install, every `Exec=` line of `file` is rewritten to launch `exec`
/// (the name on the binary search path) instead of the packaged binary name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopRule {
    /// Installed desktop file, absolute within the staging root
    pub file: String,
    /// Command the `Exec=` field must reference
    pub exec: String,
}
