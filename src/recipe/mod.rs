// src/recipe/mod.rs

//! Recipe system for packaging prebuilt binary releases
//!
//! Recipes define how to package an upstream binary release:
//! - Release archives per architecture and their SHA-256 checksums
//! - Variables for URL templating (version, release tag)
//! - A declarative install plan (trees, files, symlinks, desktop rewrite)
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "keyguard"
//! version = "2.3.3"
//!
//! [variables]
//! release_tag = "r20250801"
//!
//! [source.x86_64]
//! url = "https://example.com/%(release_tag)s/Keyguard-%(version)s-linux-%(arch)s.tar.gz"
//! sha256 = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
//!
//! [install]
//! trees = [{ from = "bin", to = "/opt/keyguard/bin" }]
//! symlinks = [{ link = "/usr/bin/keyguard", target = "/opt/keyguard/bin/Keyguard" }]
//! ```
//!
//! There are no build steps. The plan is read once, preflight-checked
//! against the extracted archive, and executed once.

pub mod format;
pub mod parser;
pub mod pkgbuild;

pub use format::{
    DesktopRule, FileEntry, InstallSection, PackageSection, Recipe, SourceSection, SymlinkEntry,
    TreeEntry,
};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use pkgbuild::{ConversionResult, PkgbuildError, convert_pkgbuild, pkgbuild_to_toml};
