// src/lib.rs

//! Galley
//!
//! Recipe executor for packaging and installing prebuilt binary releases.
//!
//! # Architecture
//!
//! - Recipes: declarative TOML describing per-architecture release
//!   archives, checksums, and a fixed install plan
//! - Kitchen: fetch, verify, extract, preflight, then execute the plan
//!   against a staging root
//! - Release tracking: fold the latest upstream GitHub release back into
//!   a recipe or PKGBUILD
//! - Verify-before-write: a checksum mismatch or missing archive path
//!   fails before anything lands under the staging root

pub mod arch;
pub mod client;
pub mod desktop;
mod error;
pub mod hash;
pub mod kitchen;
pub mod recipe;
pub mod release;

pub use arch::Arch;
pub use client::HttpClient;
pub use error::{Error, Result};
pub use hash::Sha256Hash;
pub use kitchen::{InstallReport, Kitchen, KitchenConfig, Stager};
pub use recipe::{Recipe, parse_recipe, parse_recipe_file, validate_recipe};
pub use release::{Release, UpdateSummary, latest_release};
