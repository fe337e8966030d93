// src/release.rs

//! Upstream release tracking and recipe updates
//!
//! Queries the GitHub releases API for the latest release of the packaged
//! project, picks the Linux archive asset per architecture, and folds the
//! new version and checksums back into the recipe. Both the TOML recipe
//! format and plain PKGBUILDs can be updated; PKGBUILDs are rewritten line
//! by line so their layout and comments survive.

use crate::arch::Arch;
use crate::client::HttpClient;
use crate::error::{Error, Result};
use crate::hash::Sha256Hash;
use crate::recipe::Recipe;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

/// A release as returned by the GitHub API
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release tag (e.g. `r20250801`)
    pub tag_name: String,
    /// Release title
    #[serde(default)]
    pub name: Option<String>,
    /// Downloadable artifacts
    pub assets: Vec<Asset>,
}

/// One downloadable artifact of a release
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    /// Artifact filename (e.g. `Keyguard-2.3.3-linux-x86_64.tar.gz`)
    pub name: String,
    /// Upstream digest in `sha256:<hex>` form, when published
    #[serde(default)]
    pub digest: Option<String>,
    /// Direct download URL
    pub browser_download_url: String,
    /// Artifact size in bytes
    #[serde(default)]
    pub size: u64,
}

impl Release {
    /// Find the Linux archive asset for an architecture
    ///
    /// Matches by the `-linux-<arch>.tar.gz` filename suffix upstream
    /// release pipelines use.
    pub fn asset_for(&self, arch: Arch) -> Result<&Asset> {
        let suffix = format!("-linux-{}.tar.gz", arch);
        self.assets
            .iter()
            .find(|a| a.name.ends_with(&suffix))
            .ok_or_else(|| {
                Error::DownloadError(format!(
                    "Release {} has no asset matching *{}",
                    self.tag_name, suffix
                ))
            })
    }

    /// Extract the artifact version from the Linux asset names
    ///
    /// Asset names embed the version as `<Name>-<x.y.z>-linux-<arch>`,
    /// independent of the tag, which is a date stamp for some upstreams.
    pub fn version(&self) -> Result<String> {
        let re = Regex::new(r"-(\d+\.\d+\.\d+)-linux-")
            .map_err(|e| Error::ParseError(e.to_string()))?;

        for asset in &self.assets {
            if let Some(caps) = re.captures(&asset.name) {
                if let Some(version) = caps.get(1) {
                    return Ok(version.as_str().to_string());
                }
            }
        }

        Err(Error::ParseError(format!(
            "Could not determine version from assets of release {}",
            self.tag_name
        )))
    }
}

impl Asset {
    /// The published SHA-256 digest of this asset
    pub fn sha256(&self) -> Result<Sha256Hash> {
        let digest = self.digest.as_deref().ok_or_else(|| {
            Error::ParseError(format!("Asset {} has no published digest", self.name))
        })?;
        Sha256Hash::parse_prefixed(digest)
    }
}

/// Fetch the latest release of a GitHub repository
///
/// `repo` is the `owner/name` slug.
pub fn latest_release(client: &HttpClient, repo: &str) -> Result<Release> {
    let url = format!("https://api.github.com/repos/{}/releases/latest", repo);
    client.get_json(&url)
}

/// Derive the `owner/name` slug from a GitHub homepage URL
pub fn repo_slug(homepage: &str) -> Result<String> {
    let rest = homepage
        .strip_prefix("https://github.com/")
        .or_else(|| homepage.strip_prefix("http://github.com/"))
        .ok_or_else(|| {
            Error::ParseError(format!("Not a GitHub repository URL: {}", homepage))
        })?;

    let mut parts = rest.trim_end_matches('/').splitn(3, '/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
            Ok(format!("{}/{}", owner, name))
        }
        _ => Err(Error::ParseError(format!(
            "Not a GitHub repository URL: {}",
            homepage
        ))),
    }
}

/// Summary of what an update changed
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Version before the update
    pub old_version: String,
    /// Version after the update
    pub new_version: String,
    /// Architectures whose checksums changed
    pub updated_arches: Vec<Arch>,
    /// Whether anything changed at all
    pub changed: bool,
}

/// Fold the latest release into a recipe
///
/// Updates the version, resets the release number to "1" when the version
/// changed, refreshes per-architecture checksums, and updates the
/// `release_tag` variable when the recipe uses one.
pub fn update_recipe(recipe: &mut Recipe, release: &Release) -> Result<UpdateSummary> {
    let new_version = release.version()?;
    let mut summary = UpdateSummary {
        old_version: recipe.package.version.clone(),
        new_version: new_version.clone(),
        ..UpdateSummary::default()
    };

    if recipe.package.version != new_version {
        info!(
            "Version bump: {} -> {}",
            recipe.package.version, new_version
        );
        recipe.package.version = new_version;
        recipe.package.release = "1".to_string();
        summary.changed = true;
    }

    for (arch, source) in &mut recipe.source {
        let asset = release.asset_for(*arch)?;
        let digest = asset.sha256()?;
        if source.sha256 != digest.as_str() {
            debug!("New checksum for {}: {}", arch, digest);
            source.sha256 = digest.as_str().to_string();
            summary.updated_arches.push(*arch);
            summary.changed = true;
        }
    }

    // Upstreams that tag by date keep the tag in a recipe variable
    for key in ["release_tag", "releaseTag"] {
        if let Some(tag) = recipe.variables.get_mut(key) {
            if *tag != release.tag_name {
                *tag = release.tag_name.clone();
                summary.changed = true;
            }
            break;
        }
    }

    Ok(summary)
}

/// Fold the latest release into a PKGBUILD, preserving its layout
///
/// Rewrites only the value side of `pkgver=`, `pkgrel=`, `_releaseTag=`,
/// and the per-architecture `sha256sums_*=` lines; every other line passes
/// through untouched.
pub fn update_pkgbuild(content: &str, release: &Release) -> Result<(String, UpdateSummary)> {
    let new_version = release.version()?;

    let pkgver_re = Regex::new(r"(?m)^pkgver=.*$").map_err(|e| Error::ParseError(e.to_string()))?;
    let old_version = pkgver_re
        .find(content)
        .map(|m| m.as_str().trim_start_matches("pkgver=").to_string())
        .ok_or_else(|| Error::ParseError("PKGBUILD has no pkgver= line".to_string()))?;

    let mut summary = UpdateSummary {
        old_version: old_version.clone(),
        new_version: new_version.clone(),
        ..UpdateSummary::default()
    };

    let version_changed = old_version != new_version;
    let mut updated = content.to_string();

    if version_changed {
        updated = pkgver_re
            .replace(&updated, format!("pkgver={}", new_version).as_str())
            .into_owned();

        let pkgrel_re =
            Regex::new(r"(?m)^pkgrel=.*$").map_err(|e| Error::ParseError(e.to_string()))?;
        updated = pkgrel_re.replace(&updated, "pkgrel=1").into_owned();
        summary.changed = true;
    }

    let tag_re =
        Regex::new(r"(?m)^_releaseTag=.*$").map_err(|e| Error::ParseError(e.to_string()))?;
    match tag_re.find(&updated) {
        Some(existing) => {
            let replacement = format!("_releaseTag='{}'", release.tag_name);
            if existing.as_str() != replacement {
                updated = tag_re.replace(&updated, replacement.as_str()).into_owned();
                summary.changed = true;
            }
        }
        // A PKGBUILD whose URLs embed only the version has no tag line;
        // one that references the variable without assigning it is broken
        // and must not report a clean update.
        None if updated.contains("_releaseTag") => {
            return Err(Error::ParseError(
                "PKGBUILD references _releaseTag but has no _releaseTag= line".to_string(),
            ));
        }
        None => {}
    }

    // Every architecture the PKGBUILD declares must have its checksum
    // line refreshed; a missing line is a typo, not an optional field.
    for arch_name in declared_arches(content)? {
        let Ok(arch) = arch_name.parse::<Arch>() else {
            continue;
        };

        let line_re = Regex::new(&format!(r"(?m)^sha256sums_{}=\(.*\)$", arch))
            .map_err(|e| Error::ParseError(e.to_string()))?;
        let Some(existing) = line_re.find(&updated) else {
            return Err(Error::ParseError(format!(
                "PKGBUILD declares {} but has no sha256sums_{}= line",
                arch, arch
            )));
        };

        let asset = release.asset_for(arch)?;
        let digest = asset.sha256()?;
        let replacement = format!("sha256sums_{}=('{}')", arch, digest);
        if existing.as_str() != replacement {
            updated = line_re.replace(&updated, replacement.as_str()).into_owned();
            summary.updated_arches.push(arch);
            summary.changed = true;
        }
    }

    Ok((updated, summary))
}

/// Architecture names from the PKGBUILD's `arch=(...)` array
fn declared_arches(content: &str) -> Result<Vec<String>> {
    let re = Regex::new(r#"(?m)^arch=\(([^)]*)\)"#).map_err(|e| Error::ParseError(e.to_string()))?;
    let caps = re
        .captures(content)
        .ok_or_else(|| Error::ParseError("PKGBUILD has no arch=(...) line".to_string()))?;

    let value_re = Regex::new(r#"["']([^"']+)["']"#).map_err(|e| Error::ParseError(e.to_string()))?;
    let arches: Vec<String> = match caps.get(1) {
        Some(inner) => value_re
            .captures_iter(inner.as_str())
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect(),
        None => Vec::new(),
    };

    Ok(arches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_release() -> Release {
        Release {
            tag_name: "r20250815".to_string(),
            name: Some("2.4.0".to_string()),
            assets: vec![
                Asset {
                    name: "Keyguard-2.4.0-linux-x86_64.tar.gz".to_string(),
                    digest: Some(
                        "sha256:dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
                            .to_string(),
                    ),
                    browser_download_url: "https://example.com/x86_64.tar.gz".to_string(),
                    size: 1024,
                },
                Asset {
                    name: "Keyguard-2.4.0-linux-aarch64.tar.gz".to_string(),
                    digest: Some(
                        "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
                            .to_string(),
                    ),
                    browser_download_url: "https://example.com/aarch64.tar.gz".to_string(),
                    size: 1024,
                },
                Asset {
                    name: "Keyguard-2.4.0-windows.zip".to_string(),
                    digest: None,
                    browser_download_url: "https://example.com/win.zip".to_string(),
                    size: 2048,
                },
            ],
        }
    }

    const PKGBUILD: &str = "\
# Maintainer: Someone <someone@example.com>
pkgname=keyguard-bin
pkgver=2.3.3
pkgrel=2
arch=('x86_64' 'aarch64')
_releaseTag='r20250801'
source_x86_64=(\"https://example.com/${_releaseTag}/Keyguard-${pkgver}-linux-x86_64.tar.gz\")
sha256sums_x86_64=('0000000000000000000000000000000000000000000000000000000000000000')
sha256sums_aarch64=('1111111111111111111111111111111111111111111111111111111111111111')
";

    #[test]
    fn test_asset_selection() {
        let release = sample_release();
        assert_eq!(
            release.asset_for(Arch::X86_64).unwrap().name,
            "Keyguard-2.4.0-linux-x86_64.tar.gz"
        );
        assert_eq!(
            release.asset_for(Arch::Aarch64).unwrap().name,
            "Keyguard-2.4.0-linux-aarch64.tar.gz"
        );
    }

    #[test]
    fn test_version_from_assets() {
        assert_eq!(sample_release().version().unwrap(), "2.4.0");
    }

    #[test]
    fn test_missing_asset() {
        let mut release = sample_release();
        release.assets.retain(|a| !a.name.contains("aarch64"));
        assert!(release.asset_for(Arch::Aarch64).is_err());
    }

    #[test]
    fn test_asset_digest_parsing() {
        let release = sample_release();
        let digest = release.asset_for(Arch::X86_64).unwrap().sha256().unwrap();
        assert_eq!(
            digest.as_str(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );

        // The windows asset has no digest
        let windows = release.assets.iter().find(|a| a.name.ends_with(".zip")).unwrap();
        assert!(windows.sha256().is_err());
    }

    #[test]
    fn test_repo_slug() {
        assert_eq!(
            repo_slug("https://github.com/AChep/keyguard-app").unwrap(),
            "AChep/keyguard-app"
        );
        assert_eq!(
            repo_slug("https://github.com/AChep/keyguard-app/").unwrap(),
            "AChep/keyguard-app"
        );
        assert!(repo_slug("https://example.com/foo/bar").is_err());
        assert!(repo_slug("https://github.com/onlyowner").is_err());
    }

    #[test]
    fn test_update_recipe() {
        let toml = r#"
[package]
name = "keyguard"
version = "2.3.3"
release = "3"

[variables]
release_tag = "r20250801"

[source.x86_64]
url = "https://example.com/%(release_tag)s/Keyguard-%(version)s-linux-%(arch)s.tar.gz"
sha256 = "0000000000000000000000000000000000000000000000000000000000000000"

[source.aarch64]
url = "https://example.com/%(release_tag)s/Keyguard-%(version)s-linux-%(arch)s.tar.gz"
sha256 = "1111111111111111111111111111111111111111111111111111111111111111"

[install]
trees = [{ from = "bin", to = "/opt/keyguard/bin" }]
"#;
        let mut recipe = crate::recipe::parse_recipe(toml).unwrap();
        let summary = update_recipe(&mut recipe, &sample_release()).unwrap();

        assert!(summary.changed);
        assert_eq!(summary.old_version, "2.3.3");
        assert_eq!(summary.new_version, "2.4.0");
        assert_eq!(recipe.package.version, "2.4.0");
        // Release number resets on version change
        assert_eq!(recipe.package.release, "1");
        assert_eq!(
            recipe.variables.get("release_tag").map(String::as_str),
            Some("r20250815")
        );
        assert_eq!(
            recipe.source[&Arch::X86_64].sha256,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(summary.updated_arches.len(), 2);
    }

    #[test]
    fn test_update_recipe_idempotent() {
        let toml = r#"
[package]
name = "keyguard"
version = "2.4.0"
release = "2"

[source.x86_64]
url = "https://example.com/Keyguard-%(version)s-linux-%(arch)s.tar.gz"
sha256 = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"

[install]
trees = [{ from = "bin", to = "/opt/keyguard/bin" }]
"#;
        let mut recipe = crate::recipe::parse_recipe(toml).unwrap();
        let summary = update_recipe(&mut recipe, &sample_release()).unwrap();

        assert!(!summary.changed);
        // Same version: the manual release number survives
        assert_eq!(recipe.package.release, "2");
    }

    #[test]
    fn test_update_pkgbuild() {
        let (updated, summary) = update_pkgbuild(PKGBUILD, &sample_release()).unwrap();

        assert!(summary.changed);
        assert!(updated.contains("pkgver=2.4.0\n"));
        assert!(updated.contains("pkgrel=1\n"));
        assert!(updated.contains("_releaseTag='r20250815'\n"));
        assert!(updated.contains(
            "sha256sums_x86_64=('dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f')\n"
        ));
        assert!(updated.contains(
            "sha256sums_aarch64=('b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9')\n"
        ));
        // Layout preserved
        assert!(updated.starts_with("# Maintainer: Someone"));
        assert!(updated.contains("source_x86_64=("));
    }

    #[test]
    fn test_release_json_deserialization() {
        // Shape of the GitHub releases API response, including fields the
        // model ignores and an asset without a digest
        let json = r#"{
            "tag_name": "r20250815",
            "name": "2.4.0",
            "html_url": "https://github.com/AChep/keyguard-app/releases/tag/r20250815",
            "prerelease": false,
            "assets": [
                {
                    "name": "Keyguard-2.4.0-linux-x86_64.tar.gz",
                    "digest": "sha256:dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f",
                    "browser_download_url": "https://example.com/x86_64.tar.gz",
                    "size": 1024,
                    "content_type": "application/gzip"
                },
                {
                    "name": "Keyguard-2.4.0.dmg",
                    "browser_download_url": "https://example.com/mac.dmg"
                }
            ]
        }"#;

        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag_name, "r20250815");
        assert_eq!(release.assets.len(), 2);
        assert_eq!(release.version().unwrap(), "2.4.0");
        assert!(release.asset_for(Arch::X86_64).unwrap().sha256().is_ok());
        assert!(release.assets[1].digest.is_none());
        assert_eq!(release.assets[1].size, 0);
    }

    #[test]
    fn test_update_pkgbuild_missing_checksum_line_is_an_error() {
        let content = PKGBUILD.replace(
            "sha256sums_aarch64=('1111111111111111111111111111111111111111111111111111111111111111')\n",
            "",
        );
        let err = update_pkgbuild(&content, &sample_release()).unwrap_err();
        assert!(matches!(err, Error::ParseError(msg) if msg.contains("sha256sums_aarch64")));
    }

    #[test]
    fn test_update_pkgbuild_missing_tag_line_is_an_error() {
        // The source line still references ${_releaseTag}
        let content = PKGBUILD.replace("_releaseTag='r20250801'\n", "");
        let err = update_pkgbuild(&content, &sample_release()).unwrap_err();
        assert!(matches!(err, Error::ParseError(msg) if msg.contains("_releaseTag")));
    }

    #[test]
    fn test_update_pkgbuild_without_tag_indirection() {
        let content = "\
pkgname=hello-bin
pkgver=1.0.0
pkgrel=1
arch=('x86_64')
source_x86_64=(\"https://example.com/Keyguard-${pkgver}-linux-x86_64.tar.gz\")
sha256sums_x86_64=('0000000000000000000000000000000000000000000000000000000000000000')
";
        let (updated, summary) = update_pkgbuild(content, &sample_release()).unwrap();
        assert!(summary.changed);
        assert!(updated.contains("pkgver=2.4.0\n"));
        assert!(updated.contains(
            "sha256sums_x86_64=('dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f')\n"
        ));
    }

    #[test]
    fn test_update_pkgbuild_same_version_keeps_pkgrel() {
        let content = PKGBUILD.replace("pkgver=2.3.3", "pkgver=2.4.0");
        let (updated, summary) = update_pkgbuild(&content, &sample_release()).unwrap();

        assert!(summary.changed); // checksums still change
        assert!(updated.contains("pkgrel=2\n"));
        assert_eq!(summary.updated_arches.len(), 2);
    }
}
