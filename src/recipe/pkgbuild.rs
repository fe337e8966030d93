// src/recipe/pkgbuild.rs

//! PKGBUILD to Recipe converter
//!
//! Converts Arch Linux PKGBUILD files for prebuilt (`-bin`) packages into
//! the Galley recipe format.
//!
//! # PKGBUILD Format
//!
//! PKGBUILDs are Bash scripts with specific variables and functions:
//!
//! ```bash
//! pkgname=keyguard-bin
//! pkgver=2.3.3
//! pkgrel=1
//! arch=('x86_64' 'aarch64')
//! _releaseTag='r20250801'
//! source_x86_64=("https://example.com/${_releaseTag}/Keyguard-${pkgver}-linux-x86_64.tar.gz")
//! sha256sums_x86_64=('abc123...')
//!
//! package() {
//!     install -d "$pkgdir/opt/keyguard"
//!     cp -a bin "$pkgdir/opt/keyguard/"
//!     ln -s /opt/keyguard/bin/Keyguard "$pkgdir/usr/bin/keyguard"
//! }
//! ```
//!
//! # Limitations
//!
//! - Only packaging steps are lifted: `install -d`, `cp -a/-r`, `chmod +x`,
//!   `ln -s`, `install -Dm<mode>`, and the `sed` `Exec=` rewrite. Anything
//!   else in `package()` produces a warning.
//! - Split packages (pkgname=(...)) are not supported.
//! - `build()` functions are rejected: this converter is for prebuilt
//!   binaries only.

use crate::arch::Arch;
use crate::recipe::format::{
    DesktopRule, FileEntry, InstallSection, PackageSection, Recipe, SourceSection, SymlinkEntry,
    TreeEntry,
};
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgbuildError {
    #[error("Missing required variable: {0}")]
    MissingVariable(String),

    #[error("Invalid PKGBUILD: {0}")]
    Invalid(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result of PKGBUILD conversion
#[derive(Debug)]
pub struct ConversionResult {
    /// The converted recipe
    pub recipe: Recipe,
    /// Warnings about conversion issues
    pub warnings: Vec<String>,
}

/// Convert a PKGBUILD for a prebuilt binary package to a Recipe
pub fn convert_pkgbuild(content: &str) -> Result<ConversionResult, PkgbuildError> {
    let mut warnings = Vec::new();
    let vars = extract_variables(content)?;
    let functions = extract_functions(content);

    let pkgname = vars
        .get("pkgname")
        .ok_or_else(|| PkgbuildError::MissingVariable("pkgname".to_string()))?
        .clone();
    let pkgver = vars
        .get("pkgver")
        .ok_or_else(|| PkgbuildError::MissingVariable("pkgver".to_string()))?
        .clone();
    let pkgrel = vars.get("pkgrel").cloned().unwrap_or_else(|| "1".to_string());

    if pkgname.starts_with('(') {
        return Err(PkgbuildError::Unsupported(
            "Split packages (pkgname=(...)) are not supported".to_string(),
        ));
    }
    if functions.contains_key("build") {
        return Err(PkgbuildError::Unsupported(
            "PKGBUILD has a build() function; only prebuilt packages convert cleanly".to_string(),
        ));
    }

    // Custom variables: bash convention prefixes them with underscore
    let custom_vars: BTreeMap<String, String> = vars
        .iter()
        .filter(|(k, _)| k.starts_with('_'))
        .map(|(k, v)| (k.trim_start_matches('_').to_string(), v.clone()))
        .collect();

    // Architecture list drives which source arrays we look for
    let arches = extract_array(content, "arch")
        .ok_or_else(|| PkgbuildError::MissingVariable("arch".to_string()))?;

    let mut sources = BTreeMap::new();
    for arch_name in &arches {
        let arch: Arch = match arch_name.parse() {
            Ok(a) => a,
            Err(_) => {
                warnings.push(format!("Skipping unsupported architecture: {}", arch_name));
                continue;
            }
        };

        // Prefer arch-suffixed arrays, fall back to the plain ones
        let source_urls = extract_array(content, &format!("source_{}", arch_name))
            .or_else(|| extract_array(content, "source"))
            .ok_or_else(|| PkgbuildError::MissingVariable(format!("source_{}", arch_name)))?;
        let checksums = extract_array(content, &format!("sha256sums_{}", arch_name))
            .or_else(|| extract_array(content, "sha256sums"))
            .ok_or_else(|| PkgbuildError::MissingVariable(format!("sha256sums_{}", arch_name)))?;

        let url = source_urls
            .first()
            .ok_or_else(|| PkgbuildError::Invalid(format!("empty source array for {}", arch_name)))?;
        let sha256 = checksums
            .first()
            .ok_or_else(|| PkgbuildError::Invalid(format!("empty sha256sums for {}", arch_name)))?;

        if source_urls.len() > 1 {
            warnings.push(format!(
                "Multiple sources for {}; only the first is converted",
                arch_name
            ));
        }

        sources.insert(
            arch,
            SourceSection {
                url: convert_pkgbuild_url(url, &pkgver, &custom_vars),
                sha256: sha256.clone(),
            },
        );
    }

    if sources.is_empty() {
        return Err(PkgbuildError::Invalid(
            "No supported architectures with sources found".to_string(),
        ));
    }

    let install = match functions.get("package") {
        Some(body) => convert_package_body(body, &mut warnings)?,
        None => return Err(PkgbuildError::MissingVariable("package()".to_string())),
    };

    if install.is_empty() {
        return Err(PkgbuildError::Invalid(
            "package() contained no recognizable install steps".to_string(),
        ));
    }

    let recipe = Recipe {
        package: PackageSection {
            name: pkgname.trim_end_matches("-bin").to_string(),
            version: pkgver,
            release: pkgrel,
            description: vars.get("pkgdesc").cloned(),
            license: extract_array(content, "license").and_then(|l| l.first().cloned()),
            homepage: vars.get("url").cloned(),
            depends: extract_array(content, "depends").unwrap_or_default(),
            provides: extract_array(content, "provides").unwrap_or_default(),
            conflicts: extract_array(content, "conflicts").unwrap_or_default(),
            options: extract_array(content, "options").unwrap_or_default(),
        },
        variables: custom_vars,
        source: sources,
        install,
    };

    if functions.contains_key("pkgver") {
        warnings.push("Dynamic pkgver() function detected - version may need manual update".to_string());
    }

    Ok(ConversionResult { recipe, warnings })
}

/// Convert a PKGBUILD file to Recipe format and return as a TOML string
pub fn pkgbuild_to_toml(pkgbuild_content: &str) -> Result<String, PkgbuildError> {
    let result = convert_pkgbuild(pkgbuild_content)?;
    toml::to_string_pretty(&result.recipe)
        .map_err(|e| PkgbuildError::ParseError(format!("Failed to serialize recipe: {}", e)))
}

/// Look up a single scalar variable in a PKGBUILD (e.g. `url`)
pub fn pkgbuild_variable(content: &str, name: &str) -> Option<String> {
    extract_variables(content).ok()?.get(name).cloned()
}

/// Extract simple variable assignments from a PKGBUILD
fn extract_variables(content: &str) -> Result<BTreeMap<String, String>, PkgbuildError> {
    let mut vars = BTreeMap::new();

    // Match: varname=value or varname="value" or varname='value'
    let re = Regex::new(r#"^([a-zA-Z_][a-zA-Z0-9_]*)=["']?([^"'\n]*)["']?\s*$"#)
        .map_err(|e| PkgbuildError::ParseError(e.to_string()))?;

    for line in content.lines() {
        let line = line.trim();
        if let Some(caps) = re.captures(line) {
            let name = caps.get(1).map(|m| m.as_str().to_string());
            let value = caps.get(2).map(|m| m.as_str().to_string());
            if let (Some(name), Some(value)) = (name, value) {
                vars.insert(name, value);
            }
        }
    }

    Ok(vars)
}

/// Extract array values from a PKGBUILD
fn extract_array(content: &str, name: &str) -> Option<Vec<String>> {
    // Match: name=('value1' 'value2' ...) possibly spanning lines
    let pattern = format!(r#"(?m)^{}=\(([^)]*)\)"#, regex::escape(name));
    let re = Regex::new(&pattern).ok()?;

    let caps = re.captures(content)?;
    let array_content = caps.get(1)?.as_str();

    let value_re = Regex::new(r#"["']([^"']+)["']"#).ok()?;
    let quoted: Vec<String> = value_re
        .captures_iter(array_content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    if !quoted.is_empty() {
        return Some(quoted);
    }

    // Unquoted fallback
    let unquoted: Vec<String> = array_content
        .split_whitespace()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Some(unquoted)
}

/// Extract function bodies from a PKGBUILD
fn extract_functions(content: &str) -> BTreeMap<String, String> {
    let mut functions = BTreeMap::new();

    let fn_re = match Regex::new(r#"(?m)^(\w+)\(\)\s*\{"#) {
        Ok(re) => re,
        Err(_) => return functions,
    };

    for caps in fn_re.captures_iter(content) {
        let (Some(name), Some(open)) = (caps.get(1), caps.get(0)) else {
            continue;
        };
        let rest = &content[open.end()..];

        // Find matching closing brace (simple nesting)
        let mut depth = 1;
        let mut end = 0;
        for (i, c) in rest.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i;
                        break;
                    }
                }
                _ => {}
            }
        }

        if end > 0 {
            functions.insert(name.as_str().to_string(), rest[..end].trim().to_string());
        }
    }

    functions
}

/// Convert a PKGBUILD URL to recipe template form
///
/// `${pkgver}` becomes `%(version)s` and each custom `${_var}` becomes
/// `%(var)s`; literal occurrences of the version are templated too.
fn convert_pkgbuild_url(url: &str, pkgver: &str, custom_vars: &BTreeMap<String, String>) -> String {
    let mut url = url
        .replace("${pkgver}", "%(version)s")
        .replace("$pkgver", "%(version)s");

    for key in custom_vars.keys() {
        url = url
            .replace(&format!("${{_{}}}", key), &format!("%({})s", key))
            .replace(&format!("$_{}", key), &format!("%({})s", key));
    }

    if !pkgver.is_empty() {
        url = url.replace(pkgver, "%(version)s");
    }

    url
}

/// Lift the imperative `package()` body into a declarative install plan
fn convert_package_body(
    body: &str,
    warnings: &mut Vec<String>,
) -> Result<InstallSection, PkgbuildError> {
    let mut plan = InstallSection::default();

    for raw_line in body.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let words = shell_words(line);
        if words.is_empty() {
            continue;
        }

        match words[0].as_str() {
            // Parent directories are implicit in the executor
            "install" if words.get(1).map(String::as_str) == Some("-d") => {}
            "cd" => {}

            "cp" if words.len() >= 4 && (words[1] == "-a" || words[1] == "-r" || words[1] == "-R") => {
                let from = words[2].clone();
                let dest = strip_pkgdir(&words[3]);
                // `cp -a bin "$pkgdir/opt/app/"` lands the tree at dest/bin
                let to = if dest.ends_with('/') {
                    format!("{}{}", dest, basename(&from))
                } else {
                    dest.to_string()
                };
                plan.trees.push(TreeEntry { from, to });
            }

            "chmod" if words.len() >= 3 && words[1] == "+x" => {
                plan.executable = Some(strip_pkgdir(&words[2]).to_string());
            }

            "ln" if words.len() >= 4 && words[1] == "-s" => {
                plan.symlinks.push(SymlinkEntry {
                    target: words[2].clone(),
                    link: strip_pkgdir(&words[3]).to_string(),
                });
            }

            "install" if words.len() >= 4 && words[1].starts_with("-Dm") => {
                let mode = words[1].trim_start_matches("-Dm").to_string();
                plan.files.push(FileEntry {
                    from: words[2].clone(),
                    to: strip_pkgdir(&words[3]).to_string(),
                    mode,
                });
            }

            "sed" => match parse_sed_exec_rewrite(&words) {
                Some(rule) => plan.desktop = Some(rule),
                None => warnings.push(format!("Unrecognized sed invocation: {}", line)),
            },

            _ => warnings.push(format!("Unrecognized package() step: {}", line)),
        }
    }

    Ok(plan)
}

/// Recognize `sed -i 's|Exec=.*|Exec=<cmd>|' "$pkgdir/<file>"`
fn parse_sed_exec_rewrite(words: &[String]) -> Option<DesktopRule> {
    let expr = words.iter().find(|w| w.starts_with('s') && w.contains("Exec="))?;
    let file = words
        .iter()
        .rev()
        .find(|w| w.contains("$pkgdir") || w.starts_with('/'))?;

    let sep = expr.chars().nth(1)?;
    let mut parts = expr[2..].split(sep);
    let _pattern = parts.next()?;
    let replacement = parts.next()?;
    let exec = replacement.strip_prefix("Exec=")?;

    Some(DesktopRule {
        file: strip_pkgdir(file).to_string(),
        exec: exec.to_string(),
    })
}

/// Strip the `$pkgdir` staging prefix from a destination path
fn strip_pkgdir(path: &str) -> &str {
    path.trim_start_matches("$pkgdir").trim_start_matches("${pkgdir}")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Minimal shell word splitter: whitespace-separated, honors quotes
///
/// Enough for the fixed command shapes package() bodies use; no expansions
/// beyond leaving `$pkgdir` in place for [`strip_pkgdir`].
fn shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (c, quote) {
            (q, Some(open)) if q == open => quote = None,
            ('\'' | '"', None) => quote = Some(c),
            (c, None) if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            (c, _) => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYGUARD_PKGBUILD: &str = r#"
pkgname=keyguard-bin
pkgver=2.3.3
pkgrel=1
pkgdesc="Alternative client for the Bitwarden platform"
arch=('x86_64' 'aarch64')
url="https://github.com/AChep/keyguard-app"
license=('custom')
depends=('glibc')
provides=('keyguard')
conflicts=('keyguard')
options=('!strip')
_releaseTag='r20250801'
source_x86_64=("https://github.com/AChep/keyguard-app/releases/download/${_releaseTag}/Keyguard-${pkgver}-linux-x86_64.tar.gz")
source_aarch64=("https://github.com/AChep/keyguard-app/releases/download/${_releaseTag}/Keyguard-${pkgver}-linux-aarch64.tar.gz")
sha256sums_x86_64=('dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f')
sha256sums_aarch64=('b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9')

package() {
    install -d "$pkgdir/opt/keyguard"
    cp -a bin "$pkgdir/opt/keyguard/"
    cp -a lib "$pkgdir/opt/keyguard/"
    chmod +x "$pkgdir/opt/keyguard/bin/Keyguard"
    install -d "$pkgdir/usr/bin"
    ln -s /opt/keyguard/bin/Keyguard "$pkgdir/usr/bin/keyguard"
    install -Dm644 share/applications/keyguard.desktop "$pkgdir/usr/share/applications/keyguard.desktop"
    sed -i 's|Exec=.*|Exec=keyguard|' "$pkgdir/usr/share/applications/keyguard.desktop"
    install -Dm644 share/icons/hicolor/scalable/apps/keyguard.svg "$pkgdir/usr/share/icons/hicolor/scalable/apps/keyguard.svg"
}
"#;

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables(KEYGUARD_PKGBUILD).unwrap();
        assert_eq!(vars.get("pkgname"), Some(&"keyguard-bin".to_string()));
        assert_eq!(vars.get("pkgver"), Some(&"2.3.3".to_string()));
        assert_eq!(vars.get("_releaseTag"), Some(&"r20250801".to_string()));
    }

    #[test]
    fn test_extract_array() {
        let arches = extract_array(KEYGUARD_PKGBUILD, "arch").unwrap();
        assert_eq!(arches, vec!["x86_64", "aarch64"]);

        let sums = extract_array(KEYGUARD_PKGBUILD, "sha256sums_x86_64").unwrap();
        assert_eq!(sums.len(), 1);
    }

    #[test]
    fn test_convert_keyguard_pkgbuild() {
        let result = convert_pkgbuild(KEYGUARD_PKGBUILD).unwrap();
        let recipe = &result.recipe;

        assert_eq!(recipe.package.name, "keyguard");
        assert_eq!(recipe.package.version, "2.3.3");
        assert_eq!(recipe.package.provides, vec!["keyguard"]);
        assert_eq!(recipe.package.options, vec!["!strip"]);
        assert_eq!(recipe.variables.get("releaseTag"), Some(&"r20250801".to_string()));

        // Both architectures, templated URLs
        assert_eq!(recipe.source.len(), 2);
        let x86 = &recipe.source[&Arch::X86_64];
        assert_eq!(
            x86.url,
            "https://github.com/AChep/keyguard-app/releases/download/%(releaseTag)s/Keyguard-%(version)s-linux-x86_64.tar.gz"
        );
        assert!(x86.checksum().is_ok());

        // Install plan lifted from package()
        assert_eq!(recipe.install.trees.len(), 2);
        assert_eq!(recipe.install.trees[0].from, "bin");
        assert_eq!(recipe.install.trees[0].to, "/opt/keyguard/bin");
        assert_eq!(
            recipe.install.executable.as_deref(),
            Some("/opt/keyguard/bin/Keyguard")
        );
        assert_eq!(recipe.install.symlinks.len(), 1);
        assert_eq!(recipe.install.symlinks[0].link, "/usr/bin/keyguard");
        assert_eq!(recipe.install.symlinks[0].target, "/opt/keyguard/bin/Keyguard");
        assert_eq!(recipe.install.files.len(), 2);
        assert_eq!(recipe.install.files[0].mode, "644");

        let desktop = recipe.install.desktop.as_ref().unwrap();
        assert_eq!(desktop.file, "/usr/share/applications/keyguard.desktop");
        assert_eq!(desktop.exec, "keyguard");

        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_url_templating_resolves_back() {
        let result = convert_pkgbuild(KEYGUARD_PKGBUILD).unwrap();
        let url = result.recipe.archive_url(Arch::Aarch64).unwrap();
        assert_eq!(
            url,
            "https://github.com/AChep/keyguard-app/releases/download/r20250801/Keyguard-2.3.3-linux-aarch64.tar.gz"
        );
    }

    #[test]
    fn test_reject_build_function() {
        let pkgbuild = r#"
pkgname=hello
pkgver=1.0
arch=('x86_64')
source=("https://example.com/hello-1.0.tar.gz")
sha256sums=('abc')

build() {
    make
}

package() {
    cp -a bin "$pkgdir/opt/hello/"
}
"#;
        let err = convert_pkgbuild(pkgbuild).unwrap_err();
        assert!(matches!(err, PkgbuildError::Unsupported(_)));
    }

    #[test]
    fn test_missing_package_function() {
        let pkgbuild = r#"
pkgname=hello
pkgver=1.0
arch=('x86_64')
source=("https://example.com/hello-1.0.tar.gz")
sha256sums=('abc')
"#;
        let err = convert_pkgbuild(pkgbuild).unwrap_err();
        assert!(matches!(err, PkgbuildError::MissingVariable(v) if v == "package()"));
    }

    #[test]
    fn test_unrecognized_steps_warn() {
        let pkgbuild = r#"
pkgname=hello
pkgver=1.0
arch=('x86_64')
source=("https://example.com/hello-1.0.tar.gz")
sha256sums=('abc')

package() {
    cp -a bin "$pkgdir/opt/hello/"
    gendesk -f -n
}
"#;
        let result = convert_pkgbuild(pkgbuild).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("gendesk"));
    }

    #[test]
    fn test_plain_source_applies_to_arch() {
        let pkgbuild = r#"
pkgname=hello-bin
pkgver=1.0
arch=('x86_64')
source=("https://example.com/hello-1.0-x86_64.tar.gz")
sha256sums=('dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f')

package() {
    cp -a bin "$pkgdir/opt/hello/"
}
"#;
        let result = convert_pkgbuild(pkgbuild).unwrap();
        assert_eq!(result.recipe.source.len(), 1);
        assert!(result.recipe.source.contains_key(&Arch::X86_64));
        // The literal version in the URL gets templated
        assert!(result.recipe.source[&Arch::X86_64].url.contains("%(version)s"));
    }

    #[test]
    fn test_skip_unsupported_arch_with_warning() {
        let pkgbuild = r#"
pkgname=hello-bin
pkgver=1.0
arch=('x86_64' 'i686')
source=("https://example.com/hello.tar.gz")
sha256sums=('abc')

package() {
    cp -a bin "$pkgdir/opt/hello/"
}
"#;
        let result = convert_pkgbuild(pkgbuild).unwrap();
        assert_eq!(result.recipe.source.len(), 1);
        assert!(result.warnings.iter().any(|w| w.contains("i686")));
    }

    #[test]
    fn test_shell_words() {
        assert_eq!(
            shell_words(r#"install -Dm644 a.desktop "$pkgdir/usr/share/a.desktop""#),
            vec!["install", "-Dm644", "a.desktop", "$pkgdir/usr/share/a.desktop"]
        );
        assert_eq!(
            shell_words(r#"sed -i 's|Exec=.*|Exec=app|' "$pkgdir/f""#),
            vec!["sed", "-i", "s|Exec=.*|Exec=app|", "$pkgdir/f"]
        );
    }

    #[test]
    fn test_pkgbuild_to_toml() {
        let toml_text = pkgbuild_to_toml(KEYGUARD_PKGBUILD).unwrap();
        let recipe = crate::recipe::parse_recipe(&toml_text).unwrap();
        assert_eq!(recipe.package.name, "keyguard");
        assert!(crate::recipe::validate_recipe(&recipe).is_ok());
    }
}
