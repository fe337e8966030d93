// src/recipe/parser.rs

//! Recipe file parsing

use crate::error::{Error, Result};
use crate::recipe::format::Recipe;
use std::path::Path;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read recipe file: {}", e)))?;

    parse_recipe(&content)
}

/// Validate a recipe for completeness and correctness
///
/// Hard errors make the recipe unusable; everything else comes back as a
/// warning list for `galley lint` to print.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if recipe.package.name.is_empty() {
        return Err(Error::ParseError("Recipe package name cannot be empty".to_string()));
    }
    if recipe.package.version.is_empty() {
        return Err(Error::ParseError("Recipe package version cannot be empty".to_string()));
    }

    if recipe.source.is_empty() {
        return Err(Error::ParseError(
            "Recipe must declare at least one [source.<arch>] section".to_string(),
        ));
    }

    // Every declared checksum must be a well-formed SHA-256 digest
    for (arch, source) in &recipe.source {
        source.checksum().map_err(|e| {
            Error::ParseError(format!("Invalid checksum for {}: {}", arch, e))
        })?;
        if source.url.is_empty() {
            return Err(Error::ParseError(format!("Empty source URL for {}", arch)));
        }
    }

    if recipe.install.is_empty() {
        return Err(Error::ParseError(
            "Install plan is empty: nothing to place in the staging root".to_string(),
        ));
    }

    // Octal mode strings must parse
    for file in &recipe.install.files {
        file.mode_bits()?;
    }

    if recipe.package.description.is_none() {
        warnings.push("Missing package description".to_string());
    }
    if recipe.package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }

    // The desktop rewrite should point at a file the plan actually installs
    if let Some(desktop) = &recipe.install.desktop {
        let installed = recipe.install.files.iter().any(|f| f.to == desktop.file);
        if !installed {
            warnings.push(format!(
                "Desktop rewrite targets {} which the install plan does not place",
                desktop.file
            ));
        }
    }

    // A symlink into /usr/bin should resolve to something the plan installs
    for symlink in &recipe.install.symlinks {
        let target_covered = recipe
            .install
            .trees
            .iter()
            .any(|t| symlink.target.starts_with(&t.to))
            || recipe.install.files.iter().any(|f| f.to == symlink.target);
        if !target_covered {
            warnings.push(format!(
                "Symlink {} points at {} which no plan entry installs",
                symlink.link, symlink.target
            ));
        }
    }

    Ok(warnings)
}
