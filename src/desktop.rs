// src/desktop.rs

//! Desktop-entry `Exec=` rewriting
//!
//! Upstream desktop files ship with `Exec=` pointing at the binary's name
//! inside the release tree. After install the launcher lives on the binary
//! search path under a different name, so every `Exec=` line is rewritten
//! to that command. Everything else in the file (including `TryExec=`,
//! comments, and action groups) passes through byte for byte.

use crate::error::{Error, Result};
use std::path::Path;

/// Rewrite every `Exec=` line of desktop-entry content to launch `exec`
///
/// Returns an error when no `Exec=` line exists: silently leaving the file
/// pointing at a binary that is not on the search path would produce a
/// launcher that installs cleanly and never starts.
pub fn rewrite_exec(content: &str, exec: &str) -> Result<String> {
    let mut rewritten = 0;
    let mut out = String::with_capacity(content.len());

    for line in content.lines() {
        if line.starts_with("Exec=") {
            out.push_str("Exec=");
            out.push_str(exec);
            rewritten += 1;
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }

    if rewritten == 0 {
        return Err(Error::ParseError(
            "Desktop file has no Exec= line to rewrite".to_string(),
        ));
    }

    Ok(out)
}

/// Rewrite the `Exec=` lines of an installed desktop file in place
pub fn rewrite_exec_file(path: &Path, exec: &str) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read desktop file {}: {}", path.display(), e))
    })?;

    let rewritten = rewrite_exec(&content, exec)?;
    std::fs::write(path, rewritten)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP: &str = "\
[Desktop Entry]
Type=Application
Name=Keyguard
Exec=Keyguard %U
Icon=keyguard
Categories=Utility;

[Desktop Action lock]
Name=Lock
Exec=Keyguard --lock
";

    #[test]
    fn test_rewrite_all_exec_lines() {
        let out = rewrite_exec(DESKTOP, "keyguard").unwrap();
        assert_eq!(out.matches("Exec=keyguard\n").count(), 2);
        assert!(!out.contains("Exec=Keyguard"));
        // Everything else unchanged
        assert!(out.contains("Name=Keyguard\n"));
        assert!(out.contains("Icon=keyguard\n"));
        assert!(out.contains("[Desktop Action lock]\n"));
    }

    #[test]
    fn test_missing_exec_is_an_error() {
        let err = rewrite_exec("[Desktop Entry]\nName=App\n", "app").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn test_tryexec_untouched() {
        let content = "[Desktop Entry]\nTryExec=Keyguard\nExec=Keyguard\n";
        let out = rewrite_exec(content, "keyguard").unwrap();
        assert!(out.contains("TryExec=Keyguard\n"));
        assert!(out.contains("Exec=keyguard\n"));
    }

    #[test]
    fn test_rewrite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.desktop");
        std::fs::write(&path, DESKTOP).unwrap();

        rewrite_exec_file(&path, "keyguard").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Exec=keyguard\n"));
    }
}
