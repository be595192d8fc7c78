// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use certitrust_core::error::Result;

const APP_DIR: &str = "certitrust";

/// Return the default data directory, creating it if needed.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(
        std::env::var("XDG_DATA_HOME").ok(),
        std::env::var("HOME").ok(),
    );
    ensure(&dir)?;
    Ok(dir)
}

/// Create `dir` (and parents) if missing.
pub fn ensure(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// XDG data dir, then `~/.local/share`, then `/tmp`.
fn resolve(xdg_data_home: Option<String>, home: Option<String>) -> PathBuf {
    let base = match (xdg_data_home, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) if !home.is_empty() => PathBuf::from(home).join(".local").join("share"),
        _ => PathBuf::from("/tmp"),
    };
    base.join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_wins_over_home() {
        let dir = resolve(Some("/xdg".into()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/xdg/certitrust"));
    }

    #[test]
    fn home_fallback() {
        let dir = resolve(Some(String::new()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/home/u/.local/share/certitrust"));
    }

    #[test]
    fn last_resort_is_tmp() {
        assert_eq!(resolve(None, None), PathBuf::from("/tmp/certitrust"));
    }
}
