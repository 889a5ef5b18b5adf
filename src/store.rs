use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const BASE_DIR: &str = ".synthmon";
pub const FAILURES_DIR: &str = "failures";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

pub fn failure_path(slug: &str) -> PathBuf {
    Path::new(BASE_DIR).join(FAILURES_DIR).join(format!("{slug}.png"))
}

/// Write the failure screenshot for a test case, returning its path.
pub fn write_failure_screenshot(slug: &str, png: &[u8]) -> Result<PathBuf> {
    let path = failure_path(slug);
    ensure_parent(&path)?;
    std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Remove stale failure screenshots from a previous run.
pub fn clear_failures() {
    let dir = Path::new(BASE_DIR).join(FAILURES_DIR);
    if dir.exists() {
        let _ = std::fs::remove_dir_all(&dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_screenshot_lands_under_failures_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let path = write_failure_screenshot("My_Case", b"png-bytes").unwrap();
        assert!(path.ends_with(".synthmon/failures/My_Case.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        clear_failures();
        assert!(!path.exists());

        std::env::set_current_dir(prev).unwrap();
    }
}
