//! Stopping sentinel: an empty file whose presence signals "begin
//! shutdown" to the running loop (spec §3, §4.10, scenario S5).

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Create the sentinel file, creating parent directories as needed.
pub fn create(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"").with_context(|| format!("failed to create sentinel {path:?}"))
}

/// Is the sentinel currently present?
pub fn present(path: &Path) -> bool {
    path.exists()
}

/// Remove the sentinel. A no-op if it's already gone.
pub fn remove(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove sentinel {path:?}"))?;
    }
    Ok(())
}
