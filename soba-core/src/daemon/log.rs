//! Log rotation: when a log file crosses a byte threshold, rename it to the
//! first free numeric suffix and start fresh (spec §4.9, property 8). A
//! separate retention sweep prunes log files past a modification-time
//! threshold.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Rotate `path` if it exceeds `max_bytes`. Renames to `path.1`, bumping any
/// existing `.1`, `.2`, ... out of the way first (so rotation never
/// overwrites an older log), then leaves `path` free for a fresh file.
/// No-op (returns `false`) if `path` is absent or under the threshold.
pub fn rotate_if_needed(path: &Path, max_bytes: u64) -> Result<bool> {
    let Ok(meta) = fs::metadata(path) else {
        return Ok(false);
    };
    if meta.len() <= max_bytes {
        return Ok(false);
    }

    let mut n = 1;
    while suffixed(path, n).exists() {
        n += 1;
    }
    // Shift `.{n-1}` ... `.1` up by one slot, then move `path` itself into
    // the now-free `.1`. Walking downward avoids clobbering a slot before
    // it's been read.
    let mut k = n;
    while k > 1 {
        fs::rename(suffixed(path, k - 1), suffixed(path, k))
            .with_context(|| format!("failed to rotate {path:?} slot {}", k - 1))?;
        k -= 1;
    }
    fs::rename(path, suffixed(path, 1))
        .with_context(|| format!("failed to rotate {path:?} into .1"))?;
    Ok(true)
}

fn suffixed(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Delete rotated/plain log files under `dir` whose modification time is
/// older than `retention`. Matches files named `stem.ext` or `stem.ext.N`
/// for the given base file name. Best-effort: a file whose metadata can't
/// be read is skipped, not treated as a failure.
pub fn clean_old_logs(dir: &Path, base_name: &str, retention: Duration, now: SystemTime) -> Vec<PathBuf> {
    let mut removed = vec![];
    let Ok(entries) = fs::read_dir(dir) else {
        return removed;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name != base_name && !file_name.starts_with(&format!("{base_name}.")) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age > retention && fs::remove_file(&path).is_ok() {
            removed.push(path);
        }
    }
    removed
}
