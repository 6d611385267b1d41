//! PID file: advisory-locked while written, liveness-probed thereafter
//! (spec §4.9). The lock is the teacher's `fs2::FileExt` idiom (seen in
//! `groblegark-oddjobs`'s `daemon/lifecycle`); the liveness probe is the
//! teacher's own `kill -0` approach from `worker/lock.rs`, kept because an
//! OS-level lock alone can't tell you whether a *different* process merely
//! holds it briefly.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Write `pid` to `path`, holding an exclusive lock for the duration of the
/// write. Fails if another live process already holds the lock.
pub fn write(path: &Path, pid: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory for pid file {path:?}"))?;
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open pid file {path:?}"))?;

    file.try_lock_exclusive()
        .with_context(|| format!("pid file {path:?} is already locked by a live daemon"))?;

    file.set_len(0)?;
    use std::io::Write as _;
    let mut file = file;
    writeln!(file, "{pid}").with_context(|| format!("failed to write pid to {path:?}"))?;
    file.sync_all().ok();

    // The lock releases when `file` drops here; the written PID is what
    // matters to later readers, not a held lock across the daemon's life.
    FileExt::unlock(&file).ok();
    Ok(())
}

/// Read the PID recorded at `path`, or `None` if the file is absent, empty,
/// or unparseable.
pub fn read(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

/// Canonical "signal 0" liveness probe: does a process with this PID exist?
pub fn running(pid: u32) -> bool {
    // SAFETY: signal 0 performs no action beyond existence/permission checks.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Delete `path` iff the PID it records no longer corresponds to a live
/// process. Returns `true` if the file was removed.
pub fn cleanup_if_stale(path: &Path) -> Result<bool> {
    let Some(pid) = read(path) else {
        return Ok(false);
    };
    if running(pid) {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("failed to remove stale pid file {path:?}"))?;
    Ok(true)
}

/// Delete `path` unconditionally. Used on clean daemon exit.
pub fn remove(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove pid file {path:?}"))?;
    }
    Ok(())
}

/// Hold the lock alive for the caller, e.g. across the daemon's whole
/// lifetime, so a second `write` against the same path fails immediately
/// instead of only racing at write time.
pub struct PidLock {
    path: PathBuf,
    file: File,
}

impl PidLock {
    /// Acquire the lock and write `pid`, keeping the file handle (and its
    /// lock) held until the returned guard drops.
    pub fn acquire(path: &Path, pid: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open pid file {path:?}"))?;
        file.try_lock_exclusive()
            .with_context(|| format!("pid file {path:?} is already locked by a live daemon"))?;
        file.set_len(0)?;
        use std::io::Write as _;
        let mut handle = &file;
        writeln!(handle, "{pid}")?;
        file.sync_all().ok();
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}
