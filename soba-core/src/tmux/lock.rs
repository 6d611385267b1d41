//! Advisory lock guarding window creation, so two scheduler ticks racing
//! on the same issue never create duplicate windows (spec §4.7).
//!
//! Grounded on the exclusive-lock idiom used for the daemon's own PID
//! file (`fs2::FileExt`, see [`crate::daemon::pidfile`]) — here scoped to
//! a short-lived, per-window lock file instead of the whole-process one.

use anyhow::{anyhow, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A held advisory lock. Releases (and leaves the lock file behind, for
/// reuse by the next acquirer) when dropped.
pub struct WindowLock {
    _file: File,
    path: PathBuf,
}

impl WindowLock {
    /// Try to acquire the named lock under `lock_dir`, polling until
    /// `timeout` elapses. Returns an error if the lock is still held by
    /// another process when the timeout expires.
    pub fn acquire(lock_dir: &Path, name: &str, timeout: Duration) -> Result<Self> {
        std::fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { _file: file, path }),
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(_) => {
                    return Err(anyhow!(
                        "timed out after {:?} acquiring window lock {name}",
                        timeout
                    ))
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WindowLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self._file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquires_and_releases() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = WindowLock::acquire(dir.path(), "window-a", Duration::from_secs(1))
                .unwrap();
            assert!(_lock.path().exists());
        }
        // Second acquire succeeds once the first is dropped.
        let _lock2 = WindowLock::acquire(dir.path(), "window-a", Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn distinct_names_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let _a = WindowLock::acquire(dir.path(), "window-a", Duration::from_secs(1)).unwrap();
        let _b = WindowLock::acquire(dir.path(), "window-b", Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn times_out_when_already_held() {
        let dir = TempDir::new().unwrap();
        let _held = WindowLock::acquire(dir.path(), "window-c", Duration::from_secs(5)).unwrap();
        let result = WindowLock::acquire(dir.path(), "window-c", Duration::from_millis(100));
        assert!(result.is_err());
    }
}
