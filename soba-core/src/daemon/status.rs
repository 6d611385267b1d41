//! Status file: `status.json`, written atomically (temp file + rename) so a
//! reader never observes a half-written document (spec §3, §6).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentIssue {
    pub number: u64,
    pub phase: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastProcessed {
    pub number: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StatusFile {
    pub current_issue: Option<CurrentIssue>,
    pub last_processed: Option<LastProcessed>,
    pub memory_mb: Option<f64>,
}

impl StatusFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read status file {path:?}"))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse status file {path:?}"))
    }

    /// Write `self` atomically: serialize to a sibling temp file, then
    /// rename over `path`. A crash mid-write leaves either the old file or
    /// nothing, never a truncated one.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("failed to write temp status file {tmp_path:?}"))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to install status file {path:?}"))?;
        Ok(())
    }

    pub fn update_current_issue(
        path: &Path,
        number: u64,
        phase: &str,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut status = Self::load(path)?;
        status.current_issue = Some(CurrentIssue {
            number,
            phase: phase.to_string(),
            started_at,
        });
        status.save(path)
    }

    pub fn clear_current_issue(path: &Path) -> Result<()> {
        let mut status = Self::load(path)?;
        status.current_issue = None;
        status.save(path)
    }

    pub fn update_last_processed(
        path: &Path,
        number: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut status = Self::load(path)?;
        status.last_processed = Some(LastProcessed {
            number,
            completed_at,
        });
        status.save(path)
    }

    pub fn update_memory(path: &Path, memory_mb: f64) -> Result<()> {
        let mut status = Self::load(path)?;
        status.memory_mb = Some(memory_mb);
        status.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let status = StatusFile::load(&dir.path().join("status.json")).unwrap();
        assert_eq!(status, StatusFile::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        let now = Utc::now();
        StatusFile::update_current_issue(&path, 10, "implement", now).unwrap();
        let status = StatusFile::load(&path).unwrap();
        assert_eq!(status.current_issue.unwrap().number, 10);
    }

    #[test]
    fn update_last_processed_preserves_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        StatusFile::update_memory(&path, 128.5).unwrap();
        StatusFile::update_last_processed(&path, 7, Utc::now()).unwrap();
        let status = StatusFile::load(&path).unwrap();
        assert_eq!(status.memory_mb, Some(128.5));
        assert_eq!(status.last_processed.unwrap().number, 7);
    }

    #[test]
    fn clear_current_issue_removes_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        StatusFile::update_current_issue(&path, 3, "plan", Utc::now()).unwrap();
        StatusFile::clear_current_issue(&path).unwrap();
        let status = StatusFile::load(&path).unwrap();
        assert!(status.current_issue.is_none());
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        StatusFile::default().save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
    }
}
