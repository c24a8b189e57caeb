//! Execution History
//!
//! Persists a summary of every finished run.
//!
//! [`JsonFileHistory`] writes one pretty-printed JSON file per run to
//! `{history_dir}/{job_name}/{run_id}.json`. [`InMemoryHistory`] keeps
//! records in memory for tests and embedding.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorDetail, HistoryError};
use crate::monitoring::NodeTiming;
use crate::workflow::model::TerminalStatus;

/// Default history directory.
///
/// Resolved in the following order:
/// 1. `FLOWBATCH_HISTORY_DIR` environment variable
/// 2. `$HOME/.flowbatch/history`
/// 3. `.flowbatch/history` in the current directory
pub static HISTORY_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var("FLOWBATCH_HISTORY_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".flowbatch").join("history");
    }

    PathBuf::from(".flowbatch").join("history")
});

/// Outcome of one executed node, as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub outcome: String,
}

/// Persistent summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_name: String,
    pub run_id: Uuid,
    pub status: TerminalStatus,

    /// Every executed node, in execution order
    pub step_outcomes: Vec<StepOutcome>,

    pub timings: Vec<NodeTiming>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<ErrorDetail>,
}

/// Receives a record for every finished run.
pub trait HistorySink: Send + Sync {
    fn record(&self, record: &RunRecord) -> Result<(), HistoryError>;
}

/// File-backed history, one JSON file per run.
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    root: PathBuf,
}

impl JsonFileHistory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// History in [`HISTORY_DIR`].
    pub fn default_location() -> Self {
        Self::new(HISTORY_DIR.as_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `job_name`, which must be a single plain path segment.
    fn job_dir(&self, job_name: &str) -> Result<PathBuf, HistoryError> {
        let mut components = Path::new(job_name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain || job_name.contains(['/', '\\']) {
            return Err(HistoryError::InvalidJobName(job_name.to_string()));
        }
        Ok(self.root.join(job_name))
    }

    fn record_path(&self, job_name: &str, run_id: &Uuid) -> Result<PathBuf, HistoryError> {
        Ok(self.job_dir(job_name)?.join(format!("{}.json", run_id)))
    }

    /// Loads one stored run.
    pub fn load(&self, job_name: &str, run_id: &Uuid) -> Result<RunRecord, HistoryError> {
        let path = self.record_path(job_name, run_id)?;
        let content = fs::read_to_string(&path)?;
        let record: RunRecord = serde_json::from_str(&content)?;

        debug!("Loaded run record from {}", path.display());
        Ok(record)
    }

    /// Lists stored run ids of a job, oldest first.
    ///
    /// A job that never ran has no directory and yields an empty list.
    pub fn list(&self, job_name: &str) -> Result<Vec<Uuid>, HistoryError> {
        let dir = self.job_dir(job_name)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok());
            if let Some(id) = id {
                let modified = fs::metadata(&path)?.modified()?;
                entries.push((modified, id));
            }
        }

        entries.sort();
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }
}

impl HistorySink for JsonFileHistory {
    fn record(&self, record: &RunRecord) -> Result<(), HistoryError> {
        let path = self.record_path(&record.job_name, &record.run_id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)?;

        info!("Saved run history to {}", path.display());
        Ok(())
    }
}

/// History kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<RunRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<RunRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistorySink for InMemoryHistory {
    fn record(&self, record: &RunRecord) -> Result<(), HistoryError> {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::workflow::model::Outcome;
    use tempfile::tempdir;

    fn sample_record(job: &str, status: TerminalStatus) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            job_name: job.to_string(),
            run_id: Uuid::new_v4(),
            status,
            step_outcomes: vec![
                StepOutcome {
                    name: "packageItemStep".to_string(),
                    outcome: "COMPLETED".to_string(),
                },
                StepOutcome {
                    name: "driveToAddressStep".to_string(),
                    outcome: "FAILED".to_string(),
                },
            ],
            timings: vec![NodeTiming {
                node: "packageItemStep".to_string(),
                outcome: Outcome::Completed,
                started_at: now,
                finished_at: now,
                duration_ms: 0,
            }],
            started_at: now,
            finished_at: now,
            error: Some(ErrorDetail::new(
                ErrorKind::StepExecution,
                Some("driveToAddressStep".to_string()),
                "Got lost driving to the address",
            )),
        }
    }

    #[test]
    fn test_file_history_save_and_load() {
        let dir = tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path());
        let record = sample_record("deliverPackageJob", TerminalStatus::Failed);

        history.record(&record).unwrap();

        let path = dir
            .path()
            .join("deliverPackageJob")
            .join(format!("{}.json", record.run_id));
        assert!(path.exists());

        let loaded = history.load("deliverPackageJob", &record.run_id).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_file_history_rejects_path_like_job_names() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("history");
        let history = JsonFileHistory::new(&root);

        for name in ["../escaped", "a/b", "a\\b", "..", ".", ""] {
            let record = sample_record(name, TerminalStatus::Completed);
            let err = history.record(&record).unwrap_err();
            assert!(matches!(err, HistoryError::InvalidJobName(_)), "accepted '{}'", name);
            assert!(history.list(name).is_err());
        }

        assert!(!dir.path().join("escaped").exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_file_history_list() {
        let dir = tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path());

        assert!(history.list("billingJob").unwrap().is_empty());

        let first = sample_record("billingJob", TerminalStatus::Completed);
        let second = sample_record("billingJob", TerminalStatus::Completed);
        history.record(&first).unwrap();
        history.record(&second).unwrap();
        history
            .record(&sample_record("otherJob", TerminalStatus::Completed))
            .unwrap();

        let ids = history.list("billingJob").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.run_id));
        assert!(ids.contains(&second.run_id));
    }

    #[test]
    fn test_file_history_load_missing() {
        let dir = tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path());
        let err = history.load("billingJob", &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, HistoryError::Io(_)));
    }

    #[test]
    fn test_file_history_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path());
        fs::create_dir_all(dir.path().join("billingJob")).unwrap();
        fs::write(dir.path().join("billingJob").join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("billingJob").join("broken.json"), "{}").unwrap();

        assert!(history.list("billingJob").unwrap().is_empty());
    }

    #[test]
    fn test_record_json_uses_labels() {
        let record = sample_record("deliverPackageJob", TerminalStatus::Custom("UNVERIFIED".to_string()));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "UNVERIFIED");
        assert_eq!(json["step_outcomes"][1]["outcome"], "FAILED");
        assert_eq!(json["error"]["kind"], "StepExecution");
    }

    #[test]
    fn test_in_memory_history() {
        let history = InMemoryHistory::new();
        assert!(history.is_empty());

        history
            .record(&sample_record("billingJob", TerminalStatus::Completed))
            .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history.records()[0].job_name, "billingJob");
    }

    #[test]
    fn test_history_dir_is_resolved() {
        assert!(!HISTORY_DIR.as_os_str().is_empty());
        assert!(HISTORY_DIR.ends_with("history") || std::env::var("FLOWBATCH_HISTORY_DIR").is_ok());
    }
}
