use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::MetricsSnapshot;
use super::MetricsError;

/// How the session that produced a snapshot ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Complete,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalMetricsRecord {
    pub recorded_at: DateTime<Utc>,
    pub outcome: SessionOutcome,
    pub metrics: MetricsSnapshot,
}

/// Append-only history of finished sessions
///
/// The state file is deleted when a session ends, so its metrics are copied
/// here first as one JSON line per session.
#[derive(Debug, Clone)]
pub struct MetricsStorage {
    pub(super) storage_path: PathBuf,
}

impl MetricsStorage {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    fn history_file(&self) -> PathBuf {
        self.storage_path.join("rma_metrics.jsonl")
    }

    pub fn store_final_snapshot(&self, record: &FinalMetricsRecord) -> Result<(), MetricsError> {
        self.store_jsonl_entry(&self.history_file(), record)
    }

    pub fn load_final_snapshots(&self) -> Result<Vec<FinalMetricsRecord>, MetricsError> {
        let content = match fs::read_to_string(self.history_file()) {
            Ok(content) => content,
            // File doesn't exist yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FinalMetricsRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Failed to parse metrics line: {}", e);
                }
            }
        }
        Ok(records)
    }

    fn store_jsonl_entry<T: Serialize>(&self, file_path: &Path, entry: &T) -> Result<(), MetricsError> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry_json = serde_json::to_string(entry)?;
        let content = format!("{entry_json}\n");

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        file.write_all(content.as_bytes())?;

        Ok(())
    }
}
