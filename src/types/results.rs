use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Sample;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// Everything a finished run hands over to the exporter
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub outcome: RunOutcome,
    pub samples: Vec<Sample>,
    pub steps_completed: usize,
    pub sequence_len: usize,
    /// Transition counts keyed by "FROM-TO" label
    pub paths: BTreeMap<String, u32>,
    pub duration_s: f64,
}

impl RunRecord {
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Result of an export operation
#[derive(Debug)]
pub struct ExportResult {
    pub path: Option<PathBuf>,
    pub rows_written: usize,
    pub message: String,
}

impl ExportResult {
    pub fn success(path: PathBuf, rows_written: usize) -> Self {
        let message = format!("Exported {} rows to {}", rows_written, path.display());
        Self {
            path: Some(path),
            rows_written,
            message,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            path: None,
            rows_written: 0,
            message,
        }
    }

    pub fn no_data() -> Self {
        Self {
            path: None,
            rows_written: 0,
            message: "No samples to export".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.path.is_some()
    }
}
