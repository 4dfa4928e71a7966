//! Per-file outcomes and the run summary artifact

use crate::error::{BatchError, FailureKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted run summary
pub const SUMMARY_FILE_NAME: &str = "processing_summary.json";

/// Outcome of one discovered file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Succeeded { output: PathBuf, feature_count: usize },
    Failed { kind: FailureKind, reason: String },
    Skipped { reason: String },
}

impl FileOutcome {
    pub fn failed(error: &BatchError) -> Self {
        FileOutcome::Failed {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// A discovered file and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No file failed (including runs with no files)
    Success,
    /// Some files failed, at least one succeeded
    PartialFailure,
    /// Some files failed, none succeeded
    Failure,
}

/// Accumulated outcomes of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files: Vec<FileRecord>,
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    processing_summary: SummaryBody<'a>,
}

#[derive(Serialize)]
struct SummaryBody<'a> {
    total_files: usize,
    successful_files: usize,
    failed_files: usize,
    skipped_files: usize,
    success_rate: String,
    outcome: RunOutcome,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    elapsed_seconds: f64,
    files: &'a [FileRecord],
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            files: Vec::new(),
        }
    }

    pub fn record(&mut self, input: impl Into<PathBuf>, outcome: FileOutcome) {
        self.files.push(FileRecord {
            input: input.into(),
            outcome,
        });
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn successful_files(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_success()).count()
    }

    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_failure()).count()
    }

    pub fn skipped_files(&self) -> usize {
        self.total_files() - self.successful_files() - self.failed_files()
    }

    /// Records of failed files
    pub fn failures(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.outcome.is_failure())
    }

    /// Successful files as a percentage of all discovered files
    pub fn success_rate(&self) -> f64 {
        if self.files.is_empty() {
            return 0.0;
        }
        self.successful_files() as f64 / self.total_files() as f64 * 100.0
    }

    pub fn outcome(&self) -> RunOutcome {
        match (self.failed_files(), self.successful_files()) {
            (0, _) => RunOutcome::Success,
            (_, 0) => RunOutcome::Failure,
            _ => RunOutcome::PartialFailure,
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    /// Serialize as the `processing_summary.json` document
    pub fn to_json(&self) -> Result<String> {
        let document = SummaryDocument {
            processing_summary: SummaryBody {
                total_files: self.total_files(),
                successful_files: self.successful_files(),
                failed_files: self.failed_files(),
                skipped_files: self.skipped_files(),
                success_rate: format!("{:.1}%", self.success_rate()),
                outcome: self.outcome(),
                started_at: self.started_at,
                finished_at: self.finished_at,
                elapsed_seconds: self.elapsed_seconds(),
                files: &self.files,
            },
        };
        serde_json::to_string_pretty(&document).map_err(|e| BatchError::Summary(e.to_string()))
    }

    /// Persist the summary into `folder`, returning the file path
    pub fn write(&self, folder: &Path) -> Result<PathBuf> {
        let path = folder.join(SUMMARY_FILE_NAME);
        let text = self.to_json()?;
        std::fs::write(&path, text + "\n")
            .map_err(|e| BatchError::Summary(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}
