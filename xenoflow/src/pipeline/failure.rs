//! Failure tracking across stages.
//!
//! Pair failures never abort the other pairs of a stage. The
//! [`FailureMode`] decides whether later stages still run once any pair
//! has failed.

use crate::errors::{ErrorKind, XenoflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to handle pair failures between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Finish the current stage, then stop (default).
    #[default]
    FailFast,
    /// Continue later stages with the pairs that succeeded.
    ContinueOnFailure,
}

/// Record of one pair failing in one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage name, or `inputs` for failures before any stage ran.
    pub stage: String,
    /// Sample name, if known.
    pub sample: Option<String>,
    /// Input files involved.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Error category.
    pub kind: ErrorKind,
    /// Error message.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a record from an error.
    #[must_use]
    pub fn new(stage: impl Into<String>, error: &XenoflowError) -> Self {
        Self {
            stage: stage.into(),
            sample: None,
            files: Vec::new(),
            kind: error.kind(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Sets the sample name.
    #[must_use]
    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    /// Sets the input files.
    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }
}

/// Collects failures during a run and decides whether to go on.
#[derive(Debug)]
pub struct FailureCollector {
    /// Failure mode.
    pub mode: FailureMode,
    failures: Vec<FailureRecord>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
        }
    }

    /// Records a failure.
    pub fn record(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    /// Returns true if any failure was recorded.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns true if no further stage should start.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        match self.mode {
            FailureMode::FailFast => self.has_failures(),
            FailureMode::ContinueOnFailure => false,
        }
    }

    /// Recorded failures, in order.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Consumes the collector, returning the records.
    #[must_use]
    pub fn into_failures(self) -> Vec<FailureRecord> {
        self.failures
    }
}
