//! Run and stage summaries.

use super::failure::FailureRecord;
use crate::stages::{PairStatus, StageReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Per-stage counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    /// Stage name.
    pub stage: String,
    /// Pairs given to the stage.
    pub total: usize,
    /// Pairs for which the program ran.
    pub executed: usize,
    /// Pairs whose temporary outputs were reused.
    pub skipped: usize,
    /// Pairs whose final outputs already existed.
    pub already_complete: usize,
    /// Pairs that failed.
    pub failed: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl StageSummary {
    /// Summarizes a stage report.
    #[must_use]
    pub fn from_report(report: &StageReport) -> Self {
        Self {
            stage: report.stage.clone(),
            total: report.pairs.len(),
            executed: report.count(PairStatus::Executed),
            skipped: report.count(PairStatus::Skipped),
            already_complete: report.count(PairStatus::AlreadyComplete),
            failed: report.failed(),
            duration_ms: report.duration_ms,
        }
    }

    /// Pairs that reached their final outputs.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.executed + self.skipped + self.already_complete
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} pairs, {} executed, {} skipped, {} already complete, {} failed",
            self.stage, self.total, self.executed, self.skipped, self.already_complete, self.failed
        )
    }
}

/// Outcome of a whole pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// Number of input pairs that passed labeling.
    pub pairs: usize,
    /// Summaries of the stages that ran, in order.
    pub stages: Vec<StageSummary>,
    /// Stages of the run list that did not run because of earlier failures.
    pub not_run: Vec<String>,
    /// Every recorded failure.
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// True if nothing failed and every stage ran.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.not_run.is_empty()
    }

    /// Summary of a stage, if it ran.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == name)
    }

    /// Wall-clock duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} ({} pairs)", self.run_id, self.pairs)?;
        for stage in &self.stages {
            writeln!(f, "  {stage}")?;
        }
        for stage in &self.not_run {
            writeln!(f, "  {stage}: not run")?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  FAILED [{}] {} {}: {}",
                failure.kind,
                failure.stage,
                failure.sample.as_deref().unwrap_or("-"),
                failure.error
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_summary_display() {
        let summary = StageSummary {
            stage: "disambiguate".into(),
            total: 3,
            executed: 1,
            skipped: 1,
            already_complete: 0,
            failed: 1,
            duration_ms: 1.0,
        };
        assert_eq!(summary.completed(), 2);
        assert_eq!(
            summary.to_string(),
            "disambiguate: 3 pairs, 1 executed, 1 skipped, 0 already complete, 1 failed"
        );
    }

    #[test]
    fn test_run_summary_success() {
        let now = Utc::now();
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            pairs: 0,
            stages: Vec::new(),
            not_run: vec!["disambiguate".into()],
            failures: Vec::new(),
        };
        assert!(!summary.is_success());
        assert!(summary.to_string().contains("disambiguate: not run"));
    }
}
