//! Per-pair outcomes and per-stage reports.

use crate::branch::BranchPair;
use crate::errors::XenoflowError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// How a pair got to its final outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// The external program ran and its outputs were moved.
    Executed,
    /// Temporary outputs were already present; they were moved without
    /// running the program.
    Skipped,
    /// Final outputs were already present; nothing was touched.
    AlreadyComplete,
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::Skipped => write!(f, "skipped"),
            Self::AlreadyComplete => write!(f, "already_complete"),
        }
    }
}

/// Successful result of processing one pair through one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairOutcome {
    /// Sample name of the pair.
    pub sample: String,
    /// How the outputs were obtained.
    pub status: PairStatus,
    /// Final output paths, ordered like the stage's output layout.
    pub outputs: Vec<PathBuf>,
}

/// One pair's entry in a [`StageReport`].
#[derive(Debug)]
pub struct PairResult {
    /// The input pair.
    pub pair: BranchPair,
    /// Sample name of the pair.
    pub sample: String,
    /// Outcome or error.
    pub result: Result<PairOutcome, XenoflowError>,
}

impl PairResult {
    /// True if the pair reached its final outputs.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Status of a successful pair.
    #[must_use]
    pub fn status(&self) -> Option<PairStatus> {
        self.result.as_ref().ok().map(|o| o.status)
    }
}

/// Everything one stage did over its input pairs, in input order.
#[derive(Debug)]
pub struct StageReport {
    /// Stage name.
    pub stage: String,
    /// Per-pair results.
    pub pairs: Vec<PairResult>,
    /// Wall-clock duration of the stage in milliseconds.
    pub duration_ms: f64,
}

impl StageReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            pairs: Vec::new(),
            duration_ms: 0.0,
        }
    }

    /// Number of pairs with the given status.
    #[must_use]
    pub fn count(&self, status: PairStatus) -> usize {
        self.pairs.iter().filter(|p| p.status() == Some(status)).count()
    }

    /// Number of failed pairs.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.pairs.iter().filter(|p| !p.is_ok()).count()
    }

    /// True if no pair failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed entries.
    pub fn failures(&self) -> impl Iterator<Item = &PairResult> {
        self.pairs.iter().filter(|p| !p.is_ok())
    }

    /// Pairs that succeeded, for feeding into the next stage.
    #[must_use]
    pub fn succeeded_pairs(&self) -> Vec<BranchPair> {
        self.pairs
            .iter()
            .filter(|p| p.is_ok())
            .map(|p| p.pair.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchMarkers;
    use crate::errors::ProcessError;

    fn pair(sample: &str) -> BranchPair {
        BranchPair::from_files(
            format!("{sample}.Human.bam"),
            format!("{sample}.Mouse.bam"),
            &BranchMarkers::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_report_counts() {
        let mut report = StageReport::new("disambiguate");
        report.pairs.push(PairResult {
            pair: pair("s1"),
            sample: "s1".into(),
            result: Ok(PairOutcome {
                sample: "s1".into(),
                status: PairStatus::Executed,
                outputs: vec![],
            }),
        });
        report.pairs.push(PairResult {
            pair: pair("s2"),
            sample: "s2".into(),
            result: Err(ProcessError::failed("disambiguate", "x", Some(1), None).into()),
        });
        report.pairs.push(PairResult {
            pair: pair("s3"),
            sample: "s3".into(),
            result: Ok(PairOutcome {
                sample: "s3".into(),
                status: PairStatus::AlreadyComplete,
                outputs: vec![],
            }),
        });

        assert_eq!(report.count(PairStatus::Executed), 1);
        assert_eq!(report.count(PairStatus::AlreadyComplete), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert_eq!(report.succeeded_pairs().len(), 2);
        assert_eq!(report.failures().next().unwrap().sample, "s2");
    }
}
