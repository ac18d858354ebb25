//! Stage trait and implementations.
//!
//! A stage takes a list of input pairs, runs per-pair work through the
//! [`Executor`] and reports what happened to each pair.

mod disambiguate;
mod registry;
mod report;
mod runner;
mod workspace;

pub use disambiguate::DisambiguateStage;
pub use registry::{StageContext, StageFactory, StageRegistry};
pub use report::{PairOutcome, PairResult, PairStatus, StageReport};
pub use runner::{StageRunner, StagedOutputs, DEFAULT_PROGRAM, PERL};
pub use workspace::{Cleanup, StageLease, StageWorkspace};

use crate::branch::BranchPair;
use crate::executor::Executor;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Temporary and final path of every output the stage would produce for
    /// a pair. Stages without file outputs return nothing.
    fn plan(&self, _pair: &BranchPair) -> Vec<(PathBuf, PathBuf)> {
        Vec::new()
    }

    /// Processes every pair.
    ///
    /// Per-pair failures are reported in the [`StageReport`], never
    /// propagated; one pair failing does not stop the others.
    async fn run(&self, inputs: &[BranchPair], executor: &Executor) -> StageReport;
}
