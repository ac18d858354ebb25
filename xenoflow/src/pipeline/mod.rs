//! Pipeline discovery and execution.
//!
//! This module provides:
//! - Input discovery and pairing
//! - The [`Pipeline`] driver running the configured stages in order
//! - Failure modes, failure records and run summaries

mod discovery;
mod failure;
mod runner;
mod summary;

pub use discovery::{check_unique_samples, discover, find_inputs, pair_inputs, DiscoveredPairs};
pub use failure::{FailureCollector, FailureMode, FailureRecord};
pub use runner::{Pipeline, PlannedPair, INPUTS_STAGE};
pub use summary::{RunSummary, StageSummary};
