//! # Xenoflow
//!
//! An idempotent, staged file-pipeline runner for two-genome read
//! disambiguation.
//!
//! Every input sample is a pair of alignment files, one per reference
//! genome (by default `Human` and `Mouse`). A stage runs an external program
//! over each pair, writes into a shared temporary directory and moves the
//! results into a per-genome layout:
//!
//! - **Idempotent**: a pair whose outputs already exist is not recomputed
//! - **Concurrent**: pairs run in parallel up to a configurable bound
//! - **Forensic**: a failing pair leaves the temporary directory in place
//! - **Observable**: `tracing` throughout, plus an explicit event sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use xenoflow::prelude::*;
//!
//! let config = PipelineConfig::from_file("pipeline.yaml")?;
//! let summary = Pipeline::new(config).run().await?;
//! println!("{summary}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod branch;
pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod layout;
pub mod observability;
pub mod pipeline;
pub mod process;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::branch::{Branch, BranchMarkers, BranchPair};
    pub use crate::config::{LogConfig, LogFormat, PipelineConfig, StageConfig};
    pub use crate::errors::{ErrorKind, Result, XenoflowError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::Executor;
    pub use crate::layout::{OutputKind, StageLayout};
    pub use crate::pipeline::{FailureMode, Pipeline, RunSummary};
    pub use crate::process::{Invocation, ProcessInvoker, ProgramInvoker};
    pub use crate::stages::{
        DisambiguateStage, PairOutcome, PairStatus, Stage, StageRegistry, StageRunner,
    };
}
