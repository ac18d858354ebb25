//! YAML pipeline configuration.
//!
//! This module provides:
//! - The top-level [`PipelineConfig`] and its sections
//! - Loading from YAML files or strings
//! - Key-presence validation performed before any stage runs

mod logging;
mod pipeline;

pub use logging::{LogConfig, LogFormat};
pub use pipeline::{
    BranchConfig, BranchesConfig, ClusterConfig, PipelineConfig, StageConfig, RESULTS_KEY,
};
