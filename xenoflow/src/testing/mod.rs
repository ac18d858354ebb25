//! Testing utilities for xenoflow pipelines.
//!
//! This module provides:
//! - A fake disambiguation program and a recording stage
//! - On-disk project fixtures
//! - Assertions over pair results and output files

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_outputs_absent, assert_outputs_present, assert_pair_failed, assert_pair_status,
};
pub use fixtures::{TestProject, FAKE_INPUT};
pub use mocks::{FakeDisambiguator, RecordingStage, FAKE_OUTPUT};
