//! Run lifecycle events.
//!
//! Sinks are handed to the runner and pipeline explicitly; there is no
//! process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// A stage began processing its inputs.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage finished processing all of its inputs.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// The external program is about to run for a pair.
pub const PAIR_INVOKED: &str = "pair.invoked";
/// A pair's temporary outputs already existed; the program was not run.
pub const PAIR_SKIPPED: &str = "pair.skipped";
/// A pair's final outputs already existed; nothing was done.
pub const PAIR_ALREADY_COMPLETE: &str = "pair.already_complete";
/// A pair's outputs were moved into the final layout.
pub const PAIR_FINALIZED: &str = "pair.finalized";
/// A pair failed.
pub const PAIR_FAILED: &str = "pair.failed";
/// The temporary stage directory was removed.
pub const WORKSPACE_REMOVED: &str = "workspace.removed";
/// The temporary stage directory was kept because a pair failed in it.
pub const WORKSPACE_KEPT: &str = "workspace.kept";
/// A pipeline run began.
pub const RUN_STARTED: &str = "run.started";
/// A pipeline run finished, successfully or not.
pub const RUN_COMPLETED: &str = "run.completed";
/// An input pair was rejected before any stage ran.
pub const INPUT_REJECTED: &str = "input.rejected";
