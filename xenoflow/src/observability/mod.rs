//! Observability utilities.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary via [`init_logging`].

mod logging;
mod timer;

pub use logging::{filter_from_level, init_logging};
pub use timer::SpanTimer;
