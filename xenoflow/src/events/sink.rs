//! Event sink trait and implementations.

use parking_lot::Mutex;
use std::fmt::Debug;
use tracing::{debug, info, Level};

/// Receives lifecycle events from the runner and pipeline.
///
/// Emission must never fail or block for long; sinks that forward events
/// elsewhere should buffer internally.
pub trait EventSink: Send + Sync + Debug {
    /// Records an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - Dotted event name, e.g. `pair.finalized`
    /// * `data` - Optional structured payload
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    ///
    /// Anything other than `DEBUG` or `TRACE` logs at `INFO`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let data = data.map_or_else(String::new, |d| d.to_string());
        if self.level >= Level::DEBUG {
            debug!(event = event_type, %data, "xenoflow event");
        } else {
            info!(event = event_type, %data, "xenoflow event");
        }
    }
}

/// One event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Dotted event name.
    pub name: String,
    /// Payload, if any.
    pub data: Option<serde_json::Value>,
}

/// Stores events in memory. Used by tests and by callers that want to
/// inspect a run after the fact.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything collected so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns the collected event names in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    /// Returns how many events with this name were collected.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }

    /// Returns the payloads of all events with this name.
    #[must_use]
    pub fn payloads(&self, name: &str) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .filter_map(|e| e.data.clone())
            .collect()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.lock().push(RecordedEvent {
            name: event_type.to_string(),
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit("pair.invoked", None);
        LoggingEventSink::default().emit("pair.invoked", Some(serde_json::json!({"sample": "s1"})));
        LoggingEventSink::debug().emit("pair.skipped", None);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("stage.started", None);
        sink.emit("pair.invoked", Some(serde_json::json!({"sample": "s1"})));
        sink.emit("pair.invoked", Some(serde_json::json!({"sample": "s2"})));
        sink.emit("stage.completed", None);

        assert_eq!(sink.events().len(), 4);
        assert_eq!(sink.count("pair.invoked"), 2);
        assert_eq!(sink.names().first().map(String::as_str), Some("stage.started"));
        let samples: Vec<_> = sink
            .payloads("pair.invoked")
            .iter()
            .filter_map(|d| d["sample"].as_str().map(str::to_string))
            .collect();
        assert_eq!(samples, vec!["s1", "s2"]);
        assert!(sink.payloads("stage.started").is_empty());
    }
}
