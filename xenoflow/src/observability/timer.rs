//! Wall-clock timing for spans of work.

use std::time::{Duration, Instant};
use tracing::debug;

/// Times a named span of work and logs its duration when finished.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts timing `name`.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer, logs the span and returns its duration in milliseconds.
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed().as_secs_f64() * 1000.0;
        debug!(span = %self.name, duration_ms, "span finished");
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_measures() {
        let timer = SpanTimer::start("disambiguate");
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(timer.name(), "disambiguate");
        assert!(timer.elapsed() >= Duration::from_millis(2));
        assert!(timer.finish() >= 2.0);
    }
}
