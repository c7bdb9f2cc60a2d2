use std::time::{Duration, Instant};

use edgecount::routes::StatusIndicator;
use edgecount::scheduler::Pause;

use tracing::debug;

/// A [`Pause`] yielding to the `tokio` runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

impl Pause for TokioPause {
    async fn pause(&mut self, duration_ms: u32) {
        tokio::time::sleep(Duration::from_millis(u64::from(duration_ms))).await;
    }
}

/// A [`StatusIndicator`] which logs its changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIndicator {
    on: bool,
}

impl LogIndicator {
    /// Whether the indicator is on.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.on
    }
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            debug!("Status indicator {}", if on { "on" } else { "off" });
        }
        self.on = on;
    }
}

/// A monotonic millisecond clock started at its creation.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Starts a [`Clock`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the milliseconds elapsed since the clock start.
    ///
    /// The value wraps around after about 49.7 days, like a hardware tick
    /// counter.
    #[must_use]
    pub fn now_ms(&self) -> u32 {
        // Truncation is the wrap around.
        self.start.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use edgecount::routes::StatusIndicator;
    use edgecount::scheduler::Pause;

    use super::{Clock, LogIndicator, TokioPause};

    #[test]
    fn indicator_state() {
        let mut indicator = LogIndicator::default();
        assert!(!indicator.is_on());

        indicator.set(true);
        assert!(indicator.is_on());

        indicator.set(false);
        assert!(!indicator.is_on());
    }

    #[tokio::test]
    async fn pause_and_clock() {
        let clock = Clock::new();
        TokioPause.pause(10).await;

        let elapsed = clock.now_ms();
        assert!(elapsed >= 10, "only {elapsed} ms elapsed");

        std::thread::sleep(Duration::from_millis(1));
        assert!(clock.now_ms() > elapsed);
    }
}
