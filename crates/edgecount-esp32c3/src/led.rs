use esp_hal::gpio::{Level, Output};

use edgecount::routes::StatusIndicator;

/// A [`StatusIndicator`] driving a led.
pub struct LedIndicator {
    led: Output<'static>,
    active_low: bool,
}

impl LedIndicator {
    /// Creates a [`LedIndicator`] for a led lit by a high level, and turns it
    /// off.
    #[must_use]
    pub fn new(led: Output<'static>) -> Self {
        Self::with_polarity(led, false)
    }

    /// Creates a [`LedIndicator`] for a led lit by a low level, and turns it
    /// off.
    #[must_use]
    pub fn active_low(led: Output<'static>) -> Self {
        Self::with_polarity(led, true)
    }

    fn with_polarity(led: Output<'static>, active_low: bool) -> Self {
        let mut indicator = Self { led, active_low };
        indicator.set(false);
        indicator
    }
}

impl StatusIndicator for LedIndicator {
    fn set(&mut self, on: bool) {
        self.led.set_level(if on == self.active_low {
            Level::Low
        } else {
            Level::High
        });
    }
}
