/// A bounded sequence of retry delays, in milliseconds.
///
/// Each delay doubles the previous one up to `max_delay_ms`. The sequence ends
/// after `attempts` delays, at which point the failure must be considered
/// persistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    next_delay_ms: u32,
    max_delay_ms: u32,
    remaining: u32,
}

impl Backoff {
    /// Creates a [`Backoff`] starting from the given delay, with a maximum
    /// delay of 8 seconds and 10 attempts.
    #[must_use]
    pub const fn new(initial_delay_ms: u32) -> Self {
        Self {
            next_delay_ms: initial_delay_ms,
            max_delay_ms: 8_000,
            remaining: 10,
        }
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn max_delay(mut self, max_delay_ms: u32) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Sets the number of attempts.
    #[must_use]
    pub const fn attempts(mut self, attempts: u32) -> Self {
        self.remaining = attempts;
        self
    }
}

impl Iterator for Backoff {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.next_delay_ms.min(self.max_delay_ms);
        self.next_delay_ms = self.next_delay_ms.saturating_mul(2);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::Backoff;

    #[test]
    fn doubles_up_to_the_maximum() {
        let delays = Backoff::new(500)
            .max_delay(3_000)
            .attempts(6)
            .collect::<Vec<_>>();
        assert_eq!(delays, [500, 1_000, 2_000, 3_000, 3_000, 3_000]);
    }

    #[test]
    fn no_attempts() {
        assert_eq!(Backoff::new(500).attempts(0).next(), None);
    }

    #[test]
    fn saturates() {
        let last = Backoff::new(u32::MAX / 2)
            .max_delay(u32::MAX)
            .attempts(4)
            .last();
        assert_eq!(last, Some(u32::MAX));
    }
}
