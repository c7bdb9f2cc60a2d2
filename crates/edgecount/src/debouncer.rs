use core::fmt;

use serde::Serialize;

/// The level of a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Low level.
    Low,
    /// High level.
    High,
}

/// The direction of a signal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Rising => Self::Falling,
            Self::Falling => Self::Rising,
        }
    }

    /// Returns the level reached after a transition in this direction.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Rising => Level::High,
            Self::Falling => Level::Low,
        }
    }

    /// Returns the only transition possible from the given level.
    #[must_use]
    pub const fn from_level(level: Level) -> Self {
        match level {
            Level::Low => Self::Rising,
            Level::High => Self::Falling,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
        }
        .fmt(f)
    }
}

/// The edge counting record of a single channel.
///
/// The `armed` direction is the only transition the channel is waiting for:
/// every accepted transition arms the opposite one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeState {
    pub(crate) rising: u32,
    pub(crate) falling: u32,
    pub(crate) last_accepted_ms: Option<u32>,
    pub(crate) level: Level,
    pub(crate) armed: Direction,
    pub(crate) dirty: bool,
    pub(crate) noise: u32,
}

impl EdgeState {
    /// Creates an [`EdgeState`] for an input resting at the given level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self {
            rising: 0,
            falling: 0,
            last_accepted_ms: None,
            level,
            armed: Direction::from_level(level),
            dirty: false,
            noise: 0,
        }
    }
}

/// An interval-only debouncer.
///
/// A transition is accepted when strictly more than `window_ms` milliseconds
/// elapsed since the last accepted one, otherwise it is noise. The first
/// transition of a channel is always accepted.
///
/// Timestamps come from a free-running 32-bit millisecond clock, hence the
/// elapsed time is computed with a wrapping subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeDebouncer {
    window_ms: u32,
}

impl EdgeDebouncer {
    /// Creates an [`EdgeDebouncer`] with the given window in milliseconds.
    #[must_use]
    pub const fn new(window_ms: u32) -> Self {
        Self { window_ms }
    }

    /// Returns the debounce window in milliseconds.
    #[must_use]
    pub const fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Applies a transition notification observed at `now_ms`.
    ///
    /// Returns the accepted direction, or `None` when the notification is
    /// noise. Noise leaves the counters and the armed direction untouched.
    ///
    /// It never blocks nor allocates, so it is safe to call from an
    /// interrupt handler.
    pub fn on_transition(&self, state: &mut EdgeState, now_ms: u32) -> Option<Direction> {
        if let Some(last) = state.last_accepted_ms
            && now_ms.wrapping_sub(last) <= self.window_ms
        {
            state.noise = state.noise.wrapping_add(1);
            return None;
        }

        let direction = state.armed;
        match direction {
            Direction::Rising => state.rising = state.rising.wrapping_add(1),
            Direction::Falling => state.falling = state.falling.wrapping_add(1),
        }

        state.last_accepted_ms = Some(now_ms);
        state.level = direction.level();
        state.armed = direction.opposite();
        state.dirty = true;

        Some(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, EdgeDebouncer, EdgeState, Level};

    const WINDOW: u32 = 100;

    fn apply(debouncer: &EdgeDebouncer, state: &mut EdgeState, times: &[u32]) {
        for time in times {
            let _ = debouncer.on_transition(state, *time);
        }
    }

    #[test]
    fn first_transition_is_always_accepted() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);

        assert_eq!(debouncer.on_transition(&mut state, 0), Some(Direction::Rising));
        assert_eq!(state.rising, 1);
        assert_eq!(state.level, Level::High);
        assert_eq!(state.armed, Direction::Falling);
        assert!(state.dirty);
    }

    #[test]
    fn noise_within_window_is_discarded() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);

        // Rising at 0, a rising bounce at 50, then a genuine falling at 150.
        assert_eq!(debouncer.on_transition(&mut state, 0), Some(Direction::Rising));
        assert_eq!(debouncer.on_transition(&mut state, 50), None);
        assert_eq!(state.armed, Direction::Falling);
        assert_eq!(debouncer.on_transition(&mut state, 150), Some(Direction::Falling));

        assert_eq!((state.rising, state.falling), (1, 1));
        assert_eq!(state.noise, 1);
        assert_eq!(state.last_accepted_ms, Some(150));
    }

    #[test]
    fn exact_window_is_noise() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);

        apply(&debouncer, &mut state, &[1000, 1100]);
        assert_eq!((state.rising, state.falling), (1, 0));

        apply(&debouncer, &mut state, &[1101]);
        assert_eq!((state.rising, state.falling), (1, 1));
    }

    #[test]
    fn spaced_transitions_are_all_counted() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);

        let times = (0..50u32).map(|i| i * (WINDOW + 1)).collect::<alloc::vec::Vec<_>>();
        apply(&debouncer, &mut state, &times);

        assert_eq!(state.rising + state.falling, 50);
        assert_eq!((state.rising, state.falling), (25, 25));
        assert_eq!(state.noise, 0);
    }

    #[test]
    fn bursts_collapse_into_one_event() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::High);

        // A falling edge followed by a burst of bounces within the window.
        apply(&debouncer, &mut state, &[500, 510, 520, 530, 599, 600]);

        assert_eq!((state.rising, state.falling), (0, 1));
        assert_eq!(state.noise, 5);
        assert_eq!(state.armed, Direction::Rising);
    }

    #[test]
    fn counts_alternate_strictly() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);

        let mut now = 0u32;
        for step in [3u32, 250, 40, 101, 99, 500, 7, 102, 1, 1000] {
            now = now.wrapping_add(step);
            let _ = debouncer.on_transition(&mut state, now);
            assert!(state.rising.abs_diff(state.falling) <= 1);
        }
    }

    #[test]
    fn clock_wrap_around() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);

        // 50 ms elapsed across the wrap: noise.
        apply(&debouncer, &mut state, &[u32::MAX - 20, 29]);
        assert_eq!((state.rising, state.falling), (1, 0));

        // 150 ms elapsed across the wrap: accepted.
        apply(&debouncer, &mut state, &[129]);
        assert_eq!((state.rising, state.falling), (1, 1));
    }

    #[test]
    fn counters_wrap_on_overflow() {
        let debouncer = EdgeDebouncer::new(WINDOW);
        let mut state = EdgeState::new(Level::Low);
        state.rising = u32::MAX;

        let _ = debouncer.on_transition(&mut state, 0);
        assert_eq!(state.rising, 0);
        assert!(state.dirty);
    }
}
