use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use serde::Serialize;

use crate::debouncer::{Direction, EdgeDebouncer, EdgeState, Level};

/// A channel identifier, usually the number of the monitored pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Rising and falling edge counters of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Number of accepted rising edges.
    pub rising: u32,
    /// Number of accepted falling edges.
    pub falling: u32,
}

/// A consistent copy of a channel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Channel identifier.
    pub channel: ChannelId,
    /// Edge counters.
    pub counters: Counters,
    /// Current stable level.
    pub level: Level,
    /// The direction the channel is waiting for.
    pub armed: Direction,
    /// Timestamp of the last accepted transition.
    pub last_accepted_ms: Option<u32>,
    /// Number of discarded transitions.
    pub noise: u32,
}

impl Snapshot {
    const fn new(channel: ChannelId, state: &EdgeState) -> Self {
        Self {
            channel,
            counters: Counters {
                rising: state.rising,
                falling: state.falling,
            },
            level: state.level,
            armed: state.armed,
            last_accepted_ms: state.last_accepted_ms,
            noise: state.noise,
        }
    }
}

/// The outcome of a [`SignalChannel::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drain {
    /// The channel record at drain time.
    pub snapshot: Snapshot,
    /// Whether the counters changed since the previous drain.
    pub changed: bool,
}

/// A monitored digital input.
///
/// A [`SignalChannel`] is meant to be placed in a `static` and shared by
/// reference between the interrupt handler of its input and the main loop.
///
/// - The interrupt handler calls [`SignalChannel::record_edge`] only
/// - The main loop calls [`SignalChannel::drain`] and the read-only
///   queries only
///
/// Each call copies the whole record inside one critical section, so every
/// reader observes the counters either before or after an edge.
pub struct SignalChannel {
    id: ChannelId,
    debouncer: EdgeDebouncer,
    initial_level: Level,
    state: Mutex<Cell<EdgeState>>,
}

impl SignalChannel {
    /// Creates a [`SignalChannel`] whose input rests at the low level, hence
    /// armed for a rising edge.
    #[must_use]
    pub const fn new(id: ChannelId, window_ms: u32) -> Self {
        Self::with_level(id, window_ms, Level::Low)
    }

    /// Creates a [`SignalChannel`] whose input rests at the given level.
    #[must_use]
    pub const fn with_level(id: ChannelId, window_ms: u32, level: Level) -> Self {
        Self {
            id,
            debouncer: EdgeDebouncer::new(window_ms),
            initial_level: level,
            state: Mutex::new(Cell::new(EdgeState::new(level))),
        }
    }

    /// Returns the channel identifier.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the debounce window in milliseconds.
    #[must_use]
    pub const fn window_ms(&self) -> u32 {
        self.debouncer.window_ms()
    }

    /// Records a transition notification observed at `now_ms`.
    ///
    /// Interrupt context only. Returns the accepted direction, or `None` when
    /// the notification has been discarded as noise.
    pub fn record_edge(&self, now_ms: u32) -> Option<Direction> {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let accepted = self.debouncer.on_transition(&mut state, now_ms);
            cell.set(state);
            accepted
        })
    }

    /// Returns the direction the channel is waiting for.
    ///
    /// An interrupt handler uses it to re-arm its input for the right edge.
    #[must_use]
    pub fn armed(&self) -> Direction {
        critical_section::with(|cs| self.state.borrow(cs).get().armed)
    }

    /// Whether the counters changed since the last drain.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get().dirty)
    }

    /// Returns a copy of the channel record without clearing the dirty flag.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let state = critical_section::with(|cs| self.state.borrow(cs).get());
        Snapshot::new(self.id, &state)
    }

    /// Returns the counters without clearing the dirty flag.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.snapshot().counters
    }

    /// Main loop only. Clears the dirty flag and returns the record.
    ///
    /// Draining a clean channel changes nothing and returns the same snapshot
    /// as the previous drain.
    pub fn drain(&self) -> Drain {
        let state = critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let state = cell.get();
            if state.dirty {
                cell.set(EdgeState {
                    dirty: false,
                    ..state
                });
            }
            state
        });

        Drain {
            snapshot: Snapshot::new(self.id, &state),
            changed: state.dirty,
        }
    }

    // The record of a channel that never accepted an edge.
    pub(crate) const fn baseline(&self) -> Snapshot {
        Snapshot::new(self.id, &EdgeState::new(self.initial_level))
    }
}

impl fmt::Debug for SignalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalChannel")
            .field("id", &self.id)
            .field("window_ms", &self.window_ms())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
