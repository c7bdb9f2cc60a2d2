use core::fmt;

use serde::Serialize;

use crate::channel::ChannelId;
use crate::debouncer::Direction;

/// A single accepted edge, as observed by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeEvent {
    /// Channel identifier.
    pub channel: ChannelId,
    /// Edge direction.
    pub direction: Direction,
    /// The counter of the edge direction after this edge.
    pub count: u32,
}

impl EdgeEvent {
    /// Creates an [`EdgeEvent`].
    #[must_use]
    pub const fn new(channel: ChannelId, direction: Direction, count: u32) -> Self {
        Self {
            channel,
            direction,
            count,
        }
    }
}

impl fmt::Display for EdgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel {} {} {} times",
            self.channel, self.direction, self.count
        )
    }
}

/// An observer of drained edge events.
///
/// It is invoked from the main loop, once per drained edge and in acceptance
/// order, hence it may log, allocate and send data over the network.
pub trait EdgeObserver {
    /// Notifies an [`EdgeEvent`].
    fn on_edge_event(&mut self, event: &EdgeEvent);
}

impl<F> EdgeObserver for F
where
    F: FnMut(&EdgeEvent),
{
    fn on_edge_event(&mut self, event: &EdgeEvent) {
        self(event);
    }
}

/// An observer discarding every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EdgeObserver for NoopObserver {
    fn on_edge_event(&mut self, _event: &EdgeEvent) {}
}
