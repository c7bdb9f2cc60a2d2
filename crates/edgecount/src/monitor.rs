use alloc::vec::Vec;

use log::info;

use crate::channel::{ChannelId, Counters, SignalChannel, Snapshot};
use crate::debouncer::Direction;
use crate::events::{EdgeEvent, EdgeObserver};

struct Watched<'a> {
    channel: &'a SignalChannel,
    // The record returned by the previous drain.
    last: Snapshot,
}

/// The set of channels observed by the main loop.
///
/// The monitor remembers the record of each channel at its previous drain,
/// which allows it to replay every edge accepted in between, in order.
#[derive(Default)]
pub struct Monitor<'a> {
    channels: Vec<Watched<'a>>,
}

impl<'a> Monitor<'a> {
    /// Creates an empty [`Monitor`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Adds a [`SignalChannel`] to the monitor.
    ///
    /// Edges accepted before this call are reported by the first drain.
    #[must_use]
    #[inline]
    pub fn channel(mut self, channel: &'a SignalChannel) -> Self {
        self.channels.push(Watched {
            channel,
            last: channel.baseline(),
        });
        self
    }

    /// Returns the number of monitored channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the monitor has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns the counters of a channel without draining it.
    ///
    /// Returns `None` for an unknown channel.
    #[must_use]
    pub fn query_counters(&self, id: ChannelId) -> Option<Counters> {
        self.find(id).map(SignalChannel::counters)
    }

    /// Returns a copy of a channel record without draining it.
    #[must_use]
    pub fn snapshot(&self, id: ChannelId) -> Option<Snapshot> {
        self.find(id).map(SignalChannel::snapshot)
    }

    /// Drains every dirty channel and notifies the observer once per edge
    /// accepted since the previous drain.
    ///
    /// Returns the number of notified events.
    pub fn drain<O: EdgeObserver>(&mut self, observer: &mut O) -> usize {
        let mut notified = 0;

        for watched in &mut self.channels {
            if !watched.channel.is_dirty() {
                continue;
            }

            let drain = watched.channel.drain();
            if !drain.changed {
                continue;
            }

            notified += replay(&watched.last, &drain.snapshot, observer);

            let Counters { rising, falling } = drain.snapshot.counters;
            info!(
                "Channel {} rising {rising} times, falling {falling} times",
                drain.snapshot.channel
            );

            watched.last = drain.snapshot;
        }

        notified
    }

    fn find(&self, id: ChannelId) -> Option<&'a SignalChannel> {
        self.channels
            .iter()
            .find(|watched| watched.channel.id() == id)
            .map(|watched| watched.channel)
    }
}

// Edges alternate starting from the direction armed at the previous drain,
// so the order of the edges in between is fully determined by the counters.
fn replay<O: EdgeObserver>(previous: &Snapshot, current: &Snapshot, observer: &mut O) -> usize {
    let mut rising = previous.counters.rising;
    let mut falling = previous.counters.falling;
    let mut pending_rising = current.counters.rising.wrapping_sub(rising);
    let mut pending_falling = current.counters.falling.wrapping_sub(falling);

    let mut next = previous.armed;
    let mut notified = 0;

    while pending_rising > 0 || pending_falling > 0 {
        // A direction with nothing left to replay hands over to the other.
        let direction = match next {
            Direction::Rising if pending_rising == 0 => Direction::Falling,
            Direction::Falling if pending_falling == 0 => Direction::Rising,
            direction => direction,
        };

        let count = match direction {
            Direction::Rising => {
                pending_rising -= 1;
                rising = rising.wrapping_add(1);
                rising
            }
            Direction::Falling => {
                pending_falling -= 1;
                falling = falling.wrapping_add(1);
                falling
            }
        };

        observer.on_edge_event(&EdgeEvent::new(current.channel, direction, count));
        notified += 1;
        next = direction.opposite();
    }

    notified
}
