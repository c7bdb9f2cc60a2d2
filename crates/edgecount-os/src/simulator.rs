use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use edgecount::channel::SignalChannel;

use tracing::{error, info};

use crate::runtime::Clock;

/// Records a scripted sequence of transitions on a channel.
///
/// Each item is the time of a transition, in milliseconds. Returns the
/// number of accepted transitions.
pub fn replay<I>(channel: &SignalChannel, transitions: I) -> usize
where
    I: IntoIterator<Item = u32>,
{
    transitions
        .into_iter()
        .filter_map(|now_ms| channel.record_edge(now_ms))
        .count()
}

/// A background thread which plays the role of an interrupt source.
///
/// Every period it emits one transition, followed by a configurable number of
/// bounces, as a mechanical contact would. A channel with a debounce window
/// longer than the bounce duration counts each press exactly once.
#[derive(Debug)]
pub struct EdgeSimulator {
    channel: &'static SignalChannel,
    period: Duration,
    bounces: u32,
    bounce_gap: Duration,
    clock: Clock,
}

impl EdgeSimulator {
    /// Creates an [`EdgeSimulator`] emitting one clean transition per second.
    #[must_use]
    pub fn new(channel: &'static SignalChannel) -> Self {
        Self {
            channel,
            period: Duration::from_secs(1),
            bounces: 0,
            bounce_gap: Duration::from_millis(1),
            clock: Clock::new(),
        }
    }

    /// Sets the period between two transitions.
    #[must_use]
    pub const fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the number of bounces following each transition, and the gap
    /// between two bounces.
    #[must_use]
    pub const fn bounces(mut self, bounces: u32, gap: Duration) -> Self {
        self.bounces = bounces;
        self.bounce_gap = gap;
        self
    }

    /// Sets the clock used to timestamp the transitions.
    #[must_use]
    pub const fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the simulation thread.
    #[must_use]
    pub fn spawn(self) -> SimulatorHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::clone(&stop);

        info!(
            "Simulating channel {} every {:?} with {} bounces",
            self.channel.id(),
            self.period,
            self.bounces
        );

        let thread = thread::spawn(move || {
            let mut presses = 0;
            while !running.load(Ordering::Relaxed) {
                let _ = self.channel.record_edge(self.clock.now_ms());
                for _ in 0..self.bounces {
                    thread::sleep(self.bounce_gap);
                    let _ = self.channel.record_edge(self.clock.now_ms());
                }
                presses += 1;
                thread::sleep(self.period);
            }
            presses
        });

        SimulatorHandle { stop, thread }
    }
}

/// A running [`EdgeSimulator`].
#[derive(Debug)]
pub struct SimulatorHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<usize>,
}

impl SimulatorHandle {
    /// Stops the simulation and returns the number of simulated presses.
    #[must_use]
    pub fn stop(self) -> usize {
        self.stop.store(true, Ordering::Relaxed);
        self.thread.join().unwrap_or_else(|_| {
            error!("The simulation thread panicked");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use edgecount::channel::{ChannelId, Counters, SignalChannel};

    use super::{EdgeSimulator, replay};

    #[test]
    fn spaced_transitions_are_all_counted() {
        let channel = SignalChannel::new(ChannelId(1), 100);

        let accepted = replay(&channel, (0..20).map(|i| i * 101));
        assert_eq!(accepted, 20);
        assert_eq!(
            channel.counters(),
            Counters {
                rising: 10,
                falling: 10
            }
        );
    }

    #[test]
    fn bursts_collapse_to_their_first_transition() {
        let channel = SignalChannel::new(ChannelId(1), 100);

        // A press at 0 ms, bouncing every 30 ms.
        assert_eq!(replay(&channel, [0, 30, 60, 90]), 1);
        // Each bounce is measured from the last accepted transition.
        assert_eq!(replay(&channel, [101, 150, 200]), 1);

        assert_eq!(
            channel.counters(),
            Counters {
                rising: 1,
                falling: 1
            }
        );
        assert_eq!(channel.snapshot().noise, 5);
    }

    #[test]
    fn bouncing_presses_are_counted_once() {
        static CHANNEL: SignalChannel = SignalChannel::new(ChannelId(7), 20);

        let handle = EdgeSimulator::new(&CHANNEL)
            .period(Duration::from_millis(60))
            .bounces(2, Duration::from_millis(1))
            .spawn();

        thread::sleep(Duration::from_millis(300));
        let presses = handle.stop();

        let counters = CHANNEL.counters();
        assert!(presses > 0);
        assert_eq!(
            usize::try_from(counters.rising + counters.falling).unwrap(),
            presses
        );
    }
}
