//! `edgecount` counts debounced rising and falling edges of digital inputs
//! and drives the cooperative loop that reports them over the network.
//!
//! This crate provides APIs to:
//!
//! - Record signal transitions from an interrupt handler through a
//!   [`channel::SignalChannel`], discarding the ones that arrive within the
//!   debounce window of the last accepted transition
//! - Drain the channels from the main loop and observe every accepted edge,
//!   in acceptance order, as an [`events::EdgeEvent`]
//! - Query the counters of a channel at any time without consuming them
//! - Run a [`scheduler::CooperativeScheduler`] that services `HTTP` requests
//!   and `WebSocket` frames through a [`scheduler::NetworkFacade`] and
//!   broadcasts edge events to the connected clients
//! - Load the network credentials from a persistent storage
//!
//! A channel is the only state shared between the interrupt context and the
//! main loop. Every access to it takes a single critical section and copies
//! the whole channel record, so a reader observes either the state before an
//! edge or the state after it, never a mix of both.
//!
//! The network stack, the storage and the pause between loop iterations are
//! collaborators implemented by the platform crates.
//!
//! This crate is `no_std` and only requires an allocator.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

/// Bounded retry delays.
pub mod backoff;
/// Signal channels shared between an interrupt handler and the main loop.
pub mod channel;
/// Network credentials.
pub mod config;
/// The interval-only edge debouncer.
pub mod debouncer;
/// Error management.
pub mod error;
/// Edge events and their observers.
pub mod events;
/// `HTTP` requests and responses.
pub mod http;
/// Input pin sampling.
#[cfg(feature = "input")]
pub mod input;
/// The set of monitored channels.
pub mod monitor;
/// The `HTTP` route table.
pub mod routes;
/// The cooperative scheduler.
pub mod scheduler;
/// `WebSocket` frames and their handlers.
pub mod websocket;
