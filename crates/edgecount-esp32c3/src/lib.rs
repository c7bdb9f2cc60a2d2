//! `edgecount-esp32c3` runs the `edgecount` cooperative loop on an
//! `ESP32-C3` board.
//!
//! It provides:
//!
//! - The `Wi-Fi` association, retried with a bounded backoff
//! - The network stack
//! - An `HTTP` server and a `WebSocket` server, each in its own task
//! - The [`facade::Esp32Facade`] handing their traffic to the loop
//! - Interrupt driven edge counting on `GPIO` inputs
//! - A led status indicator
//! - The `mDNS` advertisement of the board
//!
//! Servers and interrupts never touch the loop state directly: they exchange
//! requests, responses and frames through bounded queues, and edges through
//! the lock-free counters of each channel.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;

/// Error management.
pub mod error;
/// The network facade of the cooperative loop.
pub mod facade;
/// `GPIO` edge counting.
pub mod input;
/// The led status indicator.
pub mod led;
/// The `mDNS` advertisement.
pub mod mdns;
/// The network stack builder.
pub mod net;
/// The `HTTP` server.
pub mod server;
/// Credentials baked into the firmware.
pub mod storage;
/// The `Wi-Fi` controller.
pub mod wifi;
/// The `WebSocket` server.
pub mod ws;

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write($val);
        x
    }};
}

pub(crate) use mk_static;
