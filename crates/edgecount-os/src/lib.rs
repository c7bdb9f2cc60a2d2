//! The `edgecount-os` library crate runs the `edgecount` loop on an
//! operating system.
//!
//! It provides:
//!
//! - An `HTTP` and `WebSocket` network facade built on `axum`, serving each
//!   protocol on its own port
//! - An edge simulator which feeds a channel from a background thread, with
//!   optional contact bounce, in place of a hardware interrupt
//! - A file-backed credential storage
//! - The `mDNS` advertisement of the `HTTP` service
//! - Static pages loaded from a directory
//!
//! Network servers run as `tokio` tasks, while the cooperative scheduler
//! only ever polls them through non-blocking queues.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Error management.
pub mod error;
/// The `axum` network facade.
pub mod facade;
/// `mDNS` service advertisement.
pub mod mdns;
/// Static pages.
pub mod pages;
/// Pause, status indicator and clock.
pub mod runtime;
/// A simulated interrupt source.
pub mod simulator;
/// File-backed credential storage.
pub mod storage;

mod server;
