use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;
use core::net::SocketAddr;

use log::{debug, info, warn};

// Reply sent to a newly connected client.
const CONNECTED_REPLY: &str = "Connected";
// Reply sent for every text frame.
const TEXT_REPLY: &str = "received a message";
// Bytes per hex dump row.
const HEX_DUMP_COLUMNS: usize = 16;

/// A `WebSocket` connection identifier, unique among open connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u8);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `WebSocket` frame kinds surfaced by a network facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// A client completed the handshake. The payload is the requested `URL`.
    Connected,
    /// A client closed its connection.
    Disconnected,
    /// A text frame.
    Text,
    /// A binary frame.
    Binary,
}

/// A `WebSocket` event surfaced by a network facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Connection identifier.
    pub connection: ConnectionId,
    /// Frame kind.
    pub kind: FrameType,
    /// Frame payload.
    pub payload: Vec<u8>,
    /// Remote address, when known.
    pub peer: Option<SocketAddr>,
}

impl Frame {
    /// Creates a [`FrameType::Connected`] frame.
    #[must_use]
    pub fn connected(connection: ConnectionId, url: &str, peer: Option<SocketAddr>) -> Self {
        Self {
            connection,
            kind: FrameType::Connected,
            payload: url.as_bytes().to_vec(),
            peer,
        }
    }

    /// Creates a [`FrameType::Disconnected`] frame.
    #[must_use]
    pub const fn disconnected(connection: ConnectionId) -> Self {
        Self {
            connection,
            kind: FrameType::Disconnected,
            payload: Vec::new(),
            peer: None,
        }
    }

    /// Creates a [`FrameType::Text`] frame.
    #[must_use]
    pub fn text(connection: ConnectionId, text: impl Into<String>) -> Self {
        Self {
            connection,
            kind: FrameType::Text,
            payload: text.into().into_bytes(),
            peer: None,
        }
    }

    /// Creates a [`FrameType::Binary`] frame.
    #[must_use]
    pub fn binary(connection: ConnectionId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            connection,
            kind: FrameType::Binary,
            payload: payload.into(),
            peer: None,
        }
    }
}

/// Handles a frame and returns the text to send back to its connection.
///
/// - A connection is greeted with `Connected`
/// - A text frame is acknowledged with `received a message`
/// - A binary frame is traced as a hex dump and not answered
/// - A disconnection is logged
#[must_use]
pub fn handle_frame(frame: &Frame) -> Option<&'static str> {
    let id = frame.connection;
    match frame.kind {
        FrameType::Connected => {
            let url = String::from_utf8_lossy(&frame.payload);
            match frame.peer {
                Some(peer) => info!("[{id}] Connected from {} url: {url}", peer.ip()),
                None => info!("[{id}] Connected url: {url}"),
            }
            Some(CONNECTED_REPLY)
        }
        FrameType::Disconnected => {
            info!("[{id}] Disconnected!");
            None
        }
        FrameType::Text => {
            match core::str::from_utf8(&frame.payload) {
                Ok(text) => info!("[{id}] get Text: {text}"),
                Err(e) => warn!("[{id}] get Text with invalid UTF-8: {e}"),
            }
            Some(TEXT_REPLY)
        }
        FrameType::Binary => {
            info!("[{id}] get binary length: {}", frame.payload.len());
            debug!("{}", HexDump::new(&frame.payload));
            None
        }
    }
}

/// A hex dump of a byte sequence, one row of 16 bytes per line, each row
/// prefixed by its offset.
pub struct HexDump<'a> {
    bytes: &'a [u8],
    columns: usize,
}

impl<'a> HexDump<'a> {
    /// Creates a [`HexDump`] of 16 bytes per row.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            columns: HEX_DUMP_COLUMNS,
        }
    }

    /// Sets the number of bytes per row.
    ///
    /// Zero is replaced by one.
    #[must_use]
    pub const fn columns(mut self, columns: usize) -> Self {
        self.columns = if columns == 0 { 1 } else { columns };
        self
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.bytes.len();
        write!(f, "[HEXDUMP] len: 0x{len:X} ({len})")?;

        for (row, chunk) in self.bytes.chunks(self.columns).enumerate() {
            write!(f, "\n[0x{:08X}]:", row * self.columns)?;
            for byte in chunk {
                write!(f, " {byte:02X}")?;
            }
        }

        Ok(())
    }
}
