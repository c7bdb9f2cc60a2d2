use alloc::borrow::Cow;
use alloc::format;

use core::fmt::Debug;

use embassy_executor::SpawnError;

use edge_nal_embassy::TcpError;

/// All `edgecount-esp32c3` error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Radio initialization or `Wi-Fi` association errors.
    Wifi,
    /// A task cannot be spawned.
    Task,
    /// `TCP` socket errors.
    Tcp,
    /// `HTTP` server errors.
    Server,
    /// A resource is exhausted.
    Resources,
    /// Errors of the `edgecount` loop.
    Loop,
}

impl ErrorKind {
    const fn description(self) -> &'static str {
        match self {
            Self::Wifi => "Wi-Fi",
            Self::Task => "Task",
            Self::Tcp => "TCP",
            Self::Server => "Server",
            Self::Resources => "Resources",
            Self::Loop => "Loop",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.description().fmt(f)
    }
}

/// A firmware error.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.kind, self.info)
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Creates an [`Error`].
    #[must_use]
    pub fn new(kind: ErrorKind, info: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<SpawnError> for Error {
    fn from(e: SpawnError) -> Self {
        Self::new(ErrorKind::Task, format!("{e:?}"))
    }
}

impl From<esp_radio::InitializationError> for Error {
    fn from(e: esp_radio::InitializationError) -> Self {
        Self::new(ErrorKind::Wifi, format!("{e:?}"))
    }
}

impl From<esp_radio::wifi::WifiError> for Error {
    fn from(e: esp_radio::wifi::WifiError) -> Self {
        Self::new(ErrorKind::Wifi, format!("{e:?}"))
    }
}

impl From<TcpError> for Error {
    fn from(e: TcpError) -> Self {
        Self::new(ErrorKind::Tcp, format!("{e:?}"))
    }
}

impl<E: Debug> From<edge_http::io::Error<E>> for Error {
    fn from(e: edge_http::io::Error<E>) -> Self {
        Self::new(ErrorKind::Server, format!("{e:?}"))
    }
}

impl From<edgecount::error::Error> for Error {
    fn from(e: edgecount::error::Error) -> Self {
        Self::new(ErrorKind::Loop, format!("{e}"))
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
