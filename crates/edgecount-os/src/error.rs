use std::borrow::Cow;

/// All `edgecount-os` error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input/output errors, mostly from sockets and files.
    Io,
    /// Service advertisement errors.
    Discovery,
    /// Errors of the `edgecount` loop.
    Loop,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Io => "Input/Output",
            Self::Discovery => "Service advertisement",
            Self::Loop => "Loop",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description().fmt(f)
    }
}

/// A host runtime error.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.info)
    }
}

impl std::error::Error for Error {}

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

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

impl From<mdns_sd::Error> for Error {
    fn from(e: mdns_sd::Error) -> Self {
        Self::new(ErrorKind::Discovery, e.to_string())
    }
}

impl From<edgecount::error::Error> for Error {
    fn from(e: edgecount::error::Error) -> Self {
        Self::new(ErrorKind::Loop, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn conversions() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port 80 busy");
        let error = Error::from(io);
        assert_eq!(error.kind(), ErrorKind::Io);
        assert_eq!(error.to_string(), "Input/Output: port 80 busy");

        let error = Error::from(edgecount::error::Error::network("link down"));
        assert_eq!(error.kind(), ErrorKind::Loop);
        assert_eq!(error.to_string(), "Loop: Network unavailable: link down");
    }
}
