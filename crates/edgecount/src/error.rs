use alloc::borrow::Cow;

/// All `edgecount` errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The persistent storage or the credentials it holds are missing or
    /// unreadable.
    ConfigurationUnavailable(Cow<'static, str>),
    /// The network stack cannot be reached.
    ///
    /// This error is fatal: the loop stops and the device must restart.
    NetworkUnavailable(Cow<'static, str>),
    /// A malformed or unroutable `HTTP` request or `WebSocket` frame.
    ///
    /// It is answered to the caller and never stops the loop.
    RequestHandling(Cow<'static, str>),
}

impl Error {
    /// Creates an [`Error::ConfigurationUnavailable`].
    #[must_use]
    pub fn configuration(info: impl Into<Cow<'static, str>>) -> Self {
        Self::ConfigurationUnavailable(info.into())
    }

    /// Creates an [`Error::NetworkUnavailable`].
    #[must_use]
    pub fn network(info: impl Into<Cow<'static, str>>) -> Self {
        Self::NetworkUnavailable(info.into())
    }

    /// Creates an [`Error::RequestHandling`].
    #[must_use]
    pub fn request(info: impl Into<Cow<'static, str>>) -> Self {
        Self::RequestHandling(info.into())
    }

    /// Whether the error must stop the main loop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConfigurationUnavailable(info) => write!(f, "Configuration unavailable: {info}"),
            Self::NetworkUnavailable(info) => write!(f, "Network unavailable: {info}"),
            Self::RequestHandling(info) => write!(f, "Request handling error: {info}"),
        }
    }
}

impl core::error::Error for Error {}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::Error;

    #[test]
    fn only_network_errors_are_fatal() {
        assert!(Error::network("link down").is_fatal());
        assert!(!Error::configuration("no storage").is_fatal());
        assert!(!Error::request("bad path").is_fatal());
    }

    #[test]
    fn display_names_the_error_kind() {
        assert_eq!(
            Error::configuration("missing `/credentials.txt`").to_string(),
            "Configuration unavailable: missing `/credentials.txt`"
        );
        assert_eq!(
            Error::request("bad frame").to_string(),
            "Request handling error: bad frame"
        );
    }
}
