use alloc::string::{String, ToString};

use core::fmt;

use log::info;

use crate::error::{Error, Result};

/// The persistent resource containing the network credentials.
///
/// The first line holds the network name, the second line the secret.
pub const CREDENTIALS_PATH: &str = "/credentials.txt";

/// A persistent storage holding text resources.
pub trait CredentialStorage {
    /// Reads a whole resource as text.
    ///
    /// # Errors
    ///
    /// The storage is not mounted or the resource cannot be read.
    fn read_to_string(&mut self, path: &str) -> Result<String>;
}

/// A read-only storage with a single resource embedded in the firmware.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedStorage {
    path: &'static str,
    contents: &'static str,
}

impl EmbeddedStorage {
    /// Creates an [`EmbeddedStorage`] holding `contents` at `path`.
    #[must_use]
    pub const fn new(path: &'static str, contents: &'static str) -> Self {
        Self { path, contents }
    }
}

impl CredentialStorage for EmbeddedStorage {
    fn read_to_string(&mut self, path: &str) -> Result<String> {
        if path == self.path {
            Ok(self.contents.to_string())
        } else {
            Err(Error::configuration(alloc::format!(
                "Resource `{path}` not found"
            )))
        }
    }
}

/// Network credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Network name.
    pub ssid: String,
    /// Network secret.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Creates [`Credentials`].
    ///
    /// # Errors
    ///
    /// The network name is empty.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let ssid = ssid.into();
        if ssid.is_empty() {
            return Err(Error::configuration("Empty network name"));
        }

        Ok(Self {
            ssid,
            password: password.into(),
        })
    }

    /// Parses the contents of a credentials resource.
    ///
    /// Line terminators, including `\r\n`, are not part of the values.
    ///
    /// # Errors
    ///
    /// The resource has fewer than two lines or an empty network name.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();

        let ssid = lines
            .next()
            .ok_or_else(|| Error::configuration("Missing network name"))?;
        let password = lines
            .next()
            .ok_or_else(|| Error::configuration("Missing network secret"))?;

        Self::new(ssid, password)
    }
}

/// Reads the network credentials from [`CREDENTIALS_PATH`].
///
/// # Errors
///
/// Returns [`Error::ConfigurationUnavailable`] when the storage or the
/// resource is unavailable or malformed. Startup must not proceed to
/// network association in that case.
pub fn read_credentials<S: CredentialStorage>(storage: &mut S) -> Result<Credentials> {
    let contents = storage.read_to_string(CREDENTIALS_PATH)?;
    let credentials = Credentials::parse(&contents)?;

    info!(
        "SSID: [{}], password: [{} characters]",
        credentials.ssid,
        credentials.password.chars().count()
    );

    Ok(credentials)
}
