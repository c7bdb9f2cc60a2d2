use alloc::format;
use alloc::string::String;

use edgecount::config::{CREDENTIALS_PATH, CredentialStorage};
use edgecount::error::{Error as LoopError, Result as LoopResult};

/// A [`CredentialStorage`] serving credentials baked into the firmware at
/// build time.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareStorage {
    ssid: &'static str,
    password: &'static str,
}

impl FirmwareStorage {
    /// Creates a [`FirmwareStorage`].
    #[must_use]
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self { ssid, password }
    }
}

impl CredentialStorage for FirmwareStorage {
    fn read_to_string(&mut self, path: &str) -> LoopResult<String> {
        if path != CREDENTIALS_PATH {
            return Err(LoopError::configuration(format!(
                "Resource `{path}` not found"
            )));
        }
        Ok(format!("{}\n{}\n", self.ssid, self.password))
    }
}
