use mdns_sd::{ServiceDaemon, ServiceInfo};

use tracing::{info, warn};

use crate::error::Result;

/// The default advertised hostname.
pub const DEFAULT_HOSTNAME: &str = "esp32";

// The advertised service type.
const HTTP_SERVICE: &str = "_http._tcp.local.";

/// An `mDNS` advertisement of the `HTTP` server.
///
/// The advertisement lasts as long as the value.
pub struct Advertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertisement {
    /// Advertises an `HTTP` server listening on `port` as `<hostname>.local`.
    ///
    /// # Errors
    ///
    /// The `mDNS` daemon cannot start or the service cannot be registered.
    pub fn start(hostname: &str, port: u16) -> Result<Self> {
        let daemon = ServiceDaemon::new()?;

        let service = ServiceInfo::new(
            HTTP_SERVICE,
            hostname,
            &host_name(hostname),
            "",
            port,
            &[("path", "/")][..],
        )?
        .enable_addr_auto();

        let fullname = service.get_fullname().to_owned();
        daemon.register(service)?;

        info!("mDNS responder started: http://{hostname}.local:{port}");

        Ok(Self { daemon, fullname })
    }

    /// Returns the full name of the advertised service.
    #[must_use]
    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl Drop for Advertisement {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!("Failed to withdraw `{}`: {e}", self.fullname);
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!("Failed to stop the mDNS daemon: {e}");
        }
    }
}

fn host_name(hostname: &str) -> String {
    format!("{}.local.", hostname.trim_end_matches(".local."))
}
