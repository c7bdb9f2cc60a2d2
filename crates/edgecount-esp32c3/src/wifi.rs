use alloc::format;

use esp_hal::peripherals::WIFI;

use esp_radio::Controller;
use esp_radio::wifi::{ClientConfig, Interfaces, ModeConfig, WifiController, WifiEvent};

use embassy_executor::Spawner;
use embassy_time::Timer;

use edgecount::backoff::Backoff;
use edgecount::config::Credentials;

use log::{error, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::mk_static;

// First retry delay, in milliseconds.
const FIRST_RETRY_MS: u32 = 500;

/// The `Wi-Fi` controller.
pub struct Wifi {
    controller: WifiController<'static>,
    interfaces: Interfaces<'static>,
    spawner: Spawner,
    backoff: Backoff,
}

impl Wifi {
    /// Configures the `Wi-Fi` radio in station mode.
    ///
    /// # Errors
    ///
    /// The radio cannot be initialized.
    pub fn configure(wifi: WIFI<'static>, spawner: Spawner) -> Result<Self> {
        let radio = mk_static!(Controller<'static>, esp_radio::init()?);
        let (controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())?;

        Ok(Self {
            controller,
            interfaces,
            spawner,
            backoff: Backoff::new(FIRST_RETRY_MS),
        })
    }

    /// Sets the delays between two association attempts.
    ///
    /// Association is retried every 500 ms at first, doubling the delay up to
    /// 8 seconds, for 10 attempts.
    #[must_use]
    pub const fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Associates with an access point and keeps the association alive in a
    /// background task.
    ///
    /// # Errors
    ///
    /// - The radio cannot start
    /// - Every association attempt failed
    /// - The task keeping the association alive cannot be spawned
    pub async fn connect(mut self, credentials: &Credentials) -> Result<Interfaces<'static>> {
        let config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(credentials.ssid.clone())
                .with_password(credentials.password.clone()),
        );

        self.controller.set_config(&config)?;
        self.controller.start_async().await?;

        info!("Connecting to `{}`...", credentials.ssid);
        associate(&mut self.controller, self.backoff).await?;

        self.spawner
            .spawn(keep_associated(self.controller, self.backoff))?;

        Ok(self.interfaces)
    }
}

async fn associate(controller: &mut WifiController<'static>, backoff: Backoff) -> Result<()> {
    let mut delays = backoff;
    loop {
        match controller.connect_async().await {
            Ok(()) => {
                info!("Wi-Fi connected!");
                return Ok(());
            }
            Err(e) => {
                let Some(delay) = delays.next() else {
                    return Err(Error::new(
                        ErrorKind::Wifi,
                        format!("Association failed: {e:?}"),
                    ));
                };
                warn!("Association failed: {e:?}, retrying in {delay} ms");
                Timer::after_millis(u64::from(delay)).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn keep_associated(mut controller: WifiController<'static>, backoff: Backoff) {
    loop {
        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("Wi-Fi disconnected");

        // A persistent failure leaves the link down, which stops the loop.
        if let Err(e) = associate(&mut controller, backoff).await {
            error!("{e}");
            return;
        }
    }
}
