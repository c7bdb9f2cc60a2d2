use core::net::Ipv4Addr;

use alloc::boxed::Box;

use esp_hal::rng::Rng;

use esp_radio::wifi::WifiDevice;

use embassy_executor::Spawner;
use embassy_net::{Config, DhcpConfig, Runner, Stack, StackResources};
use embassy_time::Timer;

use log::info;

use crate::error::Result;

// Polling interval while waiting for the network.
const POLL_INTERVAL_MS: u64 = 100;

/// Waits for the link and returns the `IPv4` address assigned by `DHCP`.
pub async fn wait_for_ip(stack: Stack<'static>) -> Ipv4Addr {
    info!("Waiting till the link is up...");
    while !stack.is_link_up() {
        Timer::after_millis(POLL_INTERVAL_MS).await;
    }

    info!("Waiting to get IP address...");
    loop {
        if let Some(config) = stack.config_v4() {
            let address = config.address.address();
            info!("IP address: {address}");
            return address;
        }
        Timer::after_millis(POLL_INTERVAL_MS).await;
    }
}

#[embassy_executor::task]
async fn run_stack(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

/// The network stack builder.
pub struct NetworkStack;

impl NetworkStack {
    /// Builds the network stack over the `Wi-Fi` station interface and waits
    /// for its `DHCP` configuration.
    ///
    /// `SOCKETS` must cover every socket opened by the firmware: the `HTTP`
    /// and `WebSocket` servers, one per client, plus the `mDNS` socket.
    ///
    /// # Errors
    ///
    /// The network stack task cannot be spawned.
    pub async fn build<const SOCKETS: usize>(
        rng: Rng,
        station: WifiDevice<'static>,
        spawner: Spawner,
    ) -> Result<Stack<'static>> {
        let config = Config::dhcpv4(DhcpConfig::default());
        let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());

        // `StaticCell` cannot hold a type depending on a const generic.
        let resources = Box::leak(Box::new(StackResources::<SOCKETS>::new()));

        let (stack, runner) = embassy_net::new(station, config, resources, seed);
        spawner.spawn(run_stack(runner))?;

        let _ = wait_for_ip(stack).await;

        Ok(stack)
    }
}
