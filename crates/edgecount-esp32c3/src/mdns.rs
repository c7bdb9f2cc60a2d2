use core::cell::OnceCell;
use core::net::{Ipv4Addr, Ipv6Addr};

use alloc::format;

use esp_hal::rng::Rng;

use embassy_executor::Spawner;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;

use embassy_net::Stack;

use edge_mdns::HostAnswersMdnsHandler;
use edge_mdns::buf::VecBufAccess;
use edge_mdns::domain::base::Ttl;
use edge_mdns::host::{Host, Service, ServiceAnswers};
use edge_mdns::io::{self, IPV4_DEFAULT_SOCKET};

use edge_nal::UdpSplit;
use edge_nal_embassy::{Udp, UdpBuffers};

use log::{error, info};

use crate::error::{Error, ErrorKind, Result};

/// Hostname advertised when none is configured.
pub const DEFAULT_HOSTNAME: &str = "esp32";

// Service type
const SERVICE_TYPE: &str = "_http";
// Transport protocol
const TRANSPORT_PROTOCOL: &str = "_tcp";
// Time-to-live for answers in seconds
const TIME_TO_LIVE: u32 = 120;

// UDP socket buffers.
const SOCKET_BUFFERS: usize = 2;
// Largest mDNS packet.
const PACKET_SIZE: usize = 1500;
// Queued packets per socket.
const PACKET_METADATA: usize = 2;

static RNG: CriticalSectionMutex<OnceCell<Rng>> = CriticalSectionMutex::new(OnceCell::new());

/// Advertisement of the `HTTP` server as `<hostname>.local`.
///
/// Advertising is best effort: a responder failure is logged and the rest of
/// the firmware keeps running.
pub struct Advertisement {
    hostname: &'static str,
    rng: Rng,
}

impl Advertisement {
    /// Creates an [`Advertisement`] for [`DEFAULT_HOSTNAME`].
    #[must_use]
    pub const fn new(rng: Rng) -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME,
            rng,
        }
    }

    /// Sets the hostname.
    #[must_use]
    pub const fn hostname(mut self, hostname: &'static str) -> Self {
        self.hostname = hostname;
        self
    }

    /// Spawns the responder task, answering for the `HTTP` server port.
    ///
    /// # Errors
    ///
    /// The responder task cannot be spawned.
    pub fn spawn(
        self,
        stack: Stack<'static>,
        address: Ipv4Addr,
        port: u16,
        spawner: Spawner,
    ) -> Result<()> {
        RNG.lock(|c| _ = c.set(self.rng));

        info!(
            "mDNS responder started on {address}, try `ping {}.local`",
            self.hostname
        );

        let host = Host {
            hostname: self.hostname,
            ipv4: address,
            ipv6: Ipv6Addr::UNSPECIFIED,
            ttl: Ttl::from_secs(TIME_TO_LIVE),
        };

        let service = Service {
            name: self.hostname,
            priority: 1,
            weight: 5,
            service: SERVICE_TYPE,
            protocol: TRANSPORT_PROTOCOL,
            port,
            service_subtypes: &[],
            txt_kvs: &[],
        };

        spawner.spawn(run_responder(stack, host, service))?;
        Ok(())
    }
}

#[embassy_executor::task]
async fn run_responder(stack: Stack<'static>, host: Host<'static>, service: Service<'static>) {
    if let Err(e) = respond(stack, &host, &service).await {
        error!("mDNS responder stopped: {e}");
    }
}

async fn respond(stack: Stack<'static>, host: &Host<'_>, service: &Service<'_>) -> Result<()> {
    let buffers = UdpBuffers::<SOCKET_BUFFERS, PACKET_SIZE, PACKET_SIZE, PACKET_METADATA>::new();
    let udp = Udp::new(stack, &buffers);

    let mut socket = io::bind(&udp, IPV4_DEFAULT_SOCKET, Some(Ipv4Addr::UNSPECIFIED), None)
        .await
        .map_err(|e| Error::new(ErrorKind::Server, format!("mDNS socket: {e:?}")))?;
    let (recv, send) = socket.split();

    // Never signalled: the host record is fixed.
    let host_changed = Signal::new();

    io::Mdns::<NoopRawMutex, _, _, _, _>::new(
        Some(Ipv4Addr::UNSPECIFIED),
        None,
        recv,
        send,
        VecBufAccess::<NoopRawMutex, PACKET_SIZE>::new(),
        VecBufAccess::<NoopRawMutex, PACKET_SIZE>::new(),
        |buf| {
            RNG.lock(|c| c.get().map(|r| r.clone().read(buf)));
        },
        &host_changed,
    )
    .run(HostAnswersMdnsHandler::new(ServiceAnswers::new(host, service)))
    .await
    .map_err(|e| Error::new(ErrorKind::Server, format!("mDNS: {e:?}")))
}
