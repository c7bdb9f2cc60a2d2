use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use edgecount::channel::{ChannelId, SignalChannel};
use edgecount::config::read_credentials;
use edgecount::monitor::Monitor;
use edgecount::routes::Router;
use edgecount::scheduler::CooperativeScheduler;

use edgecount_os::error::Error;
use edgecount_os::facade::OsFacadeConfig;
use edgecount_os::mdns::{Advertisement, DEFAULT_HOSTNAME};
use edgecount_os::pages::{load_pages, register};
use edgecount_os::runtime::{LogIndicator, TokioPause};
use edgecount_os::simulator::EdgeSimulator;
use edgecount_os::storage::FileStorage;

use clap::Parser;

use tracing::{Level, info};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory containing `credentials.txt`.
    #[arg(long, default_value = ".")]
    storage: PathBuf,

    /// Directory containing the static pages.
    #[arg(long)]
    pages: Option<PathBuf>,

    /// `HTTP` server port.
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// `WebSocket` server port.
    #[arg(long, default_value_t = 8081)]
    ws_port: u16,

    /// Advertised hostname.
    #[arg(long, default_value = DEFAULT_HOSTNAME)]
    hostname: String,

    /// Channel identifier.
    #[arg(long, default_value_t = 23)]
    channel: u8,

    /// Debounce window, in milliseconds.
    #[arg(long, default_value_t = 100)]
    window_ms: u32,

    /// Time between two simulated presses, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    period_ms: u64,

    /// Bounces following each simulated press.
    #[arg(long, default_value_t = 3)]
    bounces: u32,
}

fn address(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let credentials = read_credentials(&mut FileStorage::new(&cli.storage))?;
    info!("Configured for network `{}`", credentials.ssid);

    // The channel is shared with the simulation thread for the whole process.
    let channel: &'static SignalChannel = Box::leak(Box::new(SignalChannel::new(
        ChannelId(cli.channel),
        cli.window_ms,
    )));

    let facade = OsFacadeConfig::new()
        .http_address(address(cli.http_port))
        .ws_address(address(cli.ws_port))
        .start()
        .await?;

    let _advertisement = Advertisement::start(&cli.hostname, cli.http_port)?;

    let mut router = Router::new();
    if let Some(dir) = &cli.pages {
        router = register(router, &load_pages(dir)?);
    }

    let simulator = EdgeSimulator::new(channel)
        .period(Duration::from_millis(cli.period_ms))
        .bounces(cli.bounces, Duration::from_millis(2))
        .spawn();

    let mut scheduler =
        CooperativeScheduler::new(facade, router, Monitor::new().channel(channel))
            .indicator(LogIndicator::default());

    let mut pause = TokioPause;
    let result = tokio::select! {
        result = scheduler.run(&mut pause) => result.map_err(Error::from),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    let presses = simulator.stop();
    let counters = channel.counters();
    info!(
        "{presses} simulated presses, {} rising and {} falling edges counted",
        counters.rising, counters.falling
    );

    result
}
