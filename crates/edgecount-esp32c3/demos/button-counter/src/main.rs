#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

extern crate alloc;

use core::fmt::Display;

use edgecount::channel::ChannelId;
use edgecount::config::read_credentials;
use edgecount::monitor::Monitor;
use edgecount::routes::Router;
use edgecount::scheduler::CooperativeScheduler;

use esp_hal::Config;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rng::Rng;
use esp_hal::system::software_reset;
use esp_hal::timer::timg::TimerGroup;

use log::{error, info, warn};

use embassy_executor::Spawner;
use embassy_time::Timer;

use edgecount_esp32c3::{
    facade::{EmbassyPause, Esp32Facade},
    input,
    led::LedIndicator,
    mdns::Advertisement,
    net::{NetworkStack, wait_for_ip},
    server::HttpServer,
    storage::FirmwareStorage,
    wifi::Wifi,
    ws::WsServer,
};

const MAX_HEAP_SIZE: usize = 72 * 1024;

// Sockets: two `HTTP` clients, two `WebSocket` clients, both listeners,
// `DHCP` and `mDNS`.
const SOCKETS: usize = 8;
// Keep-alive timeout of the `HTTP` server.
const KEEPALIVE_TIMEOUT_MS: u32 = 15 * 1000;
// Time left to read the logs before a reset.
const RESET_DELAY_MS: u64 = 3000;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    software_reset()
}

#[toml_cfg::toml_config]
struct DeviceConfig {
    #[default("")]
    ssid: &'static str,
    #[default("")]
    password: &'static str,
    #[default("esp32")]
    hostname: &'static str,
    #[default(9)]
    channel: u8,
    #[default(100)]
    window_ms: u32,
}

async fn reset(reason: impl Display) -> ! {
    error!("{reason}, resetting in {RESET_DELAY_MS} ms");
    Timer::after_millis(RESET_DELAY_MS).await;
    software_reset()
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: MAX_HEAP_SIZE);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    info!("ESP RTOS started!");

    let device_config = DEVICE_CONFIG;

    // Without credentials there is nothing to associate with.
    let credentials = match read_credentials(&mut FirmwareStorage::new(
        device_config.ssid,
        device_config.password,
    )) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("{e}, fill in `cfg.toml` and flash again");
            return;
        }
    };

    // Boot button, pulled up, pressed when low.
    let mut io = Io::new(peripherals.IO_MUX);
    input::install(&mut io);
    let button = Input::new(
        peripherals.GPIO9,
        InputConfig::default().with_pull(Pull::Up),
    );
    let channel = match input::watch(
        button,
        ChannelId(device_config.channel),
        device_config.window_ms,
    ) {
        Ok(channel) => channel,
        Err(e) => reset(e).await,
    };

    // The onboard led is lit by a low level.
    let led = LedIndicator::active_low(Output::new(
        peripherals.GPIO8,
        Level::High,
        OutputConfig::default(),
    ));

    let rng = Rng::new();

    let interfaces = match Wifi::configure(peripherals.WIFI, spawner) {
        Ok(wifi) => wifi.connect(&credentials).await,
        Err(e) => Err(e),
    };
    let interfaces = match interfaces {
        Ok(interfaces) => interfaces,
        Err(e) => reset(e).await,
    };

    let stack = match NetworkStack::build::<SOCKETS>(rng, interfaces.sta, spawner).await {
        Ok(stack) => stack,
        Err(e) => reset(e).await,
    };

    let http = HttpServer::new().keepalive_timeout(KEEPALIVE_TIMEOUT_MS);
    let http_port = http.server_port();
    if let Err(e) = http.spawn(stack, spawner) {
        reset(e).await;
    }
    if let Err(e) = WsServer::new().spawn(stack, spawner) {
        reset(e).await;
    }

    let address = wait_for_ip(stack).await;
    if let Err(e) = Advertisement::new(rng)
        .hostname(device_config.hostname)
        .spawn(stack, address, http_port, spawner)
    {
        warn!("Board not advertised: {e}");
    }

    let router = Router::new()
        .page("/hello", "text/html", include_str!("../pages/hello.html"))
        .page(
            "/websocket",
            "text/html",
            include_str!("../pages/websocket.html"),
        );

    let mut scheduler =
        CooperativeScheduler::new(Esp32Facade::new(stack), router, Monitor::new().channel(channel))
            .indicator(led);

    info!("Open http://{address}/websocket to follow the counters");

    if let Err(e) = scheduler.run(&mut EmbassyPause).await {
        reset(e).await;
    }
}
