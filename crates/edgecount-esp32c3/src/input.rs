use core::cell::RefCell;

use alloc::boxed::Box;

use critical_section::Mutex;

use esp_hal::gpio::{Event, Input, Io};
use esp_hal::handler;
use esp_hal::time::Instant;

use edgecount::channel::{ChannelId, SignalChannel};
use edgecount::debouncer::Direction;
use edgecount::input::sample_level;

use log::info;

use crate::error::{Error, ErrorKind, Result};

/// The maximum number of watched inputs.
pub const MAX_INPUTS: usize = 4;

struct Binding {
    input: Input<'static>,
    channel: &'static SignalChannel,
}

static BINDINGS: Mutex<RefCell<[Option<Binding>; MAX_INPUTS]>> =
    Mutex::new(RefCell::new([const { None }; MAX_INPUTS]));

const fn event(direction: Direction) -> Event {
    match direction {
        Direction::Rising => Event::RisingEdge,
        Direction::Falling => Event::FallingEdge,
    }
}

/// Installs the interrupt handler shared by all watched inputs.
///
/// It must be called once, before watching any input.
pub fn install(io: &mut Io<'_>) {
    io.set_interrupt_handler(on_gpio_interrupt);
}

/// Watches an input through a new channel.
///
/// The input level is sampled to arm the channel for the only possible
/// transition, then the input interrupt is enabled for that transition. The
/// channel lives for the whole program.
///
/// # Errors
///
/// Every input slot is taken.
pub fn watch(
    mut input: Input<'static>,
    id: ChannelId,
    window_ms: u32,
) -> Result<&'static SignalChannel> {
    let Ok(level) = sample_level(&mut input);
    let channel: &'static SignalChannel =
        Box::leak(Box::new(SignalChannel::with_level(id, window_ms, level)));

    critical_section::with(|cs| {
        let mut bindings = BINDINGS.borrow_ref_mut(cs);
        let slot = bindings
            .iter_mut()
            .find(|binding| binding.is_none())
            .ok_or_else(|| Error::new(ErrorKind::Resources, "No free input slot"))?;

        input.listen(event(channel.armed()));
        *slot = Some(Binding { input, channel });
        Ok::<_, Error>(())
    })?;

    info!(
        "Watching channel {id} from level {level:?}, debounce window {window_ms} ms"
    );

    Ok(channel)
}

#[handler]
fn on_gpio_interrupt() {
    // Truncation is the wrap around of the millisecond clock.
    let now_ms = Instant::now().duration_since_epoch().as_millis() as u32;

    critical_section::with(|cs| {
        for binding in BINDINGS.borrow_ref_mut(cs).iter_mut().flatten() {
            if !binding.input.is_interrupt_set() {
                continue;
            }

            let _ = binding.channel.record_edge(now_ms);
            binding.input.listen(event(binding.channel.armed()));
            binding.input.clear_interrupt();
        }
    });
}
