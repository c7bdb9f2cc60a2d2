use embedded_hal::digital::{InputPin, PinState};

use crate::debouncer::Level;

impl From<PinState> for Level {
    fn from(state: PinState) -> Self {
        match state {
            PinState::Low => Self::Low,
            PinState::High => Self::High,
        }
    }
}

/// Samples the current level of an input pin.
///
/// It is meant to be called once at startup, before enabling the interrupt
/// of the pin, to build a channel armed for the only possible transition.
///
/// # Errors
///
/// Reading the pin fails.
pub fn sample_level<P: InputPin>(pin: &mut P) -> Result<Level, P::Error> {
    Ok(if pin.is_high()? {
        Level::High
    } else {
        Level::Low
    })
}

#[cfg(test)]
mod tests {
    use embedded_hal::digital::PinState;

    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    use super::sample_level;
    use crate::channel::{ChannelId, SignalChannel};
    use crate::debouncer::{Direction, Level};

    #[test]
    fn pulled_up_input_arms_a_falling_edge() {
        let expectations = [PinTransaction::get(State::High)];
        let mut pin = PinMock::new(&expectations);

        let level = sample_level(&mut pin).unwrap();
        assert_eq!(level, Level::High);

        let channel = SignalChannel::with_level(ChannelId(23), 100, level);
        assert_eq!(channel.armed(), Direction::Falling);

        pin.done();
    }

    #[test]
    fn low_input() {
        let expectations = [PinTransaction::get(State::Low)];
        let mut pin = PinMock::new(&expectations);

        assert_eq!(sample_level(&mut pin).unwrap(), Level::Low);

        pin.done();
    }

    #[test]
    fn pin_states() {
        assert_eq!(Level::from(PinState::High), Level::High);
        assert_eq!(Level::from(PinState::Low), Level::Low);
    }
}
