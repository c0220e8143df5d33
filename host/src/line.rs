//! Single-wire signal line driver.
//!
//! The line is open-drain: the host only ever pulls it low. Setting the pin
//! high releases it to the pull-up so the sensor can drive it.
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin, PinState},
};

use crate::clock::Clock;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Represents a signal line error.
#[derive(Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The line never reached the expected level.
    #[error("timed out after {timeout_us}μs waiting for {level:?} level")]
    Timeout {
        #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
        level: PinState,
        timeout_us: u32,
    },
    /// The underlying pin failed.
    #[error("pin error: {0:?}")]
    Pin(E),
}

/// A single-wire line driven by the host and polled at microsecond granularity.
pub struct Line<Pin, Delay, C> {
    pin: Pin,
    delay: Delay,
    clock: C,
    poll_interval_us: u32,
}

impl<Pin, Delay, C, E> Line<Pin, Delay, C>
where
    Pin: InputPin<Error = E> + OutputPin<Error = E>,
    Delay: DelayNs,
    C: Clock,
{
    /// Creates a new [`Line`], polling every `poll_interval_us` while waiting.
    pub fn new(pin: Pin, delay: Delay, clock: C, poll_interval_us: u32) -> Self {
        Self {
            pin,
            delay,
            clock,
            poll_interval_us: poll_interval_us.max(1),
        }
    }

    /// Returns the clock used to time the line.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Releases the line to the pull-up.
    pub fn release(&mut self) -> Result<(), E> {
        self.pin.set_high().map_err(Error::Pin)
    }

    /// Forces the line low for `hold_us`, then releases it.
    pub fn drive_low(&mut self, hold_us: u32) -> Result<(), E> {
        self.pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(hold_us);
        self.release()
    }

    /// Samples the current line level.
    pub fn level(&mut self) -> Result<PinState, E> {
        let is_high = self.pin.is_high().map_err(Error::Pin)?;
        Ok(PinState::from(is_high))
    }

    /// Busy-polls until the line reads `level`, returning the elapsed
    /// microseconds.
    ///
    /// The wait is bounded twice: by clock time and by a poll budget of
    /// `timeout_us / poll_interval_us + 1` iterations. Every iteration sleeps at
    /// least one poll interval, so the budget never cuts a wait short and a
    /// stalled clock still terminates.
    pub fn await_level(&mut self, level: PinState, timeout_us: u32) -> Result<u32, E> {
        let start = self.clock.now_us();
        let budget = timeout_us / self.poll_interval_us + 1;

        for _ in 0..=budget {
            let elapsed = self.clock.now_us().saturating_sub(start);
            if self.level()? == level {
                return Ok(u32::try_from(elapsed).unwrap_or(u32::MAX));
            }
            if elapsed > u64::from(timeout_us) {
                break;
            }
            self.delay.delay_us(self.poll_interval_us);
        }

        Err(Error::Timeout { level, timeout_us })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FrozenLine, SimLine, Waveform};

    #[test]
    fn drive_low_holds_then_releases() {
        let sim = SimLine::new(Waveform::idle());
        let mut line = Line::new(sim.pin(), sim.delay(), sim.clock(), 1);

        line.drive_low(18_000).unwrap();

        assert_eq!(sim.low_pulses(), [18_000]);
        assert!(sim.is_released());
    }

    #[test]
    fn measures_pulse_duration() {
        // After release: 30μs high, 80μs low, then idle high.
        let sim = SimLine::new(Waveform::from_segments(&[(true, 30), (false, 80)]));
        let mut line = Line::new(sim.pin(), sim.delay(), sim.clock(), 1);
        line.release().unwrap();

        let to_low = line.await_level(PinState::Low, 100).unwrap();
        let low_len = line.await_level(PinState::High, 100).unwrap();

        assert!((29..=31).contains(&to_low), "{to_low}");
        assert!((79..=81).contains(&low_len), "{low_len}");
    }

    #[test]
    fn already_at_level_returns_immediately() {
        let sim = SimLine::new(Waveform::idle());
        let mut line = Line::new(sim.pin(), sim.delay(), sim.clock(), 1);
        line.release().unwrap();

        assert_eq!(line.await_level(PinState::High, 100), Ok(0));
    }

    #[test]
    fn times_out_when_level_never_arrives() {
        let sim = SimLine::new(Waveform::idle());
        let mut line = Line::new(sim.pin(), sim.delay(), sim.clock(), 1);
        line.release().unwrap();

        assert_eq!(
            line.await_level(PinState::Low, 100),
            Err(Error::Timeout {
                level: PinState::Low,
                timeout_us: 100
            })
        );
        assert!(sim.now_us() <= 102);
    }

    #[test]
    fn stalled_clock_still_terminates() {
        let frozen = FrozenLine::new(true);
        let mut line = Line::new(frozen.pin(), frozen.delay(), frozen.clock(), 1);

        assert!(matches!(
            line.await_level(PinState::Low, 100),
            Err(Error::Timeout { .. })
        ));
        assert!(frozen.polls() <= 102);
    }
}
