//! DHT11/DHT22 temperature and humidity sensor protocol.
//!
//! # Protocol
//!
//! The protocol for requesting data from the sensor is as follows:
//!
//! ```txt
//!                                             DATA
//!                                ┌─────────────────────────────┐
//!     SYN    ACK       READY       SOT   0 BIT   SOT   1 BIT
//!    ┌────┐ ┌────┐ ┌───────────┐ ┌────┐ ┌────┐ ┌────┐ ┌────┐
//! ──┐      ┌──────┐      ┌──────┐      ┌──────┐      ┌──────┐
//!   │      │      │      │      │      │      │      │      │
//!   └──────┘      └──────┘      └──────┘      └──────┘      └──
//!     18ms   40μs   80μs   80μs   50μs   28μs   50μs   70μs
//! ```
//!
//! - SYN: The host pulls the line low for ≥18ms (DHT11) or ≥1ms (DHT22)
//! - ACK: The host releases the line, the pull-up holds it high for 20-40μs
//! - READY: The sensor pulls the line low then high for 80μs each
//! - SOT: The sensor signals the start of each bit by pulling the line low for
//!   50μs, then:
//!     - A high pulse of 26-28μs indicates a 0 bit
//!     - A high pulse of 70μs indicates a 1 bit
//!
//! See: [datasheet] § 5.
//!
//! [datasheet]: https://www.mouser.com/datasheet/2/758/DHT11-Technical-Data-Sheet-Translated-Version-1143054.pdf
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin, PinState},
};
use uom::si::{
    f32::{Ratio, ThermodynamicTemperature},
    ratio::percent,
    thermodynamic_temperature::degree_celsius,
};

use crate::{
    clock::Clock,
    decode::dht::{self as decode, Frame, SensorKind, FRAME_BITS},
    line::{self, Line},
};

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Represents a sensor read error.
#[derive(Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The sensor did not acknowledge the start pulse.
    #[error("sensor did not respond")]
    ResponseTimeout,
    /// The sensor stopped transmitting mid-frame.
    #[error("data timed out at bit {bit}")]
    DataTimeout { bit: u8 },
    /// The frame was received but is not valid.
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    /// The line pin failed.
    #[error("pin error: {0:?}")]
    Pin(E),
}

/// The kind of a read failure, without any hardware error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Failure {
    ResponseTimeout,
    DataTimeout,
    ChecksumMismatch,
    OutOfRange,
    Hardware,
}

impl<E> From<Error<E>> for Failure {
    fn from(e: Error<E>) -> Self {
        e.kind()
    }
}

impl<E> Error<E> {
    #[must_use]
    pub fn kind(&self) -> Failure {
        match self {
            Error::ResponseTimeout => Failure::ResponseTimeout,
            Error::DataTimeout { .. } => Failure::DataTimeout,
            Error::Decode(decode::Error::ChecksumMismatch { .. }) => Failure::ChecksumMismatch,
            Error::Decode(_) => Failure::OutOfRange,
            Error::Pin(_) => Failure::Hardware,
        }
    }
}

/// Longest high pulse of a `0` bit.
pub const ZERO_HIGH_US: u32 = 28;
/// High pulse of a `1` bit.
pub const ONE_HIGH_US: u32 = 70;
/// Coarsest line sampling that still resolves a `0` bit.
pub const MAX_POLL_INTERVAL_US: u32 = 10;

/// Protocol timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Overrides the sensor's default start pulse length.
    pub start_pulse_us: Option<u32>,
    /// Longest wait for each acknowledgement level.
    pub response_timeout_us: u32,
    /// Longest wait for each level within a data bit.
    pub bit_timeout_us: u32,
    /// High pulses longer than this are `1` bits.
    pub one_threshold_us: u32,
    /// Sleep between two line samples.
    pub poll_interval_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            start_pulse_us: None,
            response_timeout_us: 100,
            bit_timeout_us: 100,
            one_threshold_us: 40,
            poll_interval_us: 1,
        }
    }
}

/// A successful sensor reading.
///
/// Readings are never updated in place, a newer reading replaces an older one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Temperature.
    pub temperature: ThermodynamicTemperature,
    /// Relative humidity.
    pub humidity: Ratio,
    /// Milliseconds since boot when the frame completed.
    pub taken_at_ms: u64,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorReading {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "SensorReading {{ temperature: {}°C, humidity: {}%, taken_at: {}ms }}",
            self.temperature.get::<degree_celsius>(),
            self.humidity.get::<percent>(),
            self.taken_at_ms,
        );
    }
}

impl SensorReading {
    #[must_use]
    pub fn celsius(&self) -> f32 {
        self.temperature.get::<degree_celsius>()
    }

    #[must_use]
    pub fn percent(&self) -> f32 {
        self.humidity.get::<percent>()
    }
}

/// A source of sensor readings.
pub trait Sensor {
    type Error: Into<Failure>;

    /// Performs one complete read attempt.
    fn read(&mut self) -> core::result::Result<SensorReading, Self::Error>;
}

/// The phases of one read attempt.
///
/// Nothing is logged while bits are clocked in, a log write can outlast a
/// `0` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    StartPulse,
    AwaitResponseLow,
    AwaitResponseHigh,
    AwaitBitLow { bit: u8 },
    AwaitBitHigh { bit: u8 },
    ChecksumCheck,
}

/// Represents a DHT11 or DHT22 temperature and humidity sensor.
pub struct Dht<Pin, Delay, C> {
    line: Line<Pin, Delay, C>,
    kind: SensorKind,
    timing: Timing,
}

impl<Pin, Delay, C, E> Dht<Pin, Delay, C>
where
    Pin: InputPin<Error = E> + OutputPin<Error = E>,
    Delay: DelayNs,
    C: Clock,
{
    /// Creates a new [`Dht`] on an open-drain `pin`.
    pub fn new(kind: SensorKind, timing: Timing, pin: Pin, delay: Delay, clock: C) -> Self {
        Self {
            line: Line::new(pin, delay, clock, timing.poll_interval_us),
            kind,
            timing,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Reads data from the sensor.
    ///
    /// Blocks for the whole frame, about 25ms for a DHT11. Every failure is
    /// returned to the caller, the line is left released either way.
    pub fn read(&mut self) -> Result<SensorReading, E> {
        debug!("reading {:?}...", self.kind);
        let frame = self.read_frame()?;
        trace!("read frame: {:?}", frame.bytes());

        let data = decode::decode(self.kind, &frame)?;
        Ok(SensorReading {
            temperature: data.temperature,
            humidity: data.humidity,
            taken_at_ms: self.line.clock().now_ms(),
        })
    }

    /// Clocks a complete frame in from the line.
    fn read_frame(&mut self) -> Result<Frame, E> {
        let timing = self.timing;
        let mut frame = Frame::new([0; 5]);
        let mut phase = Phase::StartPulse;

        loop {
            phase = match phase {
                Phase::StartPulse => {
                    let hold_us = timing
                        .start_pulse_us
                        .unwrap_or_else(|| self.kind.start_pulse_us());
                    self.line.drive_low(hold_us).map_err(Self::pin_error)?;
                    Phase::AwaitResponseLow
                }
                Phase::AwaitResponseLow => {
                    self.respond(PinState::Low)?;
                    Phase::AwaitResponseHigh
                }
                Phase::AwaitResponseHigh => {
                    // The sensor holds the line high until the first bit starts.
                    self.respond(PinState::High)?;
                    self.respond(PinState::Low)?;
                    trace!("sensor acknowledged");
                    Phase::AwaitBitLow { bit: 0 }
                }
                Phase::AwaitBitLow { bit } => {
                    self.data(PinState::High, bit)?;
                    Phase::AwaitBitHigh { bit }
                }
                Phase::AwaitBitHigh { bit } => {
                    let high_us = self.data(PinState::Low, bit)?;
                    // A high level of 26-28μs indicates a `0` bit, 70μs indicates a `1` bit.
                    let value = high_us > timing.one_threshold_us;
                    frame.set(usize::from(bit), value);

                    match usize::from(bit) + 1 {
                        FRAME_BITS => Phase::ChecksumCheck,
                        #[allow(clippy::cast_possible_truncation)]
                        next => Phase::AwaitBitLow { bit: next as u8 },
                    }
                }
                Phase::ChecksumCheck => return Ok(frame),
            };
        }
    }

    /// Waits for an acknowledgement level.
    fn respond(&mut self, level: PinState) -> Result<u32, E> {
        self.line
            .await_level(level, self.timing.response_timeout_us)
            .map_err(|e| match e {
                line::Error::Timeout { .. } => Error::ResponseTimeout,
                line::Error::Pin(e) => Error::Pin(e),
            })
    }

    /// Waits for a level within data bit `bit`.
    fn data(&mut self, level: PinState, bit: u8) -> Result<u32, E> {
        self.line
            .await_level(level, self.timing.bit_timeout_us)
            .map_err(|e| match e {
                line::Error::Timeout { .. } => Error::DataTimeout { bit },
                line::Error::Pin(e) => Error::Pin(e),
            })
    }

    fn pin_error(e: line::Error<E>) -> Error<E> {
        match e {
            line::Error::Timeout { .. } => Error::ResponseTimeout,
            line::Error::Pin(e) => Error::Pin(e),
        }
    }
}

impl<Pin, Delay, C, E> Sensor for Dht<Pin, Delay, C>
where
    Pin: InputPin<Error = E> + OutputPin<Error = E>,
    Delay: DelayNs,
    C: Clock,
{
    type Error = Error<E>;

    fn read(&mut self) -> Result<SensorReading, E> {
        Dht::read(self)
    }
}
