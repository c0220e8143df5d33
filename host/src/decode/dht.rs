//! DHT11/DHT22 temperature and humidity frame decoder.
//!
//! # Encoding
//!
//! A DHT payload is 40 bits, the most significant bit is first:
//!
//! ```txt
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Humidity hi  |  Humidity lo  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |S|  Temp hi    |    Temp lo    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Checksum   |
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! where:
//! - DHT11
//!     - Humidity hi/lo: integer and tenths of %RH
//!     - Temp hi/lo: integer and tenths of °C
//! - DHT22
//!     - Humidity: 16 bit unsigned, tenths of %RH
//!     - Temperature: 15 bit magnitude in tenths of °C, `S` set when negative
//! - Checksum (8 bits, unsigned)
//!     - Equal to the sum of the rest of the payload, modulo 256
//!
//! See: [DHT11 datasheet] § 5, [DHT22 datasheet] § 7.
//!
//! [DHT11 datasheet]: https://www.mouser.com/datasheet/2/758/DHT11-Technical-Data-Sheet-Translated-Version-1143054.pdf
//! [DHT22 datasheet]: https://www.sparkfun.com/datasheets/Sensors/Temperature/DHT22.pdf
use core::ops::RangeInclusive;

use bitvec::prelude::*;
use uom::si::{
    f32::{Ratio, ThermodynamicTemperature},
    ratio::percent,
    thermodynamic_temperature::degree_celsius,
};

pub type Result<T> = core::result::Result<T, Error>;

/// Number of bits in a frame.
pub const FRAME_BITS: usize = 40;

/// Represents a frame decoding error.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The checksum is mismatched.
    #[error("checksum mismatched (expected {expected:#04x}, found {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("temperature out of range: got {0}°C")]
    TemperatureOutOfRange(f32),
    #[error("humidity out of range: expected 0≤x≤100%, got {0}%")]
    HumidityOutOfRange(f32),
}

/// Supported sensor models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorKind {
    #[default]
    Dht11,
    Dht22,
}

impl SensorKind {
    /// Minimum length of the host start pulse, with some margin.
    #[must_use]
    pub const fn start_pulse_us(self) -> u32 {
        match self {
            SensorKind::Dht11 => 20_000,
            SensorKind::Dht22 => 1_100,
        }
    }

    /// Temperatures the sensor can physically report, in °C.
    #[must_use]
    pub const fn temperature_range(self) -> RangeInclusive<f32> {
        match self {
            SensorKind::Dht11 => 0.0..=50.0,
            SensorKind::Dht22 => -40.0..=80.0,
        }
    }

    /// Shortest interval the sensor tolerates between two reads.
    #[must_use]
    pub const fn min_sample_period_ms(self) -> u64 {
        match self {
            SensorKind::Dht11 => 1_000,
            SensorKind::Dht22 => 2_000,
        }
    }
}

/// A raw 40 bit frame, as clocked in from the line.
#[derive(Debug, Clone, Copy, derive_more::Deref, derive_more::DerefMut)]
pub struct Frame(BitArray<[u8; 5], Msb0>);

impl Frame {
    #[must_use]
    pub fn new(bytes: [u8; 5]) -> Self {
        Self(BitArray::new(bytes))
    }

    #[must_use]
    pub fn bytes(&self) -> [u8; 5] {
        self.0.into_inner()
    }
}

/// Represents decoded sensor data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Data {
    /// Relative humidity.
    pub humidity: Ratio,
    /// Temperature.
    pub temperature: ThermodynamicTemperature,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Data {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Data {{ humidity: {}%, temperature: {}°C }}",
            self.humidity.get::<percent>(),
            self.temperature.get::<degree_celsius>(),
        );
    }
}

/// Represents a frame that passed its checksum, in sensor units.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawData {
    /// Tenths of %RH.
    humidity: u16,
    /// Tenths of °C.
    temperature: i16,
}

/// Decodes a frame from a `kind` sensor.
pub fn decode(kind: SensorKind, frame: &Frame) -> Result<Data> {
    let RawData {
        humidity,
        temperature,
    } = decode_raw(kind, frame)?;

    let humidity = f32::from(humidity) / 10.0;
    let temperature = f32::from(temperature) / 10.0;

    if !(0.0..=100.0).contains(&humidity) {
        return Err(Error::HumidityOutOfRange(humidity));
    }

    if !kind.temperature_range().contains(&temperature) {
        return Err(Error::TemperatureOutOfRange(temperature));
    }

    Ok(Data {
        humidity: Ratio::new::<percent>(humidity),
        temperature: ThermodynamicTemperature::new::<degree_celsius>(temperature),
    })
}

/// Verifies the checksum and unpacks a frame into tenths.
fn decode_raw(kind: SensorKind, frame: &Frame) -> Result<RawData> {
    let data = frame.as_bitslice();
    let expected = data[32..40].load_be::<u8>();
    let actual = data[0..32]
        .chunks(8)
        .fold(0u8, |sum, v| sum.wrapping_add(v.load_be::<u8>()));

    if actual != expected {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    Ok(match kind {
        SensorKind::Dht11 => {
            let integral = |bits: &BitSlice<u8, Msb0>| u16::from(bits.load_be::<u8>()) * 10;
            let tenths = |bits: &BitSlice<u8, Msb0>| u16::from(bits.load_be::<u8>());
            let humidity = integral(&data[0..8]) + tenths(&data[8..16]);
            // At most 255 * 10 + 255, well within `i16`.
            #[allow(clippy::cast_possible_wrap)]
            let temperature = (integral(&data[16..24]) + tenths(&data[24..32])) as i16;
            RawData {
                humidity,
                temperature,
            }
        }
        SensorKind::Dht22 => {
            let humidity = data[0..16].load_be::<u16>();
            // 15 bit magnitude, so it always fits.
            #[allow(clippy::cast_possible_wrap)]
            let magnitude = data[17..32].load_be::<u16>() as i16;
            let temperature = if data[16] { -magnitude } else { magnitude };
            RawData {
                humidity,
                temperature,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use float_eq::assert_float_eq;

    use super::*;

    fn frame(bytes: [u8; 4]) -> Frame {
        let checksum = bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
        Frame::new([bytes[0], bytes[1], bytes[2], bytes[3], checksum])
    }

    #[test]
    fn dht11_typical() -> Result<()> {
        let payload = Frame::new([25, 0, 26, 0, 51]);
        let data = decode(SensorKind::Dht11, &payload)?;
        assert_float_eq!(data.humidity.get::<percent>(), 25.0, abs <= 1e-4);
        assert_float_eq!(data.temperature.get::<degree_celsius>(), 26.0, abs <= 1e-3);
        Ok(())
    }

    #[test]
    fn dht11_tenths() -> Result<()> {
        let payload = Frame::new([0x27, 0x03, 0x14, 0x08, 0x46]);
        let raw = decode_raw(SensorKind::Dht11, &payload)?;
        assert_eq!(raw.humidity, 393);
        assert_eq!(raw.temperature, 208);

        let data = decode(SensorKind::Dht11, &payload)?;
        assert_float_eq!(data.humidity.get::<percent>(), 39.3, abs <= 1e-4);
        assert_float_eq!(data.temperature.get::<degree_celsius>(), 20.8, abs <= 1e-3);
        Ok(())
    }

    #[test]
    fn dht22_typical() -> Result<()> {
        let payload = Frame::new([0x02, 0x8C, 0x01, 0x11, 0xA0]);
        let raw = decode_raw(SensorKind::Dht22, &payload)?;
        assert_eq!(raw.humidity, 652);
        assert_eq!(raw.temperature, 273);

        let data = decode(SensorKind::Dht22, &payload)?;
        assert_float_eq!(data.humidity.get::<percent>(), 65.2, abs <= 1e-4);
        assert_float_eq!(data.temperature.get::<degree_celsius>(), 27.3, abs <= 1e-3);
        Ok(())
    }

    #[test]
    fn dht22_negative_temp() -> Result<()> {
        let payload = frame([0x02, 0x8C, 0x80, 0x65]);
        assert_eq!(payload.bytes()[4], 0x73);
        let raw = decode_raw(SensorKind::Dht22, &payload)?;
        assert_eq!(raw.temperature, -101);

        let data = decode(SensorKind::Dht22, &payload)?;
        assert_float_eq!(data.temperature.get::<degree_celsius>(), -10.1, abs <= 1e-3);

        // The sign bit alone reads as zero.
        let data = decode(SensorKind::Dht22, &frame([0x02, 0x8C, 0x80, 0x00]))?;
        assert_float_eq!(data.temperature.get::<degree_celsius>(), 0.0, abs <= 1e-3);
        Ok(())
    }

    #[test]
    fn checksum_mismatch() {
        assert_eq!(
            decode(SensorKind::Dht11, &Frame::new([0x27, 0x00, 0x14, 0x00, 0x00])),
            Err(Error::ChecksumMismatch {
                expected: 0x00,
                actual: 0x3b
            })
        );

        assert_eq!(
            decode(SensorKind::Dht22, &Frame::new([0x02, 0x8C, 0x01, 0x11, 0xA1])),
            Err(Error::ChecksumMismatch {
                expected: 0xa1,
                actual: 0xa0
            })
        );
    }

    #[test]
    fn checksum_wraps() -> Result<()> {
        // 0xff * 4 = 0x3fc, truncated to 0xfc.
        decode_raw(SensorKind::Dht22, &Frame::new([0xff, 0xff, 0xff, 0xff, 0xfc]))?;
        Ok(())
    }

    #[test]
    fn every_checksum_but_one_fails() {
        let bytes = [40, 5, 21, 3];
        let valid = frame(bytes).bytes()[4];
        for checksum in 0..=u8::MAX {
            let result = decode(
                SensorKind::Dht11,
                &Frame::new([bytes[0], bytes[1], bytes[2], bytes[3], checksum]),
            );
            if checksum == valid {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
            }
        }
    }

    #[test]
    fn humidity_range() -> Result<()> {
        // Check the boundaries: 0% and 100%.
        decode(SensorKind::Dht11, &frame([0, 0, 20, 0]))?;
        decode(SensorKind::Dht11, &frame([100, 0, 20, 0]))?;
        decode(SensorKind::Dht22, &frame([0x03, 0xE8, 0x00, 0xFA]))?;

        // Check above the upper boundary.
        assert_eq!(
            decode(SensorKind::Dht11, &frame([100, 1, 20, 0])),
            Err(Error::HumidityOutOfRange(100.1))
        );
        assert_eq!(
            decode(SensorKind::Dht22, &frame([0x03, 0xE9, 0x00, 0xFA])),
            Err(Error::HumidityOutOfRange(100.1))
        );
        Ok(())
    }

    #[test]
    fn dht11_temperature_range() -> Result<()> {
        // Check the boundaries: 0°C and 50°C.
        decode(SensorKind::Dht11, &frame([40, 0, 0, 0]))?;
        decode(SensorKind::Dht11, &frame([40, 0, 50, 0]))?;

        // Check above the upper boundary.
        assert_eq!(
            decode(SensorKind::Dht11, &frame([40, 0, 50, 1])),
            Err(Error::TemperatureOutOfRange(50.1))
        );
        // A set top bit is not a sign on the DHT11, it is noise.
        assert_eq!(
            decode(SensorKind::Dht11, &frame([40, 0, 0x94, 0])),
            Err(Error::TemperatureOutOfRange(148.0))
        );
        Ok(())
    }

    #[test]
    fn dht22_temperature_range() -> Result<()> {
        // Check the boundaries: -40°C and 80°C.
        decode(SensorKind::Dht22, &frame([0x01, 0xF4, 0x81, 0x90]))?;
        decode(SensorKind::Dht22, &frame([0x01, 0xF4, 0x03, 0x20]))?;

        // Check outside the boundaries.
        assert_eq!(
            decode(SensorKind::Dht22, &frame([0x01, 0xF4, 0x81, 0x91])),
            Err(Error::TemperatureOutOfRange(-40.1))
        );
        assert_eq!(
            decode(SensorKind::Dht22, &frame([0x01, 0xF4, 0x03, 0x21])),
            Err(Error::TemperatureOutOfRange(80.1))
        );
        Ok(())
    }
}
