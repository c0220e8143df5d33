//! Startup configuration.
//!
//! Everything here is fixed at boot. Only the set point and mode change at
//! runtime, and those live in [`ThermostatState`](crate::ThermostatState).
use core::cmp::Ordering;

use embassy_time::Duration;
use uom::si::{temperature_interval, thermodynamic_temperature::degree_celsius};

use crate::{
    button::{Debounce, PinMap},
    control::ControlConfig,
    decode::dht::SensorKind,
    dht::{Timing, MAX_POLL_INTERVAL_US, ONE_HIGH_US, ZERO_HIGH_US},
};

pub type Result<T> = core::result::Result<T, Error>;

/// Represents a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// The temperature range holds no set point.
    #[error("empty temperature range: {min}°C to {max}°C")]
    EmptyRange { min: f32, max: f32 },
    #[error("initial set point {0}°C outside the temperature range")]
    SetPointOutOfRange(f32),
    #[error("invalid set point step: {0}°C")]
    InvalidStep(f32),
    #[error("invalid margin: {0}°C")]
    InvalidMargin(f32),
    /// The repeat window must cover the confirm delay.
    #[error("invalid debounce: confirm {confirm_ms}ms, repeat window {repeat_window_ms}ms")]
    InvalidDebounce { confirm_ms: u32, repeat_window_ms: u32 },
    /// A protocol timing that cannot decode a frame.
    #[error("invalid {name}: {value_us}μs")]
    InvalidTiming { name: &'static str, value_us: u32 },
    #[error("invalid {name} period: {period_ms}ms")]
    InvalidPeriod { name: &'static str, period_ms: u64 },
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Error::MissingField(e.field_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, derive_builder::Builder)]
#[builder(
    no_std,
    pattern = "owned",
    default,
    build_fn(private, name = "build_unvalidated", error = "Error")
)]
pub struct Config {
    pub sensor: SensorKind,
    pub timing: Timing,
    pub control: ControlConfig,
    pub buttons: PinMap,
    pub debounce: Debounce,
    pub sample_period_ms: u64,
    pub control_period_ms: u64,
    pub display_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorKind::default(),
            timing: Timing::default(),
            control: ControlConfig::default(),
            buttons: PinMap::default(),
            debounce: Debounce::default(),
            sample_period_ms: 2_000,
            control_period_ms: 500,
            display_period_ms: 1_000,
        }
    }
}

impl ConfigBuilder {
    /// Builds and validates the configuration.
    pub fn build(self) -> Result<Config> {
        let config = self.build_unvalidated()?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        let control = &self.control;
        let min = control.min_temperature.get::<degree_celsius>();
        let max = control.max_temperature.get::<degree_celsius>();
        if min.partial_cmp(&max) != Some(Ordering::Less) {
            return Err(Error::EmptyRange { min, max });
        }

        let set_point = control.initial_set_point.get::<degree_celsius>();
        if !(min..=max).contains(&set_point) {
            return Err(Error::SetPointOutOfRange(set_point));
        }

        let step = control
            .step
            .get::<temperature_interval::degree_celsius>();
        if step.is_nan() || step <= 0.0 || step > max - min {
            return Err(Error::InvalidStep(step));
        }

        let margin = control
            .margin
            .get::<temperature_interval::degree_celsius>();
        if margin.is_nan() || margin < 0.0 || margin >= max - min {
            return Err(Error::InvalidMargin(margin));
        }

        self.validate_timing()?;

        let debounce = self.debounce;
        if debounce.confirm_ms > debounce.repeat_window_ms {
            return Err(Error::InvalidDebounce {
                confirm_ms: debounce.confirm_ms,
                repeat_window_ms: debounce.repeat_window_ms,
            });
        }

        if self.sample_period_ms < self.sensor.min_sample_period_ms() {
            return Err(Error::InvalidPeriod {
                name: "sample",
                period_ms: self.sample_period_ms,
            });
        }
        for (name, period_ms) in [
            ("control", self.control_period_ms),
            ("display", self.display_period_ms),
        ] {
            if period_ms == 0 {
                return Err(Error::InvalidPeriod { name, period_ms });
            }
        }

        Ok(())
    }

    fn validate_timing(&self) -> Result<()> {
        let timing = &self.timing;
        let invalid = |name, value_us| Err(Error::InvalidTiming { name, value_us });

        if timing.start_pulse_us == Some(0) {
            return invalid("start pulse", 0);
        }
        if timing.response_timeout_us == 0 {
            return invalid("response timeout", 0);
        }
        if timing.bit_timeout_us <= ONE_HIGH_US {
            return invalid("bit timeout", timing.bit_timeout_us);
        }
        // The threshold has to fall between the two bit lengths.
        if timing.one_threshold_us <= ZERO_HIGH_US || timing.one_threshold_us >= ONE_HIGH_US {
            return invalid("bit threshold", timing.one_threshold_us);
        }
        if !(1..=MAX_POLL_INTERVAL_US).contains(&timing.poll_interval_us) {
            return invalid("poll interval", timing.poll_interval_us);
        }
        Ok(())
    }

    #[must_use]
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    #[must_use]
    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    #[must_use]
    pub fn display_period(&self) -> Duration {
        Duration::from_millis(self.display_period_ms)
    }
}
