//! State shared between the acquisition, control and display tasks.
//!
//! Each record is replaced whole under a short critical section, so readers
//! always see a consistent copy and never wait on a slow writer.
use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};

use crate::{control::ThermostatState, dht::Failure, dht::SensorReading};

/// What the acquisition task knows about the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorStatus {
    /// The most recent valid reading. Survives failed reads.
    pub reading: Option<SensorReading>,
    /// Failed reads since the last valid one.
    pub consecutive_failures: u32,
    pub total_failures: u32,
    pub successes: u32,
    pub last_failure: Option<Failure>,
}

impl SensorStatus {
    pub fn record_reading(&mut self, reading: SensorReading) {
        self.reading = Some(reading);
        self.consecutive_failures = 0;
        self.successes = self.successes.saturating_add(1);
    }

    pub fn record_failure(&mut self, failure: Failure) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures = self.total_failures.saturating_add(1);
        self.last_failure = Some(failure);
    }

    /// Whether the latest read attempt succeeded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.reading.is_some() && self.consecutive_failures == 0
    }
}

pub struct Shared<M: RawMutex> {
    sensor: Mutex<M, Cell<SensorStatus>>,
    thermostat: Mutex<M, Cell<ThermostatState>>,
}

impl<M: RawMutex> Shared<M> {
    #[must_use]
    pub const fn new(thermostat: ThermostatState) -> Self {
        Self {
            sensor: Mutex::new(Cell::new(SensorStatus {
                reading: None,
                consecutive_failures: 0,
                total_failures: 0,
                successes: 0,
                last_failure: None,
            })),
            thermostat: Mutex::new(Cell::new(thermostat)),
        }
    }

    /// Returns the updated status.
    pub fn publish_reading(&self, reading: SensorReading) -> SensorStatus {
        self.update_sensor(|status| status.record_reading(reading))
    }

    /// Returns the updated status.
    pub fn record_failure(&self, failure: Failure) -> SensorStatus {
        self.update_sensor(|status| status.record_failure(failure))
    }

    #[must_use]
    pub fn sensor(&self) -> SensorStatus {
        self.sensor.lock(Cell::get)
    }

    pub fn publish_thermostat(&self, state: ThermostatState) {
        self.thermostat.lock(|cell| cell.set(state));
    }

    #[must_use]
    pub fn thermostat(&self) -> ThermostatState {
        self.thermostat.lock(Cell::get)
    }

    fn update_sensor(&self, f: impl FnOnce(&mut SensorStatus)) -> SensorStatus {
        self.sensor.lock(|cell| {
            let mut status = cell.get();
            f(&mut status);
            cell.set(status);
            status
        })
    }
}

impl<M: RawMutex> Default for Shared<M> {
    fn default() -> Self {
        Self::new(ThermostatState::default())
    }
}
