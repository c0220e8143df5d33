//! Periodic sensor acquisition.
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Ticker};

use crate::{
    dht::{Failure, Sensor},
    state::{SensorStatus, Shared},
};

/// Reads the sensor and publishes the outcome to [`Shared`].
pub struct Acquisition<'a, M: RawMutex, S> {
    sensor: S,
    shared: &'a Shared<M>,
}

impl<'a, M: RawMutex, S: Sensor> Acquisition<'a, M, S> {
    pub fn new(sensor: S, shared: &'a Shared<M>) -> Self {
        Self { sensor, shared }
    }

    /// Performs one read attempt.
    ///
    /// A failure never clears the last valid reading.
    pub fn acquire_once(&mut self) -> SensorStatus {
        match self.sensor.read() {
            Ok(reading) => {
                info!(
                    "temperature: {}°C, humidity: {}%",
                    reading.celsius(),
                    reading.percent()
                );
                self.shared.publish_reading(reading)
            }
            Err(e) => {
                let failure: Failure = e.into();
                let status = self.shared.record_failure(failure);
                warn!(
                    "sensor read failed: {:?} ({} in a row)",
                    failure, status.consecutive_failures
                );
                status
            }
        }
    }

    /// Reads the sensor every `period`, forever.
    pub async fn run(mut self, period: Duration) -> ! {
        let mut ticker = Ticker::every(period);
        loop {
            self.acquire_once();
            ticker.next().await;
        }
    }
}
