//! Read-only presentation of the shared state.
//!
//! The panel driver lives outside this crate. It implements [`Display`] and
//! receives a [`Snapshot`] every refresh; [`Snapshot::lines`] lays the state
//! out for a 21×4 character screen.
use core::{convert::Infallible, fmt::Write};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Ticker};
use uom::si::thermodynamic_temperature::degree_celsius;

use crate::{
    control::ThermostatState,
    state::{SensorStatus, Shared},
};

/// Characters per line on a 128×64 panel with a 6×8 font.
pub const COLUMNS: usize = 21;

pub type TextLine = heapless::String<COLUMNS>;

/// A consistent copy of everything a display shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub sensor: SensorStatus,
    pub thermostat: ThermostatState,
}

impl Snapshot {
    pub fn take<M: RawMutex>(shared: &Shared<M>) -> Self {
        Self {
            sensor: shared.sensor(),
            thermostat: shared.thermostat(),
        }
    }

    /// Renders the snapshot as four lines of text.
    ///
    /// A reading kept across failed reads is marked with `*`.
    #[must_use]
    pub fn lines(&self) -> [TextLine; 4] {
        let stale = if self.sensor.is_valid() { "" } else { "*" };
        let (temperature, humidity) = match &self.sensor.reading {
            Some(reading) => (
                text(format_args!("Temp: {:.1}C{}", reading.celsius(), stale)),
                text(format_args!("Hum:  {:.1}%{}", reading.percent(), stale)),
            ),
            None => (text(format_args!("Temp: --.-C")), text(format_args!("Hum:  --.-%"))),
        };

        let state = &self.thermostat;
        let set_point = text(format_args!(
            "Set:  {:.1}C {}",
            state.set_point.get::<degree_celsius>(),
            state.mode.label()
        ));

        let outputs = if self.sensor.consecutive_failures > 0 {
            text(format_args!(
                "Sensor error x{}",
                self.sensor.consecutive_failures
            ))
        } else {
            text(format_args!(
                "Cool:{} Heat:{}",
                on_off(state.cooling),
                on_off(state.heating)
            ))
        };

        [temperature, humidity, set_point, outputs]
    }
}

fn on_off(active: bool) -> &'static str {
    if active {
        "on"
    } else {
        "off"
    }
}

/// Formats into a line, cutting off whatever does not fit.
fn text(args: core::fmt::Arguments<'_>) -> TextLine {
    struct Truncate(TextLine);

    impl Write for Truncate {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            for c in s.chars() {
                if self.0.push(c).is_err() {
                    break;
                }
            }
            Ok(())
        }
    }

    let mut line = Truncate(TextLine::new());
    // `Truncate` itself never fails.
    let _ = line.write_fmt(args);
    line.0
}

/// A screen that presents snapshots.
pub trait Display {
    type Error;

    fn show(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error>;
}

/// Writes every snapshot to the log.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl Display for LogDisplay {
    type Error = Infallible;

    fn show(&mut self, snapshot: &Snapshot) -> Result<(), Infallible> {
        for line in snapshot.lines() {
            info!("| {}", line.as_str());
        }
        Ok(())
    }
}

/// Refreshes `display` every `period`, forever.
pub async fn run<M: RawMutex, D: Display>(mut display: D, shared: &Shared<M>, period: Duration) -> ! {
    let mut ticker = Ticker::every(period);
    loop {
        if display.show(&Snapshot::take(shared)).is_err() {
            warn!("display refresh failed");
        }
        ticker.next().await;
    }
}
