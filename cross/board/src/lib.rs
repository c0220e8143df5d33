#![no_std]
#![warn(clippy::suspicious, clippy::complexity, clippy::perf, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::similar_names)]

use core::convert::Infallible;

use airzone::{button::PinMap, Clock, Dht};
use defmt::info;
use embassy_rp::{
    config,
    gpio::{Flex, Input, Level, Output, Pull},
};
use embassy_time::{Delay, Instant};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// Gpio numbers of the buttons, as wired in [`Board::new`].
pub const PIN_MAP: PinMap = PinMap {
    increase: 12,
    decrease: 13,
    mode: 14,
};

/// The DHT sensor as wired on this board.
pub type Sensor = Dht<LinePin<'static>, Delay, Uptime>;

pub struct Board {
    /// DHT data line.
    pub line: LinePin<'static>,
    pub increase: Input<'static>,
    pub decrease: Input<'static>,
    pub mode: Input<'static>,
    /// Cooling relay, active high.
    pub cooling: Output<'static>,
    /// Heating relay, active high.
    pub heating: Output<'static>,
    pub led: Output<'static>,
}

impl Board {
    #[must_use]
    pub fn new() -> Self {
        let peripherals = embassy_rp::init(config::Config::default());

        let line = LinePin::new(Flex::new(peripherals.PIN_15));
        let increase = Input::new(peripherals.PIN_12, Pull::Up);
        let decrease = Input::new(peripherals.PIN_13, Pull::Up);
        let mode = Input::new(peripherals.PIN_14, Pull::Up);
        let cooling = Output::new(peripherals.PIN_16, Level::Low);
        let heating = Output::new(peripherals.PIN_17, Level::Low);
        let led = Output::new(peripherals.PIN_25, Level::Low);

        info!("board initialized!");

        Self {
            line,
            increase,
            decrease,
            mode,
            cooling,
            heating,
            led,
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// An open-drain line on a bidirectional pin.
///
/// Driving low switches the pin to an output, driving high releases it to
/// the pull-up.
pub struct LinePin<'d> {
    pin: Flex<'d>,
}

impl<'d> LinePin<'d> {
    #[must_use]
    pub fn new(mut pin: Flex<'d>) -> Self {
        pin.set_pull(Pull::Up);
        pin.set_as_input();
        Self { pin }
    }
}

impl ErrorType for LinePin<'_> {
    type Error = Infallible;
}

impl InputPin for LinePin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

impl OutputPin for LinePin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        self.pin.set_as_output();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_as_input();
        Ok(())
    }
}

/// Time since boot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uptime;

impl Clock for Uptime {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}
