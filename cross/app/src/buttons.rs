//! Button edge watchers.
//!
//! Each watcher owns one button input, mirrors its level for the debouncer and
//! hands falling edges to the edge queue.
use core::{cell::Cell, convert::Infallible};

use airzone::button::EdgeSender;
use defmt::warn;
use embassy_rp::gpio::Input;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, InputPin};

use crate::{RawMutex, EDGE_QUEUE};

/// The last level seen on a button, `true` while pressed.
pub struct ButtonLevel {
    pressed: Mutex<RawMutex, Cell<bool>>,
}

impl ButtonLevel {
    pub const fn new() -> Self {
        Self {
            pressed: Mutex::new(Cell::new(false)),
        }
    }

    fn set(&self, pressed: bool) {
        self.pressed.lock(|cell| cell.set(pressed));
    }

    pub fn reader(&'static self) -> LevelReader {
        LevelReader(self)
    }
}

/// Reads a [`ButtonLevel`] as an active-low input.
pub struct LevelReader(&'static ButtonLevel);

impl ErrorType for LevelReader {
    type Error = Infallible;
}

impl InputPin for LevelReader {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.pressed.lock(Cell::get))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.pressed.lock(Cell::get))
    }
}

#[embassy_executor::task(pool_size = 3)]
pub async fn edge_task(
    mut pin: Input<'static>,
    gpio: u8,
    level: &'static ButtonLevel,
    edges: &'static EdgeSender<'static, RawMutex, EDGE_QUEUE>,
) {
    level.set(pin.is_low());
    loop {
        pin.wait_for_any_edge().await;
        let pressed = pin.is_low();
        level.set(pressed);
        if pressed && !edges.on_edge(gpio, Instant::now().as_millis()) {
            warn!(
                "edge queue full, dropped edge on gpio {} ({} total)",
                gpio,
                edges.dropped()
            );
        }
    }
}
