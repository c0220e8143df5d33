//! Simulated hardware used by the unit tests.
use core::{
    cell::{Cell, RefCell},
    convert::Infallible,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};

use crate::clock::Clock;

/// High time of a `0` bit.
pub const ZERO_HIGH_US: u32 = 26;
/// High time of a `1` bit.
pub const ONE_HIGH_US: u32 = 70;

/// The levels a simulated sensor drives once the host releases the line.
///
/// Each segment is `(is_high, duration_us)`. Past the last segment the line
/// idles high on the pull-up.
#[derive(Debug, Clone, Default)]
pub struct Waveform {
    segments: Vec<(bool, u32)>,
}

impl Waveform {
    /// A line nobody answers on.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: &[(bool, u32)]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    /// A well-formed DHT transmission of `bytes`.
    pub fn dht(bytes: [u8; 5]) -> Self {
        let mut waveform = Self::dht_bits(bytes, 40);
        waveform.segments.push((false, 50));
        waveform
    }

    /// A DHT transmission that stops after `bits` bits and holds the line low.
    pub fn dht_truncated(bytes: [u8; 5], bits: usize) -> Self {
        let mut waveform = Self::dht_bits(bytes, bits);
        waveform.segments.push((false, 1_000_000));
        waveform
    }

    fn dht_bits(bytes: [u8; 5], bits: usize) -> Self {
        // Pull-up delay, then the 80μs low/high acknowledgement.
        let mut segments = vec![(true, 30), (false, 80), (true, 80)];
        for i in 0..bits {
            let bit = bytes[i / 8] & (0x80 >> (i % 8)) != 0;
            segments.push((false, 50));
            segments.push((true, if bit { ONE_HIGH_US } else { ZERO_HIGH_US }));
        }
        Self { segments }
    }

    fn level_at(&self, offset_us: u64) -> bool {
        let mut end = 0u64;
        for &(level, duration) in &self.segments {
            end += u64::from(duration);
            if offset_us < end {
                return level;
            }
        }
        true
    }
}

/// A simulated open-drain line with a sensor attached and a shared virtual
/// microsecond clock. Time only moves when something delays.
pub struct SimLine {
    now_us: Cell<u64>,
    low_since: Cell<Option<u64>>,
    released_at: Cell<Option<u64>>,
    low_pulses: RefCell<Vec<u32>>,
    waveform: Waveform,
}

impl SimLine {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            now_us: Cell::new(0),
            low_since: Cell::new(None),
            released_at: Cell::new(None),
            low_pulses: RefCell::new(Vec::new()),
            waveform,
        }
    }

    pub fn pin(&self) -> SimPin<'_> {
        SimPin(self)
    }

    pub fn delay(&self) -> SimDelay<'_> {
        SimDelay(self)
    }

    pub fn clock(&self) -> SimClock<'_> {
        SimClock(self)
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    /// Durations of every low pulse the host drove.
    pub fn low_pulses(&self) -> Vec<u32> {
        self.low_pulses.borrow().clone()
    }

    pub fn is_released(&self) -> bool {
        self.low_since.get().is_none() && self.released_at.get().is_some()
    }

    fn advance(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    fn is_high(&self) -> bool {
        if self.low_since.get().is_some() {
            return false;
        }
        match self.released_at.get() {
            Some(at) => self.waveform.level_at(self.now_us.get() - at),
            None => true,
        }
    }
}

pub struct SimPin<'a>(&'a SimLine);

impl ErrorType for SimPin<'_> {
    type Error = Infallible;
}

impl InputPin for SimPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.is_high())
    }
}

impl OutputPin for SimPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.0.low_since.get().is_none() {
            self.0.low_since.set(Some(self.0.now_us.get()));
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let now = self.0.now_us.get();
        if let Some(since) = self.0.low_since.take() {
            #[allow(clippy::cast_possible_truncation)]
            self.0.low_pulses.borrow_mut().push((now - since) as u32);
        }
        self.0.released_at.set(Some(now));
        Ok(())
    }
}

pub struct SimDelay<'a>(&'a SimLine);

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(u64::from(ns.div_ceil(1_000)));
    }

    fn delay_us(&mut self, us: u32) {
        self.0.advance(u64::from(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.advance(u64::from(ms) * 1_000);
    }
}

pub struct SimClock<'a>(&'a SimLine);

impl Clock for SimClock<'_> {
    fn now_us(&self) -> u64 {
        self.0.now_us.get()
    }
}

/// A line stuck at one level whose clock never advances.
pub struct FrozenLine {
    level: bool,
    polls: Cell<u32>,
}

impl FrozenLine {
    pub fn new(level: bool) -> Self {
        Self {
            level,
            polls: Cell::new(0),
        }
    }

    pub fn pin(&self) -> FrozenPin<'_> {
        FrozenPin(self)
    }

    pub fn delay(&self) -> FrozenDelay<'_> {
        FrozenDelay(self)
    }

    pub fn clock(&self) -> FrozenClock {
        FrozenClock
    }

    pub fn polls(&self) -> u32 {
        self.polls.get()
    }
}

pub struct FrozenPin<'a>(&'a FrozenLine);

impl ErrorType for FrozenPin<'_> {
    type Error = Infallible;
}

impl InputPin for FrozenPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.level)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.level)
    }
}

impl OutputPin for FrozenPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct FrozenDelay<'a>(&'a FrozenLine);

impl DelayNs for FrozenDelay<'_> {
    fn delay_ns(&mut self, _ns: u32) {
        self.0.polls.set(self.0.polls.get() + 1);
    }
}

pub struct FrozenClock;

impl Clock for FrozenClock {
    fn now_us(&self) -> u64 {
        0
    }
}

/// An output pin recording every level it is set to.
#[derive(Default)]
pub struct RecordingPin<'a> {
    pub history: Option<&'a RefCell<Vec<(&'static str, bool)>>>,
    pub name: &'static str,
    pub is_high: bool,
}

impl<'a> RecordingPin<'a> {
    pub fn new(name: &'static str, history: &'a RefCell<Vec<(&'static str, bool)>>) -> Self {
        Self {
            history: Some(history),
            name,
            is_high: false,
        }
    }

    fn record(&mut self, level: bool) {
        self.is_high = level;
        if let Some(history) = self.history {
            history.borrow_mut().push((self.name, level));
        }
    }
}

impl ErrorType for RecordingPin<'_> {
    type Error = Infallible;
}

impl OutputPin for RecordingPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true);
        Ok(())
    }
}

/// An input pin whose level is set by the test.
pub struct LevelPin<'a>(pub &'a Cell<bool>);

impl ErrorType for LevelPin<'_> {
    type Error = Infallible;
}

impl InputPin for LevelPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

/// An async delay that returns at once, recording how long it was asked to
/// wait.
#[derive(Default)]
pub struct InstantDelay {
    pub requested_ms: Vec<u32>,
}

impl embedded_hal_async::delay::DelayNs for InstantDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.requested_ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.requested_ms.push(us / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.requested_ms.push(ms);
    }
}
