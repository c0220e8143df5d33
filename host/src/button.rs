//! Debounced push buttons.
//!
//! Edges are handed from interrupt context to a consumer task through a
//! bounded channel. The consumer confirms each edge by re-sampling the pin
//! after a short delay, then drops presses of the same button that repeat
//! within a longer window.
//!
//! Buttons are wired active-low with pull-ups, a press is a falling edge.
use core::cell::Cell;

use embassy_sync::{
    blocking_mutex::{raw::RawMutex, Mutex},
    channel::{Channel, Receiver, Sender},
};
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;

pub type Result<T> = core::result::Result<T, Error>;

/// Represents a button error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An edge arrived from a pin no button is mapped to.
    #[error("no button on gpio {0}")]
    InvalidButtonSource(u8),
    /// A button pin could not be sampled.
    #[error("button pin error")]
    Pin,
}

/// The thermostat buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Increase,
    Decrease,
    ModeCycle,
}

impl Button {
    const fn index(self) -> usize {
        self as usize
    }
}

/// A confirmed button press. Consumed exactly once by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEvent {
    pub button: Button,
    /// Milliseconds since boot when the edge was observed.
    pub observed_at_ms: u64,
}

/// A raw edge, as seen by the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edge {
    /// The gpio number the edge came from.
    pub pin: u8,
    /// Milliseconds since boot.
    pub at_ms: u64,
}

/// Maps gpio numbers to buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMap {
    pub increase: u8,
    pub decrease: u8,
    pub mode: u8,
}

impl PinMap {
    pub fn button(&self, pin: u8) -> Result<Button> {
        match pin {
            p if p == self.increase => Ok(Button::Increase),
            p if p == self.decrease => Ok(Button::Decrease),
            p if p == self.mode => Ok(Button::ModeCycle),
            p => Err(Error::InvalidButtonSource(p)),
        }
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            increase: 12,
            decrease: 13,
            mode: 14,
        }
    }
}

/// Debounce parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Debounce {
    /// Delay before an edge is confirmed by re-sampling its pin.
    pub confirm_ms: u32,
    /// Presses of one button closer together than this are dropped.
    pub repeat_window_ms: u32,
}

impl Default for Debounce {
    fn default() -> Self {
        Self {
            confirm_ms: 50,
            repeat_window_ms: 300,
        }
    }
}

/// The channel carrying raw edges out of interrupt context.
pub type EdgeChannel<M, const N: usize> = Channel<M, Edge, N>;

/// Confirmed presses on their way to the control task.
pub type EventChannel<M, const N: usize> = Channel<M, ButtonEvent, N>;

/// The interrupt side of an [`EdgeChannel`].
pub struct EdgeSender<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, Edge, N>,
    dropped: Mutex<M, Cell<u32>>,
}

impl<'a, M: RawMutex, const N: usize> EdgeSender<'a, M, N> {
    #[must_use]
    pub fn new(channel: &'a EdgeChannel<M, N>) -> Self {
        Self {
            sender: channel.sender(),
            dropped: Mutex::new(Cell::new(0)),
        }
    }

    /// Queues an edge from `pin`. Never blocks; returns `false` and counts the
    /// edge as dropped when the queue is full.
    pub fn on_edge(&self, pin: u8, now_ms: u64) -> bool {
        match self.sender.try_send(Edge { pin, at_ms: now_ms }) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.lock(|dropped| dropped.set(dropped.get() + 1));
                false
            }
        }
    }

    /// Edges lost to a full queue.
    pub fn dropped(&self) -> u32 {
        self.dropped.lock(Cell::get)
    }
}

/// Drops presses of a button that follow its last accepted press too
/// closely.
#[derive(Debug, Clone)]
pub struct RepeatFilter {
    window_ms: u64,
    last_accepted_ms: [Option<u64>; 3],
}

impl RepeatFilter {
    #[must_use]
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            last_accepted_ms: [None; 3],
        }
    }

    /// Returns whether a press of `button` at `at_ms` falls inside the window
    /// of its last accepted press.
    #[must_use]
    pub fn blocks(&self, button: Button, at_ms: u64) -> bool {
        self.last_accepted_ms[button.index()]
            .is_some_and(|last_ms| at_ms.saturating_sub(last_ms) < self.window_ms)
    }

    /// Opens a new window for `button` at `at_ms`.
    pub fn record(&mut self, button: Button, at_ms: u64) {
        self.last_accepted_ms[button.index()] = Some(at_ms);
    }

    /// Returns whether a press of `button` at `at_ms` is accepted, recording
    /// it if so.
    pub fn accept(&mut self, button: Button, at_ms: u64) -> bool {
        if self.blocks(button, at_ms) {
            return false;
        }
        self.record(button, at_ms);
        true
    }
}

/// The pins the buttons are read from.
pub struct ButtonPins<P> {
    pub increase: P,
    pub decrease: P,
    pub mode: P,
}

impl<P: InputPin> ButtonPins<P> {
    fn is_pressed(&mut self, button: Button) -> Result<bool> {
        let pin = match button {
            Button::Increase => &mut self.increase,
            Button::Decrease => &mut self.decrease,
            Button::ModeCycle => &mut self.mode,
        };
        pin.is_low().map_err(|_| Error::Pin)
    }
}

/// The consumer side of an [`EdgeChannel`], turning raw edges into
/// [`ButtonEvent`]s.
pub struct Debouncer<'a, M: RawMutex, P, D, const N: usize> {
    edges: Receiver<'a, M, Edge, N>,
    pins: ButtonPins<P>,
    map: PinMap,
    delay: D,
    confirm_ms: u32,
    repeats: RepeatFilter,
}

impl<'a, M, P, D, const N: usize> Debouncer<'a, M, P, D, N>
where
    M: RawMutex,
    P: InputPin,
    D: DelayNs,
{
    pub fn new(
        channel: &'a EdgeChannel<M, N>,
        pins: ButtonPins<P>,
        map: PinMap,
        debounce: Debounce,
        delay: D,
    ) -> Self {
        Self {
            edges: channel.receiver(),
            pins,
            map,
            delay,
            confirm_ms: debounce.confirm_ms,
            repeats: RepeatFilter::new(debounce.repeat_window_ms),
        }
    }

    /// Waits for the next confirmed press.
    pub async fn next_event(&mut self) -> ButtonEvent {
        loop {
            let edge = self.edges.receive().await;
            if let Some(event) = self.confirm(edge).await {
                return event;
            }
        }
    }

    /// Processes queued edges until one is confirmed, without waiting for new
    /// edges. Returns `None` once the queue is empty.
    pub async fn poll_event(&mut self) -> Option<ButtonEvent> {
        while let Ok(edge) = self.edges.try_receive() {
            if let Some(event) = self.confirm(edge).await {
                return Some(event);
            }
        }
        None
    }

    /// Forwards every confirmed press to the control task, forever.
    pub async fn run<const E: usize>(mut self, events: Sender<'_, M, ButtonEvent, E>) -> ! {
        loop {
            let event = self.next_event().await;
            events.send(event).await;
        }
    }

    async fn confirm(&mut self, edge: Edge) -> Option<ButtonEvent> {
        let button = match self.map.button(edge.pin) {
            Ok(button) => button,
            Err(e) => {
                warn!("discarding edge: {}", e);
                return None;
            }
        };

        // Bounces of an accepted press need no confirmation.
        if self.repeats.blocks(button, edge.at_ms) {
            debug!("{:?} repeated within window, ignoring", button);
            return None;
        }

        self.delay.delay_ms(self.confirm_ms).await;
        match self.pins.is_pressed(button) {
            Ok(true) => {}
            Ok(false) => {
                debug!("{:?} released before confirmation, ignoring", button);
                return None;
            }
            Err(e) => {
                warn!("discarding edge: {}", e);
                return None;
            }
        }

        self.repeats.record(button, edge.at_ms);
        debug!("{:?} pressed", button);
        Some(ButtonEvent {
            button,
            observed_at_ms: edge.at_ms,
        })
    }
}
