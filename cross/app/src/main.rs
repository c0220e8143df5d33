#![no_std]
#![no_main]
#![warn(clippy::suspicious, clippy::complexity, clippy::perf, clippy::pedantic)]

mod buttons;

use core::convert::Infallible;

use airzone::{
    acquisition::Acquisition,
    actuator::{self, Actuators},
    button::{ButtonPins, Debouncer, EdgeChannel, EdgeSender, EventChannel},
    control,
    display::{self, Display, LogDisplay, Snapshot},
    Config, Dht, Shared, Thermostat,
};
use board::{Board, Uptime, PIN_MAP};
use cortex_m_rt::entry;
use defmt::{info, unwrap};
use embassy_executor::{Executor, InterruptExecutor};
use embassy_rp::{
    gpio::{Level, Output},
    interrupt,
    interrupt::{InterruptExt, Priority},
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Delay, Duration};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::buttons::{edge_task, ButtonLevel, LevelReader};

pub(crate) type RawMutex = CriticalSectionRawMutex;
pub(crate) const EDGE_QUEUE: usize = 8;
const EVENT_QUEUE: usize = 4;

static EDGES: EdgeChannel<RawMutex, EDGE_QUEUE> = Channel::new();
static EVENTS: EventChannel<RawMutex, EVENT_QUEUE> = Channel::new();
static LEVELS: [ButtonLevel; 3] = [ButtonLevel::new(), ButtonLevel::new(), ButtonLevel::new()];
static EDGE_SENDER: StaticCell<EdgeSender<'static, RawMutex, EDGE_QUEUE>> = StaticCell::new();
static SHARED: StaticCell<Shared<RawMutex>> = StaticCell::new();

/// Runs buttons and control, preempting the blocking sensor reads.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
/// Runs acquisition and the display.
static EXECUTOR_LOW: StaticCell<Executor> = StaticCell::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt();
}

#[entry]
fn main() -> ! {
    let config = unwrap!(Config::builder().buttons(PIN_MAP).build());
    let board = Board::new();
    info!("sensor: {}, control: {}", config.sensor, config.control.modes);

    let thermostat = Thermostat::new(config.control);
    let shared: &'static Shared<RawMutex> = SHARED.init(Shared::new(thermostat.state()));
    let edges: &'static EdgeSender<'static, RawMutex, EDGE_QUEUE> =
        EDGE_SENDER.init(EdgeSender::new(&EDGES));

    let sensor = Dht::new(config.sensor, config.timing, board.line, Delay, Uptime);
    let actuators = match Actuators::new(board.cooling, board.heating) {
        Ok(actuators) => actuators,
        Err(actuator::Error::Pin(never)) => match never {},
    };
    let debouncer = Debouncer::new(
        &EDGES,
        ButtonPins {
            increase: LEVELS[0].reader(),
            decrease: LEVELS[1].reader(),
            mode: LEVELS[2].reader(),
        },
        config.buttons,
        config.debounce,
        Delay,
    );

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    unwrap!(spawner.spawn(edge_task(board.increase, PIN_MAP.increase, &LEVELS[0], edges)));
    unwrap!(spawner.spawn(edge_task(board.decrease, PIN_MAP.decrease, &LEVELS[1], edges)));
    unwrap!(spawner.spawn(edge_task(board.mode, PIN_MAP.mode, &LEVELS[2], edges)));
    unwrap!(spawner.spawn(button_task(debouncer)));
    unwrap!(spawner.spawn(control_task(
        thermostat,
        shared,
        actuators,
        config.control_period()
    )));

    let acquisition = Acquisition::new(sensor, shared);
    let panel = Panel {
        log: LogDisplay,
        led: board.led,
    };
    let executor = EXECUTOR_LOW.init(Executor::new());
    executor.run(|spawner| {
        unwrap!(spawner.spawn(acquisition_task(acquisition, config.sample_period())));
        unwrap!(spawner.spawn(display_task(panel, shared, config.display_period())));
        info!("tasks spawned!");
    })
}

#[embassy_executor::task]
async fn acquisition_task(
    acquisition: Acquisition<'static, RawMutex, board::Sensor>,
    period: Duration,
) {
    acquisition.run(period).await
}

#[embassy_executor::task]
async fn button_task(debouncer: Debouncer<'static, RawMutex, LevelReader, Delay, EDGE_QUEUE>) {
    debouncer.run(EVENTS.sender()).await
}

#[embassy_executor::task]
async fn control_task(
    thermostat: Thermostat,
    shared: &'static Shared<RawMutex>,
    actuators: Actuators<Output<'static>, Output<'static>>,
    period: Duration,
) {
    control::run(thermostat, EVENTS.receiver(), shared, actuators, period).await
}

#[embassy_executor::task]
async fn display_task(panel: Panel, shared: &'static Shared<RawMutex>, period: Duration) {
    display::run(panel, shared, period).await
}

/// Logs each snapshot and lights the LED while the sensor answers.
struct Panel {
    log: LogDisplay,
    led: Output<'static>,
}

impl Display for Panel {
    type Error = Infallible;

    fn show(&mut self, snapshot: &Snapshot) -> Result<(), Infallible> {
        self.led.set_level(if snapshot.sensor.is_valid() {
            Level::High
        } else {
            Level::Low
        });
        self.log.show(snapshot)
    }
}
