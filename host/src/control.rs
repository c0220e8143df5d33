//! Hysteretic heating/cooling control.
//!
//! [`Thermostat`] is a plain state machine: it consumes button presses and
//! sensor status and returns an [`ActuatorCommand`] only when the requested
//! outputs change. [`run`] drives it from the control task.
use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Receiver};
use embassy_time::{Duration, Ticker};
use embedded_hal::digital::OutputPin;
use uom::si::{
    f32::{TemperatureInterval, ThermodynamicTemperature},
    temperature_interval,
    thermodynamic_temperature::degree_celsius,
};

use crate::{
    actuator::Actuators,
    button::{Button, ButtonEvent},
    dht::SensorReading,
    state::{SensorStatus, Shared},
};

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    #[default]
    Off,
    Cool,
    Heat,
}

impl Mode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Mode::Off => "Off",
            Mode::Cool => "Cool",
            Mode::Heat => "Heat",
        }
    }
}

/// The modes the mode button cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeSet {
    /// Off → Cool → Heat → Off.
    #[default]
    Three,
    /// Cool ↔ Heat, never off.
    Two,
}

impl ModeSet {
    #[must_use]
    pub fn initial(self) -> Mode {
        match self {
            ModeSet::Three => Mode::Off,
            ModeSet::Two => Mode::Cool,
        }
    }

    #[must_use]
    pub fn next(self, mode: Mode) -> Mode {
        match (self, mode) {
            (ModeSet::Three, Mode::Off) | (ModeSet::Two, Mode::Heat | Mode::Off) => Mode::Cool,
            (_, Mode::Cool) => Mode::Heat,
            (ModeSet::Three, Mode::Heat) => Mode::Off,
        }
    }
}

/// Where an active output is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MarginPolicy {
    /// Engage beyond `set point ± margin`, release beyond the opposite
    /// `set point ∓ margin`. Holds in between.
    #[default]
    Symmetric,
    /// Engage beyond `set point ± margin`, release on reaching the set point.
    OneSided,
}

/// What to do while the sensor keeps failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailurePolicy {
    /// Keep the last commanded outputs until a valid reading arrives.
    #[default]
    Hold,
    /// Switch both outputs off after this many consecutive failed reads.
    ForceOffAfter(u32),
}

/// Control parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlConfig {
    pub min_temperature: ThermodynamicTemperature,
    pub max_temperature: ThermodynamicTemperature,
    pub initial_set_point: ThermodynamicTemperature,
    /// Set point change per button press.
    pub step: TemperatureInterval,
    /// Half-width of the dead band.
    pub margin: TemperatureInterval,
    pub margin_policy: MarginPolicy,
    pub modes: ModeSet,
    pub failure_policy: FailurePolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_temperature: celsius(16.0),
            max_temperature: celsius(30.0),
            initial_set_point: celsius(22.0),
            step: TemperatureInterval::new::<temperature_interval::degree_celsius>(0.5),
            margin: TemperatureInterval::new::<temperature_interval::degree_celsius>(0.5),
            margin_policy: MarginPolicy::default(),
            modes: ModeSet::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Shorthand for a temperature in °C.
#[must_use]
pub fn celsius(value: f32) -> ThermodynamicTemperature {
    ThermodynamicTemperature::new::<degree_celsius>(value)
}

/// The thermostat's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatState {
    pub mode: Mode,
    pub set_point: ThermodynamicTemperature,
    pub cooling: bool,
    pub heating: bool,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ThermostatState {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ThermostatState {{ mode: {}, set_point: {}°C, cooling: {}, heating: {} }}",
            self.mode,
            self.set_point.get::<degree_celsius>(),
            self.cooling,
            self.heating,
        );
    }
}

impl Default for ThermostatState {
    fn default() -> Self {
        let config = ControlConfig::default();
        Self {
            mode: config.modes.initial(),
            set_point: config.initial_set_point,
            cooling: false,
            heating: false,
        }
    }
}

/// Requested actuator outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorCommand {
    pub cooling: bool,
    pub heating: bool,
}

impl From<ThermostatState> for ActuatorCommand {
    fn from(state: ThermostatState) -> Self {
        Self {
            cooling: state.cooling,
            heating: state.heating,
        }
    }
}

/// Represents the thermostat control state machine.
#[derive(Debug, Clone)]
pub struct Thermostat {
    config: ControlConfig,
    state: ThermostatState,
    /// Last valid temperature, in °C.
    last_temperature: Option<f32>,
    /// Set while the failure policy holds the outputs off.
    failed_safe: bool,
}

impl Thermostat {
    #[must_use]
    pub fn new(config: ControlConfig) -> Self {
        Self {
            state: ThermostatState {
                mode: config.modes.initial(),
                set_point: config.initial_set_point,
                cooling: false,
                heating: false,
            },
            config,
            last_temperature: None,
            failed_safe: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ThermostatState {
        self.state
    }

    /// Applies a button press.
    pub fn handle_button(&mut self, event: ButtonEvent) -> Option<ActuatorCommand> {
        let step = self.config.step;
        match event.button {
            Button::Increase => {
                let raised = self.state.set_point + step;
                self.state.set_point = if raised > self.config.max_temperature {
                    self.config.max_temperature
                } else {
                    raised
                };
            }
            Button::Decrease => {
                let lowered = self.state.set_point - step;
                self.state.set_point = if lowered < self.config.min_temperature {
                    self.config.min_temperature
                } else {
                    lowered
                };
            }
            Button::ModeCycle => {
                self.state.mode = self.config.modes.next(self.state.mode);
            }
        }
        info!(
            "mode: {:?}, set point: {}°C",
            self.state.mode,
            self.state.set_point.get::<degree_celsius>()
        );

        match self.last_temperature {
            Some(temperature) if !self.failed_safe => self.evaluate(temperature),
            // Without a usable temperature only the mode constrains the outputs.
            _ => self.commit(
                self.state.cooling && self.state.mode == Mode::Cool,
                self.state.heating && self.state.mode == Mode::Heat,
            ),
        }
    }

    /// Applies a valid reading.
    pub fn handle_reading(&mut self, reading: &SensorReading) -> Option<ActuatorCommand> {
        let temperature = reading.celsius();
        self.last_temperature = Some(temperature);
        self.failed_safe = false;
        self.evaluate(temperature)
    }

    /// Applies a failed read, `consecutive` being the length of the current run
    /// of failures.
    pub fn handle_fault(&mut self, consecutive: u32) -> Option<ActuatorCommand> {
        match self.config.failure_policy {
            FailurePolicy::ForceOffAfter(limit) if consecutive >= limit => {
                if !self.failed_safe {
                    warn!("{} consecutive sensor failures, forcing outputs off", consecutive);
                }
                self.failed_safe = true;
                self.commit(false, false)
            }
            _ => None,
        }
    }

    /// Applies the latest published sensor status.
    pub fn observe(&mut self, status: &SensorStatus) -> Option<ActuatorCommand> {
        if status.consecutive_failures > 0 {
            return self.handle_fault(status.consecutive_failures);
        }
        status
            .reading
            .and_then(|reading| self.handle_reading(&reading))
    }

    /// Recomputes the outputs for `temperature` (°C).
    fn evaluate(&mut self, temperature: f32) -> Option<ActuatorCommand> {
        let set_point = self.state.set_point.get::<degree_celsius>();
        let margin = self
            .config
            .margin
            .get::<temperature_interval::degree_celsius>();

        let (cooling, heating) = match self.state.mode {
            Mode::Off => (false, false),
            Mode::Cool => {
                let release = match self.config.margin_policy {
                    MarginPolicy::Symmetric => set_point - margin,
                    MarginPolicy::OneSided => set_point,
                };
                let cooling = if temperature > set_point + margin {
                    true
                } else if temperature <= release {
                    false
                } else {
                    self.state.cooling
                };
                (cooling, false)
            }
            Mode::Heat => {
                let release = match self.config.margin_policy {
                    MarginPolicy::Symmetric => set_point + margin,
                    MarginPolicy::OneSided => set_point,
                };
                let heating = if temperature < set_point - margin {
                    true
                } else if temperature >= release {
                    false
                } else {
                    self.state.heating
                };
                (false, heating)
            }
        };

        self.commit(cooling, heating)
    }

    /// Records the outputs, returning a command only if they changed.
    fn commit(&mut self, cooling: bool, heating: bool) -> Option<ActuatorCommand> {
        if cooling == self.state.cooling && heating == self.state.heating {
            return None;
        }
        self.state.cooling = cooling;
        self.state.heating = heating;
        Some(ActuatorCommand { cooling, heating })
    }
}

impl Default for Thermostat {
    fn default() -> Self {
        Self::new(ControlConfig::default())
    }
}

/// Runs the control task.
///
/// Button presses are applied as they arrive. Every `period` the queue is
/// drained and the latest sensor status evaluated, so a press accepted before
/// an evaluation is always applied before it.
pub async fn run<M, C, H, const N: usize>(
    mut thermostat: Thermostat,
    events: Receiver<'_, M, ButtonEvent, N>,
    shared: &Shared<M>,
    mut actuators: Actuators<C, H>,
    period: Duration,
) -> !
where
    M: RawMutex,
    C: OutputPin,
    H: OutputPin<Error = C::Error>,
{
    let mut ticker = Ticker::every(period);
    shared.publish_thermostat(thermostat.state());

    loop {
        let command = match select(events.receive(), ticker.next()).await {
            Either::First(event) => thermostat.handle_button(event),
            Either::Second(()) => {
                let mut command = None;
                while let Ok(event) = events.try_receive() {
                    command = thermostat.handle_button(event).or(command);
                }
                thermostat.observe(&shared.sensor()).or(command)
            }
        };

        // The pins lag the thermostat after a failed write.
        let wanted = command.unwrap_or_else(|| thermostat.state().into());
        if actuators.state() != wanted {
            if let Err(e) = actuators.apply(wanted) {
                warn!("failed to drive actuators to {:?}: {:?}", wanted, e.kind());
            }
        }
        shared.publish_thermostat(thermostat.state());
    }
}
