//! Cooling and heating outputs.
use embedded_hal::digital::{self, ErrorKind, OutputPin, PinState};

use crate::control::ActuatorCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    #[error("output pin error")]
    Pin(E),
}

impl<E: digital::Error> Error<E> {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Pin(e) => e.kind(),
        }
    }
}

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// The two actuator outputs. Outputs are active high.
pub struct Actuators<C, H> {
    cooling: C,
    heating: H,
    state: ActuatorCommand,
}

impl<C, H, E> Actuators<C, H>
where
    C: OutputPin<Error = E>,
    H: OutputPin<Error = E>,
{
    /// Takes both outputs and drives them off.
    pub fn new(cooling: C, heating: H) -> Result<Self, E> {
        let mut actuators = Self {
            cooling,
            heating,
            state: ActuatorCommand::default(),
        };
        actuators.cooling.set_low().map_err(Error::Pin)?;
        actuators.heating.set_low().map_err(Error::Pin)?;
        Ok(actuators)
    }

    #[must_use]
    pub fn state(&self) -> ActuatorCommand {
        self.state
    }

    /// Drives the outputs to `command`.
    ///
    /// Outputs switching off are released before outputs switching on, so both
    /// are never energised together even if `command` swaps them.
    pub fn apply(&mut self, command: ActuatorCommand) -> Result<(), E> {
        if command.cooling && command.heating {
            // Unreachable through `Thermostat`; refuse rather than energise both.
            self.cooling.set_low().map_err(Error::Pin)?;
            self.heating.set_low().map_err(Error::Pin)?;
            self.state = ActuatorCommand::default();
            return Ok(());
        }

        if !command.cooling {
            self.cooling.set_low().map_err(Error::Pin)?;
        }
        if !command.heating {
            self.heating.set_low().map_err(Error::Pin)?;
        }
        if command.cooling {
            self.cooling
                .set_state(PinState::High)
                .map_err(Error::Pin)?;
        }
        if command.heating {
            self.heating
                .set_state(PinState::High)
                .map_err(Error::Pin)?;
        }

        if command != self.state {
            info!(
                "cooling: {}, heating: {}",
                command.cooling, command.heating
            );
        }
        self.state = command;
        Ok(())
    }
}
