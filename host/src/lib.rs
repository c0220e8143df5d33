//! Thermostat core: DHT11/DHT22 acquisition, debounced buttons and a hysteretic
//! heating/cooling controller.
#![cfg_attr(not(test), no_std)]
#![warn(clippy::suspicious, clippy::complexity, clippy::perf, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::similar_names,
    clippy::module_name_repetitions
)]

// This module must go first so the others see its macros.
#[macro_use]
mod fmt;

pub mod acquisition;
pub mod actuator;
pub mod button;
pub mod clock;
pub mod config;
pub mod control;
pub mod decode;
pub mod dht;
pub mod display;
pub mod line;
pub mod state;

#[cfg(test)]
pub(crate) mod mock;

pub use self::{
    clock::Clock,
    config::Config,
    control::{Mode, Thermostat, ThermostatState},
    decode::dht::SensorKind,
    dht::{Dht, SensorReading},
    state::Shared,
};
