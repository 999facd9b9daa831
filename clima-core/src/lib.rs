//! Core library for the `clima` weather lookup.
//!
//! This crate defines:
//! - The weather record, queries and display units
//! - Location sources and the city prompt contract
//! - The OpenWeather provider
//! - The controller that ties them together
//!
//! It is used by `clima-cli`, but can also be driven by any other front end
//! that can post [`Event`]s.

pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod model;
pub mod prompt;
pub mod provider;

pub use config::Config;
pub use controller::{Event, EventReceiver, EventSender, Outcome, RequestId, WeatherController};
pub use error::FetchError;
pub use location::{FixedLocation, LocationEvent, LocationFix, LocationSource};
pub use model::{DisplayUnits, Observation, Query, WeatherRecord, WeatherView, derive_icon};
pub use prompt::CityPrompt;
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
