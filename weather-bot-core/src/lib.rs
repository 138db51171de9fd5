//! Core library for the weather bot.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Per-user coordinate storage
//! - The Gismeteo provider client
//! - Normalization and rendering of forecasts
//! - `ForecastService`, which ties the above together
//!
//! It is used by the `weather-bot` binary, but any chat transport can drive
//! `ForecastService` directly.

pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod render;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{FetchError, ForecastError, RenderError, StoreError};
pub use model::{
    CoordinateRecord, Coordinates, ForecastKind, ForecastRow, Payload, WeatherRequest,
};
pub use provider::{WeatherProvider, gismeteo::GismeteoProvider, provider_from_config};
pub use service::ForecastService;
pub use store::{CoordinateStore, SqliteCoordinateStore};
