//! # surplusd - PV surplus charging for go-eCharger wallboxes
//!
//! Listens to household power telemetry over MQTT (home battery state of
//! charge, two PV strings, the house meter and the charger's own energy
//! record) and steers a go-eCharger so the car charges from solar surplus.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading and validation
//! - `logging`: Structured logging and tracing
//! - `topics`: Topic names, resolved once from configuration
//! - `telemetry`: Best-effort payload decoding
//! - `state`: Latest readings and decision bookkeeping
//! - `surplus`: EMA surplus estimation
//! - `controls`: Hysteresis and dead-time decision engine
//! - `charger`: Charger command translation and publishing
//! - `mqtt`: Broker connection and event loop
//! - `driver`: Single-owner message processing loop

pub mod charger;
pub mod config;
pub mod controls;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mqtt;
pub mod state;
pub mod surplus;
pub mod telemetry;
pub mod topics;

// Re-export commonly used types
pub use config::Config;
pub use driver::EnergyDriver;
pub use error::{Result, SurplusError};
