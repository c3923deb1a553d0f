//! uHoo API client library.
//!
//! Provides a typed async client for the uHoo indoor air quality REST API:
//! authentication, device listing, and latest/historical sensor readings.

pub mod client;
pub mod error;
pub mod helpers;
pub mod models;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use models::{Device, SampleMode, SensorReading, Session};

/// Library version for User-Agent and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
