//! Typed value records for the uHoo API.
//!
//! All response models are read-only snapshots: the vendor payloads are
//! deserialized once and never mutated. Unknown fields are ignored and
//! missing fields fall back to defaults, so additive vendor schema changes
//! do not break deserialization.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sampling granularity for `getdata` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleMode {
    #[default]
    Minute,
    Hour,
}

impl SampleMode {
    /// Wire value of the `mode` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            SampleMode::Minute => "minute",
            SampleMode::Hour => "hour",
        }
    }

    /// Width of one sample bucket in seconds.
    pub fn bucket_secs(self) -> i64 {
        match self {
            SampleMode::Minute => 60,
            SampleMode::Hour => 3600,
        }
    }
}

/// Short-lived authorization artifact returned by `generatetoken`.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds, when the vendor reports one.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Client-side clock reading taken when the token was received.
    #[serde(skip, default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Instant after which the token is no longer usable, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|secs| self.issued_at + chrono::Duration::seconds(secs))
    }

    /// Whether the token has outlived its reported lifetime. Tokens without
    /// an `expires_in` are treated as valid until the vendor rejects them.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(at) => Utc::now() >= at,
            None => false,
        }
    }
}

/// A uHoo monitor registered on the account. Read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub device_name: String,
    pub mac_address: String,
    pub serial_number: String,
    pub floor_number: i64,
    pub room_name: String,
    pub timezone: String,
    pub utc_offset: String,
    pub ssid: String,
}

/// One timestamped set of sensor measurements from a single device.
///
/// The vendor payload does not repeat the serial number per item; the client
/// fills in [`SensorReading::serial_number`] from the request it made, so
/// every reading stays attributable to exactly one device.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorReading {
    #[serde(skip_deserializing)]
    pub serial_number: String,
    pub virus_index: f64,
    pub mold_index: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pm25: f64,
    pub tvoc: f64,
    pub co2: f64,
    pub co: f64,
    pub air_pressure: f64,
    pub ozone: f64,
    pub no2: f64,
    pub pm1: f64,
    pub pm4: f64,
    pub pm10: f64,
    pub ch2o: f64,
    pub light: f64,
    pub sound: f64,
    pub h2s: f64,
    pub no: f64,
    pub so2: f64,
    pub nh3: f64,
    pub oxygen: f64,
    /// Unix timestamp (seconds). `-1` when the vendor omitted it.
    #[serde(default = "missing_timestamp")]
    pub timestamp: i64,
}

fn missing_timestamp() -> i64 {
    -1
}

impl SensorReading {
    /// Timestamp as a UTC datetime, if the reading carries one.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        if self.timestamp < 0 {
            return None;
        }
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    /// Metric name → value view over all sensor fields.
    pub fn metrics(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("virusIndex", self.virus_index),
            ("moldIndex", self.mold_index),
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("pm25", self.pm25),
            ("tvoc", self.tvoc),
            ("co2", self.co2),
            ("co", self.co),
            ("airPressure", self.air_pressure),
            ("ozone", self.ozone),
            ("no2", self.no2),
            ("pm1", self.pm1),
            ("pm4", self.pm4),
            ("pm10", self.pm10),
            ("ch2o", self.ch2o),
            ("light", self.light),
            ("sound", self.sound),
            ("h2s", self.h2s),
            ("no", self.no),
            ("so2", self.so2),
            ("nh3", self.nh3),
            ("oxygen", self.oxygen),
        ])
    }
}
