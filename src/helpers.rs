//! Aggregation helpers for sensor readings.

use crate::models::SensorReading;

/// Round to `decimals` places with ties going to the even neighbour
/// (matching how the vendor's own dashboards aggregate sample windows).
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let scaled = value * scale;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    };
    rounded / scale
}

/// Collapse a batch of readings from one device into a single reading:
/// every metric is the batch mean rounded to one decimal, the timestamp is
/// the latest in the batch. Returns `None` for an empty batch.
pub fn average_readings(readings: &[SensorReading]) -> Option<SensorReading> {
    let first = readings.first()?;
    let n = readings.len() as f64;
    let avg = |field: fn(&SensorReading) -> f64| {
        round_half_even(readings.iter().map(field).sum::<f64>() / n, 1)
    };
    Some(SensorReading {
        serial_number: first.serial_number.clone(),
        virus_index: avg(|r| r.virus_index),
        mold_index: avg(|r| r.mold_index),
        temperature: avg(|r| r.temperature),
        humidity: avg(|r| r.humidity),
        pm25: avg(|r| r.pm25),
        tvoc: avg(|r| r.tvoc),
        co2: avg(|r| r.co2),
        co: avg(|r| r.co),
        air_pressure: avg(|r| r.air_pressure),
        ozone: avg(|r| r.ozone),
        no2: avg(|r| r.no2),
        pm1: avg(|r| r.pm1),
        pm4: avg(|r| r.pm4),
        pm10: avg(|r| r.pm10),
        ch2o: avg(|r| r.ch2o),
        light: avg(|r| r.light),
        sound: avg(|r| r.sound),
        h2s: avg(|r| r.h2s),
        no: avg(|r| r.no),
        so2: avg(|r| r.so2),
        nh3: avg(|r| r.nh3),
        oxygen: avg(|r| r.oxygen),
        timestamp: readings.iter().map(|r| r.timestamp).max().unwrap_or(-1),
    })
}
