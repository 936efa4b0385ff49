use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Floating-point vitals that support "latest" and "average" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vital {
    HeartRate,
    BodyTemp,
}

impl Vital {
    /// Column holding this vital in `sensor_data`.
    pub fn column(self) -> &'static str {
        match self {
            Vital::HeartRate => "heartrate",
            Vital::BodyTemp => "bodytemp",
        }
    }

    pub fn of(self, reading: &SensorReading) -> Option<f64> {
        match self {
            Vital::HeartRate => reading.heartrate,
            Vital::BodyTemp => reading.bodytemp,
        }
    }
}

impl fmt::Display for Vital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One row of `sensor_data`. Rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub sensor_type: String,
    pub user_id: String,
    pub additional_info: Option<serde_json::Value>,
    #[sqlx(rename = "accelx")]
    pub accel_x: Option<f64>,
    #[sqlx(rename = "accely")]
    pub accel_y: Option<f64>,
    #[sqlx(rename = "accelz")]
    pub accel_z: Option<f64>,
    pub steps: Option<i64>,
    pub heartrate: Option<f64>,
    pub spo2: Option<f64>,
    pub bodytemp: Option<f64>,
    /// Server clock at insert time.
    pub received_at: DateTime<Utc>,
}

/// A validated reading ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSensorReading {
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub sensor_type: String,
    pub user_id: String,
    pub additional_info: Option<serde_json::Value>,
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub steps: Option<i64>,
    pub heartrate: Option<f64>,
    pub spo2: Option<f64>,
    pub bodytemp: Option<f64>,
}

/// Aggregates over one hour or one day. Empty buckets are never produced.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub avg_heartrate: Option<f64>,
    pub avg_bodytemp: Option<f64>,
    pub total_steps: Option<i64>,
}

/// Today's figures fed into the recommendation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DailySummary {
    pub avg_heartrate: Option<f64>,
    pub avg_bodytemp: Option<f64>,
    pub total_steps: Option<i64>,
}
