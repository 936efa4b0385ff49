use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::models::{Bucket, NewSensorReading, SensorReading};

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Request body for `POST /sensor-data`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SensorDataRequest {
    /// When the device took the reading (RFC3339).
    pub timestamp: DateTime<Utc>,
    #[validate(length(min = 1, max = 128, message = "device_id must be 1-128 characters"))]
    pub device_id: String,
    #[validate(length(min = 1, max = 128, message = "sensor_type must be 1-128 characters"))]
    pub sensor_type: String,
    #[validate(length(min = 1, max = 128, message = "user_id must be 1-128 characters"))]
    pub user_id: String,
    /// Opaque payload stored as-is.
    #[schema(value_type = Option<Object>)]
    pub additional_info: Option<serde_json::Value>,
    #[serde(rename = "accelX", alias = "accelx")]
    #[validate(range(min = -200.0, max = 200.0, message = "accelX must be between -200 and 200"))]
    pub accel_x: Option<f64>,
    #[serde(rename = "accelY", alias = "accely")]
    #[validate(range(min = -200.0, max = 200.0, message = "accelY must be between -200 and 200"))]
    pub accel_y: Option<f64>,
    #[serde(rename = "accelZ", alias = "accelz")]
    #[validate(range(min = -200.0, max = 200.0, message = "accelZ must be between -200 and 200"))]
    pub accel_z: Option<f64>,
    /// Steps since the previous reading.
    #[validate(range(min = 0, max = 100_000, message = "steps must be between 0 and 100000"))]
    pub steps: Option<i64>,
    /// Beats per minute.
    #[validate(range(min = 0.0, max = 300.0, message = "heartrate must be between 0 and 300"))]
    pub heartrate: Option<f64>,
    /// Blood oxygen saturation, percent.
    #[validate(range(min = 0.0, max = 100.0, message = "spo2 must be between 0 and 100"))]
    pub spo2: Option<f64>,
    /// Degrees Celsius.
    #[validate(range(min = 25.0, max = 45.0, message = "bodytemp must be between 25 and 45"))]
    pub bodytemp: Option<f64>,
}

impl From<SensorDataRequest> for NewSensorReading {
    fn from(r: SensorDataRequest) -> Self {
        Self {
            timestamp: r.timestamp,
            device_id: r.device_id,
            sensor_type: r.sensor_type,
            user_id: r.user_id,
            additional_info: r.additional_info,
            accel_x: r.accel_x,
            accel_y: r.accel_y,
            accel_z: r.accel_z,
            steps: r.steps,
            heartrate: r.heartrate,
            spo2: r.spo2,
            bodytemp: r.bodytemp,
        }
    }
}

/// A stored reading, as returned by `POST /sensor-data`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub sensor_type: String,
    pub user_id: String,
    #[schema(value_type = Option<Object>)]
    pub additional_info: Option<serde_json::Value>,
    #[serde(rename = "accelX")]
    pub accel_x: Option<f64>,
    #[serde(rename = "accelY")]
    pub accel_y: Option<f64>,
    #[serde(rename = "accelZ")]
    pub accel_z: Option<f64>,
    pub steps: Option<i64>,
    pub heartrate: Option<f64>,
    pub spo2: Option<f64>,
    pub bodytemp: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl From<SensorReading> for SensorReadingDto {
    fn from(r: SensorReading) -> Self {
        Self {
            id: r.id,
            timestamp: r.timestamp,
            device_id: r.device_id,
            sensor_type: r.sensor_type,
            user_id: r.user_id,
            additional_info: r.additional_info,
            accel_x: r.accel_x,
            accel_y: r.accel_y,
            accel_z: r.accel_z,
            steps: r.steps,
            heartrate: r.heartrate,
            spo2: r.spo2,
            bodytemp: r.bodytemp,
            received_at: r.received_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Point-in-time values
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LatestHeartRateDto {
    /// `null` when no reading carries a heart rate.
    pub heartrate: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LatestTemperatureDto {
    /// `null` when no reading carries a body temperature.
    pub bodytemp: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TodayStepsDto {
    pub totalsteps: i64,
}

// ---------------------------------------------------------------------------
// Rollups
//
// Bucket starts are rendered in the reporting offset. Aggregates are `null`
// when no reading in the bucket carried the value.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HourlyBucketDto {
    #[schema(value_type = String, format = DateTime)]
    pub hour: DateTime<FixedOffset>,
    pub avgheartrate: Option<f64>,
    pub avgtemp: Option<f64>,
    pub totalsteps: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyBucketDto {
    #[schema(value_type = String, format = DateTime)]
    pub day: DateTime<FixedOffset>,
    pub avgheartrate: Option<f64>,
    pub avgtemp: Option<f64>,
    pub totalsteps: Option<i64>,
}

impl HourlyBucketDto {
    pub fn new(b: Bucket, offset: FixedOffset) -> Self {
        Self {
            hour: b.start.with_timezone(&offset),
            avgheartrate: b.avg_heartrate,
            avgtemp: b.avg_bodytemp,
            totalsteps: b.total_steps,
        }
    }
}

impl DailyBucketDto {
    pub fn new(b: Bucket, offset: FixedOffset) -> Self {
        Self {
            day: b.start.with_timezone(&offset),
            avgheartrate: b.avg_heartrate,
            avgtemp: b.avg_bodytemp,
            totalsteps: b.total_steps,
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecommendationDto {
    pub recommendation: String,
}
