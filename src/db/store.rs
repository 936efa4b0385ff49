use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::FixedOffset;
use sqlx::PgPool;

use super::models::{Bucket, NewSensorReading, SensorReading, Vital};
use crate::time_window::{BucketSize, Window};

/// Storage operations behind every endpoint: insert one row, or run one
/// aggregate query over `sensor_data`.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Append a reading and return it with its server-assigned identity.
    async fn insert(&self, reading: NewSensorReading) -> Result<SensorReading>;

    /// Value of `vital` on the most recent reading that carries it.
    ///
    /// Equal timestamps are resolved in favour of the later insert.
    async fn latest(&self, vital: Vital) -> Result<Option<f64>>;

    /// Mean of `vital` over readings in `window`; `None` if no reading has it.
    async fn average(&self, vital: Vital, window: Window) -> Result<Option<f64>>;

    /// Sum of `steps` over readings in `window`; `None` if no reading has it.
    async fn total_steps(&self, window: Window) -> Result<Option<i64>>;

    /// Non-empty buckets in `window`, ascending by start.
    async fn buckets(
        &self,
        window: Window,
        size: BucketSize,
        offset: FixedOffset,
    ) -> Result<Vec<Bucket>>;
}

const READING_COLUMNS: &str = r#"
    id, "timestamp", device_id, sensor_type, user_id, additional_info,
    accelx, accely, accelz, steps, heartrate, spo2, bodytemp, received_at
"#;

/// `ReadingStore` backed by the `sensor_data` table.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, r: NewSensorReading) -> Result<SensorReading> {
        let sql = format!(
            r#"
            INSERT INTO sensor_data ("timestamp", device_id, sensor_type, user_id,
                                     additional_info, accelx, accely, accelz,
                                     steps, heartrate, spo2, bodytemp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {READING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SensorReading>(&sql)
            .bind(r.timestamp)
            .bind(r.device_id)
            .bind(r.sensor_type)
            .bind(r.user_id)
            .bind(r.additional_info)
            .bind(r.accel_x)
            .bind(r.accel_y)
            .bind(r.accel_z)
            .bind(r.steps)
            .bind(r.heartrate)
            .bind(r.spo2)
            .bind(r.bodytemp)
            .fetch_one(&self.pool)
            .await
            .context("failed to insert sensor reading")?;
        Ok(row)
    }

    async fn latest(&self, vital: Vital) -> Result<Option<f64>> {
        let col = vital.column();
        let sql = format!(
            r#"
            SELECT {col}
            FROM sensor_data
            ORDER BY "timestamp" DESC, received_at DESC, id DESC
            LIMIT 1
            "#
        );
        let value = sqlx::query_scalar::<_, Option<f64>>(&sql)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to query latest {vital}"))?;
        Ok(value.flatten())
    }

    async fn average(&self, vital: Vital, window: Window) -> Result<Option<f64>> {
        let col = vital.column();
        let sql = format!(
            r#"
            SELECT AVG({col})
            FROM sensor_data
            WHERE "timestamp" >= $1 AND "timestamp" < $2
            "#
        );
        let value = sqlx::query_scalar::<_, Option<f64>>(&sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to average {vital}"))?;
        Ok(value)
    }

    async fn total_steps(&self, window: Window) -> Result<Option<i64>> {
        let value = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT SUM(steps)::BIGINT
            FROM sensor_data
            WHERE "timestamp" >= $1 AND "timestamp" < $2
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
        .context("failed to sum steps")?;
        Ok(value)
    }

    async fn buckets(
        &self,
        window: Window,
        size: BucketSize,
        offset: FixedOffset,
    ) -> Result<Vec<Bucket>> {
        // Truncate in the reporting offset, then shift back to UTC so the
        // session time zone never affects bucket edges.
        let rows = sqlx::query_as::<_, Bucket>(
            r#"
            SELECT (date_trunc($1, ("timestamp" AT TIME ZONE 'UTC') + make_interval(secs => $2))
                    - make_interval(secs => $2)) AT TIME ZONE 'UTC' AS start,
                   AVG(heartrate)      AS avg_heartrate,
                   AVG(bodytemp)       AS avg_bodytemp,
                   SUM(steps)::BIGINT  AS total_steps
            FROM sensor_data
            WHERE "timestamp" >= $3 AND "timestamp" < $4
            GROUP BY 1
            ORDER BY 1 ASC
            "#,
        )
        .bind(size.as_sql_field())
        .bind(f64::from(offset.local_minus_utc()))
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to bucket readings by {}", size.as_sql_field()))?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
