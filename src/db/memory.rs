use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    models::{Bucket, NewSensorReading, SensorReading, Vital},
    store::ReadingStore,
};
use crate::time_window::{bucket_start, BucketSize, Window};

/// Process-local `ReadingStore` with the same aggregate semantics as the
/// Postgres store. Test double for the service and HTTP tests.
///
/// Cloning shares the underlying rows.
#[derive(Clone, Default)]
pub struct InMemoryReadingStore {
    rows: Arc<RwLock<Vec<SensorReading>>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row in insert order.
    pub async fn all(&self) -> Vec<SensorReading> {
        self.rows.read().await.clone()
    }
}

#[derive(Default)]
struct Accumulator {
    heartrate: Mean,
    bodytemp: Mean,
    steps: Option<i64>,
}

/// Running mean that ignores absent values, like SQL `AVG`.
#[derive(Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, v: Option<f64>) {
        if let Some(v) = v {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Sum that stays `None` until a value is seen, like SQL `SUM`.
fn add_steps(total: Option<i64>, v: Option<i64>) -> Result<Option<i64>> {
    match (total, v) {
        (Some(t), Some(v)) => t.checked_add(v).map(Some).context("step total out of range"),
        (None, v) => Ok(v),
        (t, None) => Ok(t),
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn insert(&self, r: NewSensorReading) -> Result<SensorReading> {
        let row = SensorReading {
            id: Uuid::new_v4(),
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
            received_at: Utc::now(),
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn latest(&self, vital: Vital) -> Result<Option<f64>> {
        let rows = self.rows.read().await;
        // Later inserts win ties because `max_by_key` keeps the last maximum.
        let latest = rows
            .iter()
            .max_by_key(|r| r.timestamp)
            .and_then(|r| vital.of(r));
        Ok(latest)
    }

    async fn average(&self, vital: Vital, window: Window) -> Result<Option<f64>> {
        let rows = self.rows.read().await;
        let mut mean = Mean::default();
        for r in rows.iter().filter(|r| window.contains(r.timestamp)) {
            mean.push(vital.of(r));
        }
        Ok(mean.value())
    }

    async fn total_steps(&self, window: Window) -> Result<Option<i64>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .try_fold(None, |total, r| add_steps(total, r.steps))?)
    }

    async fn buckets(
        &self,
        window: Window,
        size: BucketSize,
        offset: FixedOffset,
    ) -> Result<Vec<Bucket>> {
        let rows = self.rows.read().await;
        let mut grouped: BTreeMap<DateTime<Utc>, Accumulator> = BTreeMap::new();
        for r in rows.iter().filter(|r| window.contains(r.timestamp)) {
            let acc = grouped
                .entry(bucket_start(r.timestamp, size, offset))
                .or_default();
            acc.heartrate.push(r.heartrate);
            acc.bodytemp.push(r.bodytemp);
            acc.steps = add_steps(acc.steps, r.steps)?;
        }

        Ok(grouped
            .into_iter()
            .map(|(start, acc)| Bucket {
                start,
                avg_heartrate: acc.heartrate.value(),
                avg_bodytemp: acc.bodytemp.value(),
                total_steps: acc.steps,
            })
            .collect())
    }
}
