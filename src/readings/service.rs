use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    config::CalendarPolicy,
    db::{
        models::{Bucket, DailySummary, NewSensorReading, SensorReading, Vital},
        ReadingStore,
    },
    time_window::{self, BucketSize},
};

/// Ingestion and aggregate queries over the reading store.
///
/// Every query takes `now` explicitly; windows are derived from it with the
/// configured `CalendarPolicy` and nothing is cached between calls.
#[derive(Clone)]
pub struct ReadingService {
    store: Arc<dyn ReadingStore>,
    calendar: CalendarPolicy,
}

impl ReadingService {
    pub fn new(store: Arc<dyn ReadingStore>, calendar: CalendarPolicy) -> Self {
        Self { store, calendar }
    }

    pub fn calendar(&self) -> &CalendarPolicy {
        &self.calendar
    }

    /// Append one validated reading.
    pub async fn ingest(&self, reading: NewSensorReading) -> Result<SensorReading> {
        let row = self.store.insert(reading).await?;
        debug!(
            id = %row.id,
            device_id = %row.device_id,
            sensor_type = %row.sensor_type,
            timestamp = %row.timestamp,
            "Sensor reading stored"
        );
        Ok(row)
    }

    pub async fn latest(&self, vital: Vital) -> Result<Option<f64>> {
        self.store.latest(vital).await
    }

    /// Steps recorded today; `0` when nothing was recorded.
    pub async fn today_steps(&self, now: DateTime<Utc>) -> Result<i64> {
        let window = time_window::today(now, &self.calendar);
        Ok(self.store.total_steps(window).await?.unwrap_or(0))
    }

    /// Hourly buckets for today, ascending.
    pub async fn daily_rollup(&self, now: DateTime<Utc>) -> Result<Vec<Bucket>> {
        let window = time_window::today(now, &self.calendar);
        self.store
            .buckets(window, BucketSize::Hour, self.calendar.offset)
            .await
    }

    /// Per-day buckets for the current week, ascending.
    pub async fn weekly_rollup(&self, now: DateTime<Utc>) -> Result<Vec<Bucket>> {
        let window = time_window::this_week(now, &self.calendar);
        self.store
            .buckets(window, BucketSize::Day, self.calendar.offset)
            .await
    }

    /// Today's averages and step total, fetched concurrently. Any failing
    /// query fails the whole summary.
    pub async fn daily_summary(&self, now: DateTime<Utc>) -> Result<DailySummary> {
        let window = time_window::today(now, &self.calendar);
        let (avg_heartrate, avg_bodytemp, total_steps) = tokio::try_join!(
            self.store.average(Vital::HeartRate, window),
            self.store.average(Vital::BodyTemp, window),
            self.store.total_steps(window),
        )?;
        Ok(DailySummary {
            avg_heartrate,
            avg_bodytemp,
            total_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Weekday};

    use super::*;
    use crate::db::InMemoryReadingStore;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        // January 2024: the 1st is a Monday, the 7th a Sunday.
        Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
    }

    fn service(calendar: CalendarPolicy) -> ReadingService {
        ReadingService::new(Arc::new(InMemoryReadingStore::new()), calendar)
    }

    fn reading(ts: DateTime<Utc>, heartrate: f64, bodytemp: f64, steps: i64) -> NewSensorReading {
        NewSensorReading {
            timestamp: ts,
            device_id: "wristband-1".into(),
            sensor_type: "combined".into(),
            user_id: "user-1".into(),
            additional_info: None,
            accel_x: None,
            accel_y: None,
            accel_z: None,
            steps: Some(steps),
            heartrate: Some(heartrate),
            spo2: None,
            bodytemp: Some(bodytemp),
        }
    }

    #[tokio::test]
    async fn today_steps_is_zero_without_readings() {
        let svc = service(CalendarPolicy::default());
        assert_eq!(svc.today_steps(at(3, 12, 0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn today_steps_excludes_other_days() {
        let svc = service(CalendarPolicy::default());
        svc.ingest(reading(at(2, 23, 59), 60.0, 36.5, 500)).await.unwrap();
        svc.ingest(reading(at(3, 0, 0), 60.0, 36.5, 100)).await.unwrap();
        svc.ingest(reading(at(3, 18, 0), 60.0, 36.5, 250)).await.unwrap();
        svc.ingest(reading(at(4, 0, 0), 60.0, 36.5, 900)).await.unwrap();

        assert_eq!(svc.today_steps(at(3, 12, 0)).await.unwrap(), 350);
    }

    #[tokio::test]
    async fn daily_rollup_has_one_bucket_per_reading_hour() {
        let svc = service(CalendarPolicy::default());
        svc.ingest(reading(at(3, 8, 0), 60.0, 36.1, 10)).await.unwrap();
        svc.ingest(reading(at(3, 14, 0), 80.0, 36.6, 20)).await.unwrap();
        svc.ingest(reading(at(3, 20, 0), 100.0, 37.0, 30)).await.unwrap();

        let buckets = svc.daily_rollup(at(3, 21, 0)).await.unwrap();
        let summary: Vec<_> = buckets
            .iter()
            .map(|b| (b.start, b.avg_heartrate, b.total_steps))
            .collect();
        assert_eq!(
            summary,
            vec![
                (at(3, 8, 0), Some(60.0), Some(10)),
                (at(3, 14, 0), Some(80.0), Some(20)),
                (at(3, 20, 0), Some(100.0), Some(30)),
            ]
        );
    }

    #[tokio::test]
    async fn weekly_rollup_covers_week_from_configured_start() {
        let svc = service(CalendarPolicy {
            offset: FixedOffset::east_opt(0).unwrap(),
            week_start: Weekday::Mon,
        });
        svc.ingest(reading(at(1, 9, 0), 60.0, 36.0, 100)).await.unwrap();
        svc.ingest(reading(at(1, 19, 0), 80.0, 37.0, 200)).await.unwrap();
        svc.ingest(reading(at(3, 9, 0), 70.0, 36.5, 50)).await.unwrap();
        // Sunday of the previous week.
        svc.ingest(reading(at(7, 9, 0) - chrono::Duration::days(7), 99.0, 39.0, 999))
            .await
            .unwrap();

        let buckets = svc.weekly_rollup(at(4, 12, 0)).await.unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].start, at(1, 0, 0));
        assert_eq!(buckets[0].avg_heartrate, Some(70.0));
        assert_eq!(buckets[0].avg_bodytemp, Some(36.5));
        assert_eq!(buckets[0].total_steps, Some(300));
        assert_eq!(buckets[1].start, at(3, 0, 0));
    }

    #[tokio::test]
    async fn repeated_queries_are_idempotent() {
        let svc = service(CalendarPolicy::default());
        svc.ingest(reading(at(3, 10, 15), 60.0, 36.5, 5)).await.unwrap();
        svc.ingest(reading(at(3, 10, 45), 62.0, 36.7, 7)).await.unwrap();

        let now = at(3, 11, 0);
        assert_eq!(svc.daily_rollup(now).await.unwrap(), svc.daily_rollup(now).await.unwrap());
        assert_eq!(svc.weekly_rollup(now).await.unwrap(), svc.weekly_rollup(now).await.unwrap());
        assert_eq!(svc.daily_summary(now).await.unwrap(), svc.daily_summary(now).await.unwrap());
    }

    #[tokio::test]
    async fn daily_summary_reports_today_only() {
        let svc = service(CalendarPolicy::default());
        svc.ingest(reading(at(2, 10, 0), 200.0, 40.0, 10_000)).await.unwrap();
        svc.ingest(reading(at(3, 10, 0), 60.0, 36.0, 1000)).await.unwrap();
        svc.ingest(reading(at(3, 11, 0), 80.0, 37.0, 4000)).await.unwrap();

        let s = svc.daily_summary(at(3, 12, 0)).await.unwrap();
        assert_eq!(s.avg_heartrate, Some(70.0));
        assert_eq!(s.avg_bodytemp, Some(36.5));
        assert_eq!(s.total_steps, Some(5000));
    }

    #[tokio::test]
    async fn daily_summary_is_empty_without_readings_today() {
        let svc = service(CalendarPolicy::default());
        svc.ingest(reading(at(2, 10, 0), 60.0, 36.0, 10)).await.unwrap();

        assert_eq!(svc.daily_summary(at(3, 12, 0)).await.unwrap(), DailySummary::default());
    }
}
