//! Calendar windows and bucket boundaries.
//!
//! Every aggregate endpoint derives its time range from here so that "today",
//! "this week" and bucket edges follow one `CalendarPolicy`. Windows are
//! half-open: `start <= t < end`.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::config::CalendarPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Granularity of a rollup bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSize {
    Hour,
    Day,
}

impl BucketSize {
    /// Postgres `date_trunc` field name.
    pub fn as_sql_field(self) -> &'static str {
        match self {
            BucketSize::Hour => "hour",
            BucketSize::Day => "day",
        }
    }
}

/// The calendar day containing `now`.
pub fn today(now: DateTime<Utc>, calendar: &CalendarPolicy) -> Window {
    let date = to_local(now, calendar.offset).date();
    Window {
        start: midnight(date, calendar.offset),
        end: midnight(date + Duration::days(1), calendar.offset),
    }
}

/// The calendar week containing `now`, starting on `calendar.week_start`.
pub fn this_week(now: DateTime<Utc>, calendar: &CalendarPolicy) -> Window {
    let date = to_local(now, calendar.offset).date();
    let days_back = (7 + date.weekday().num_days_from_monday()
        - calendar.week_start.num_days_from_monday())
        % 7;
    let first = date - Duration::days(days_back.into());
    Window {
        start: midnight(first, calendar.offset),
        end: midnight(first + Duration::days(7), calendar.offset),
    }
}

/// Start of the bucket that contains `t`.
pub fn bucket_start(t: DateTime<Utc>, size: BucketSize, offset: FixedOffset) -> DateTime<Utc> {
    let local = to_local(t, offset);
    let truncated = match size {
        BucketSize::Hour => {
            local.date().and_time(NaiveTime::MIN) + Duration::hours(local.hour().into())
        }
        BucketSize::Day => local.date().and_time(NaiveTime::MIN),
    };
    from_local(truncated, offset)
}

fn midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    from_local(date.and_time(NaiveTime::MIN), offset)
}

fn to_local(t: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    t.naive_utc() + Duration::seconds(offset.local_minus_utc().into())
}

fn from_local(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(offset.local_minus_utc().into())).and_utc()
}
