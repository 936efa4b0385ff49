use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, Offset, Utc, Weekday};

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

/// Defines what "today" and "this week" mean for every aggregate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPolicy {
    /// Fixed offset used for day boundaries and hour/day buckets.
    pub offset: FixedOffset,
    /// First day of the reporting week.
    pub week_start: Weekday,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            week_start: Weekday::Sun,
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Poll intervals handed to the browser dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardIntervals {
    pub gauge_secs: u64,
    pub chart_secs: u64,
    pub recommendation_secs: u64,
}

impl Default for DashboardIntervals {
    fn default() -> Self {
        Self {
            gauge_secs: 60,
            chart_secs: 600,
            recommendation_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    /// Upper bound on a single chat-completion round-trip.
    pub llm_timeout: Duration,
    pub server_host: String,
    pub server_port: u16,
    pub calendar: CalendarPolicy,
    pub dashboard: DashboardIntervals,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: optional("OPENAI_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_owned(),
            openai_model: optional("OPENAI_MODEL", "gpt-3.5-turbo"),
            llm_timeout: Duration::from_secs(
                optional("LLM_TIMEOUT_SECS", "60")
                    .parse()
                    .context("LLM_TIMEOUT_SECS must be a positive integer")?,
            ),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "9000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            calendar: CalendarPolicy {
                offset: parse_utc_offset(&optional("REPORT_UTC_OFFSET", "+00:00"))?,
                week_start: parse_week_start(&optional("WEEK_START", "sunday"))?,
            },
            dashboard: DashboardIntervals {
                gauge_secs: positive_secs("GAUGE_POLL_SECS", "60")?,
                chart_secs: positive_secs("CHART_POLL_SECS", "600")?,
                recommendation_secs: positive_secs("RECOMMENDATION_POLL_SECS", "600")?,
            },
        })
    }
}

/// Parse `"Z"`, `"UTC"`, `"+HH:MM"`, `"-HH:MM"` or `"+HHMM"` into a `FixedOffset`.
pub(crate) fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match raw.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!("REPORT_UTC_OFFSET must start with '+' or '-', got: {raw:?}"),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("REPORT_UTC_OFFSET must look like +HH:MM, got: {raw:?}");
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if minutes >= 60 {
        bail!("REPORT_UTC_OFFSET minutes out of range in {raw:?}");
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("REPORT_UTC_OFFSET out of range: {raw:?}"))
}

fn parse_week_start(raw: &str) -> Result<Weekday> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("WEEK_START must be a weekday name, got: {raw:?}"))
}

fn positive_secs(key: &str, default: &str) -> Result<u64> {
    let secs: u64 = optional(key, default)
        .parse()
        .with_context(|| format!("{key} must be a positive integer"))?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(secs)
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
