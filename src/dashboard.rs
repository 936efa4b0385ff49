//! Browser dashboard embedded in the binary.
//!
//! The page polls the read endpoints on the intervals served from
//! `/dashboard/config.json`. It holds no state beyond the rendered widgets.

use axum::{
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::config::DashboardIntervals;

const INDEX_HTML: &str = include_str!("../assets/dashboard/index.html");
const DASHBOARD_JS: &str = include_str!("../assets/dashboard/dashboard.js");

#[derive(Debug, Serialize)]
struct DashboardConfig {
    gauge_poll_secs: u64,
    chart_poll_secs: u64,
    recommendation_poll_secs: u64,
}

impl From<DashboardIntervals> for DashboardConfig {
    fn from(i: DashboardIntervals) -> Self {
        Self {
            gauge_poll_secs: i.gauge_secs,
            chart_poll_secs: i.chart_secs,
            recommendation_poll_secs: i.recommendation_secs,
        }
    }
}

pub fn router(intervals: DashboardIntervals) -> Router {
    Router::new()
        .route("/dashboard", get(|| async { Html(INDEX_HTML) }))
        .route("/dashboard/dashboard.js", get(script))
        .route(
            "/dashboard/config.json",
            get(move || async move { Json(DashboardConfig::from(intervals)) }),
        )
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        DASHBOARD_JS,
    )
}
