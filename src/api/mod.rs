pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    config::DashboardIntervals, dashboard, readings::ReadingService,
    recommendations::RecommendationService,
};

use handlers::ApiDoc;

/// Source of "now" for the calendar-window endpoints.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shared handler state. Cloning is cheap; services hold `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub readings: ReadingService,
    pub recommendations: RecommendationService,
    pub dashboard: DashboardIntervals,
    pub clock: Clock,
}

pub fn router(state: AppState) -> Router {
    let dashboard_intervals = state.dashboard;

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/sensor-data", post(handlers::post_sensor_data))
        .route("/latest-heart-rate", get(handlers::latest_heart_rate))
        .route("/latest-temperature", get(handlers::latest_temperature))
        .route("/today-steps", get(handlers::today_steps))
        .route("/daily-data", get(handlers::daily_data))
        .route("/weekly-data", get(handlers::weekly_data))
        .route("/get-recommendations", get(handlers::get_recommendations))
        .with_state(state)
        .split_for_parts();

    router
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .merge(dashboard::router(dashboard_intervals))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
