use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use utoipa::OpenApi;
use validator::Validate;

use super::{
    dto::{
        DailyBucketDto, HourlyBucketDto, LatestHeartRateDto, LatestTemperatureDto,
        RecommendationDto, SensorDataRequest, SensorReadingDto, TodayStepsDto,
    },
    errors::AppError,
    AppState,
};
use crate::db::models::Vital;

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Store one sensor reading.
#[utoipa::path(
    post,
    path = "/sensor-data",
    request_body = SensorDataRequest,
    responses(
        (status = 201, description = "Reading stored", body = SensorReadingDto),
        (status = 400, description = "Malformed or out-of-range reading"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn post_sensor_data(
    State(state): State<AppState>,
    payload: Result<Json<SensorDataRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SensorReadingDto>), AppError> {
    let Json(request) = payload?;
    request.validate()?;

    let row = state.readings.ingest(request.into()).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

// ---------------------------------------------------------------------------
// Point-in-time values
// ---------------------------------------------------------------------------

/// Heart rate of the most recent reading that carries one.
#[utoipa::path(
    get,
    path = "/latest-heart-rate",
    responses(
        (status = 200, description = "Latest heart rate", body = LatestHeartRateDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn latest_heart_rate(
    State(state): State<AppState>,
) -> Result<Json<LatestHeartRateDto>, AppError> {
    let heartrate = state.readings.latest(Vital::HeartRate).await?;
    Ok(Json(LatestHeartRateDto { heartrate }))
}

/// Body temperature of the most recent reading that carries one.
#[utoipa::path(
    get,
    path = "/latest-temperature",
    responses(
        (status = 200, description = "Latest body temperature", body = LatestTemperatureDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn latest_temperature(
    State(state): State<AppState>,
) -> Result<Json<LatestTemperatureDto>, AppError> {
    let bodytemp = state.readings.latest(Vital::BodyTemp).await?;
    Ok(Json(LatestTemperatureDto { bodytemp }))
}

/// Steps recorded since the start of today; `0` when there are none.
#[utoipa::path(
    get,
    path = "/today-steps",
    responses(
        (status = 200, description = "Total steps today", body = TodayStepsDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn today_steps(
    State(state): State<AppState>,
) -> Result<Json<TodayStepsDto>, AppError> {
    let totalsteps = state.readings.today_steps((state.clock)()).await?;
    Ok(Json(TodayStepsDto { totalsteps }))
}

// ---------------------------------------------------------------------------
// Rollups
// ---------------------------------------------------------------------------

/// Hourly averages and step totals for today, ascending. Hours without
/// readings are omitted.
#[utoipa::path(
    get,
    path = "/daily-data",
    responses(
        (status = 200, description = "Hourly buckets for today", body = Vec<HourlyBucketDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "rollups"
)]
pub async fn daily_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<HourlyBucketDto>>, AppError> {
    let offset = state.readings.calendar().offset;
    let buckets = state.readings.daily_rollup((state.clock)()).await?;
    Ok(Json(
        buckets
            .into_iter()
            .map(|b| HourlyBucketDto::new(b, offset))
            .collect(),
    ))
}

/// Daily averages and step totals for the current week, ascending. Days
/// without readings are omitted.
#[utoipa::path(
    get,
    path = "/weekly-data",
    responses(
        (status = 200, description = "Daily buckets for this week", body = Vec<DailyBucketDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "rollups"
)]
pub async fn weekly_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<DailyBucketDto>>, AppError> {
    let offset = state.readings.calendar().offset;
    let buckets = state.readings.weekly_rollup((state.clock)()).await?;
    Ok(Json(
        buckets
            .into_iter()
            .map(|b| DailyBucketDto::new(b, offset))
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Ask the language model for advice based on today's summary.
#[utoipa::path(
    get,
    path = "/get-recommendations",
    responses(
        (status = 200, description = "Generated recommendation", body = RecommendationDto),
        (status = 422, description = "Not enough data recorded today"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "recommendations"
)]
pub async fn get_recommendations(
    State(state): State<AppState>,
) -> Result<Json<RecommendationDto>, AppError> {
    let recommendation = state.recommendations.recommend((state.clock)()).await?;
    Ok(Json(RecommendationDto { recommendation }))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Plain-text liveness message.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Server is running", body = String, content_type = "text/plain"),
    ),
    tag = "system"
)]
pub async fn root() -> &'static str {
    "Health Monitoring Backend Server is running!"
}

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        post_sensor_data,
        latest_heart_rate,
        latest_temperature,
        today_steps,
        daily_data,
        weekly_data,
        get_recommendations,
        root,
        health,
    ),
    components(schemas(
        SensorDataRequest,
        SensorReadingDto,
        LatestHeartRateDto,
        LatestTemperatureDto,
        TodayStepsDto,
        HourlyBucketDto,
        DailyBucketDto,
        RecommendationDto,
    )),
    tags(
        (name = "readings",        description = "Ingestion and latest values"),
        (name = "rollups",         description = "Hourly and daily aggregates"),
        (name = "recommendations", description = "Generated health advice"),
        (name = "system",          description = "System endpoints"),
    ),
    info(
        title = "Health Monitor API",
        version = "0.1.0",
        description = "REST API for wearable health readings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
