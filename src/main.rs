use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use health_monitor_service::{
    api::{self, AppState},
    config::Config,
    db::{self, PgReadingStore},
    llm::OpenAiClient,
    readings::ReadingService,
    recommendations::RecommendationService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; env vars may also be set externally.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!(max_connections = config.db_max_connections, "Database ready");

    let readings = ReadingService::new(Arc::new(PgReadingStore::new(pool.clone())), config.calendar);
    let generator = OpenAiClient::new(&config)?;
    info!(
        model = %config.openai_model,
        base_url = %config.openai_base_url,
        timeout_secs = config.llm_timeout.as_secs(),
        "Recommendation client ready"
    );

    let state = AppState {
        recommendations: RecommendationService::new(readings.clone(), Arc::new(generator)),
        readings,
        dashboard: config.dashboard,
        clock: Arc::new(Utc::now),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        utc_offset = %config.calendar.offset,
        week_start = %config.calendar.week_start,
        "HTTP server listening"
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Database pool closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
