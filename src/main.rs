use std::sync::{Arc, Mutex};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fieldbook::config::AppConfig;
use fieldbook::db;
use fieldbook::handlers;
use fieldbook::services::gateway::chapa::ChapaGateway;
use fieldbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    config.validate_payments()?;

    let conn = db::init_db(&config.database_url)?;

    tracing::info!(
        base_url = %config.chapa_base_url,
        hold_ttl_minutes = config.pending_hold_ttl_minutes,
        always_open = config.always_open_slots,
        "using Chapa payment gateway"
    );
    let gateway = ChapaGateway::new(&config)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(gateway),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
