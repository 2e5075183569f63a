//! HTTP API для предсказания цены
//!
//! Тонкий слой над обученным артефактом: заполняет запрос значениями по
//! умолчанию из контракта признаков, вызывает артефакт и форматирует цену.

mod error;
mod handlers;
mod state;

pub use error::ServerError;
pub use state::{spawn_reload_task, AppState, LoadedModel, ModelHandle};

use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::features::FeatureSpec;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/features", get(handlers::features))
        .route("/api/predict", post(handlers::predict))
        .route("/api/reload", post(handlers::reload))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Загрузка последнего артефакта и запуск сервера
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(settings, FeatureSpec::housing()));

    if let Err(e) = state.reload().await {
        tracing::warn!(error = %e, "Starting without a model, POST /api/reload after training");
    }
    if let Some(interval) = state.settings.reload_interval() {
        tracing::info!(interval_secs = interval.as_secs(), "Periodic model reload enabled");
        spawn_reload_task(state.clone(), interval);
    }

    let addr = format!("{}:{}", state.settings.host(), state.settings.port());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
