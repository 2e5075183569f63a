//! Обработчики запросов

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::types::{
    FeaturesResponse, HealthResponse, PredictResponse, PredictionInput, PredictionOutput, ReloadResponse,
};

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Properchy house price API (Rust)",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model = state.model.current().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: model.is_some(),
        model_path: model.map(|m| m.path.display().to_string()),
    })
}

pub async fn features(State(state): State<Arc<AppState>>) -> Json<FeaturesResponse> {
    let features: Vec<String> = state.feature_spec.names().iter().map(|s| s.to_string()).collect();
    Json(FeaturesResponse {
        count: features.len(),
        features,
    })
}

pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<PredictResponse>> {
    let model = state.model.current().await.ok_or(ServerError::ModelNotLoaded)?;
    let input = parse_input(&body)?;

    let table = state.feature_spec.fill(&input)?;
    let prices = model.artifact.predict(&table)?;
    let price = prices
        .get(0)
        .copied()
        .ok_or_else(|| ServerError::Internal("model returned no prediction".to_string()))?;

    let output = PredictionOutput::from_price(price);
    tracing::info!(price = output.predicted_price, "Prediction served");
    Ok(Json(output.into()))
}

pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>> {
    let loaded = state.reload().await?;
    Ok(Json(ReloadResponse {
        success: true,
        model_path: loaded.path.display().to_string(),
    }))
}

/// Тело запроса: JSON-объект; пустое тело и `{}` - отсутствие данных
fn parse_input(body: &[u8]) -> Result<PredictionInput> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServerError::NoInput);
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))?;
    if value.is_null() {
        return Err(ServerError::NoInput);
    }
    if !value.is_object() {
        return Err(ServerError::BadRequest("expected a JSON object of features".to_string()));
    }

    let input: PredictionInput =
        serde_json::from_value(value).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    if input.is_empty() {
        return Err(ServerError::NoInput);
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert!(matches!(parse_input(b""), Err(ServerError::NoInput)));
        assert!(matches!(parse_input(b"  {} "), Err(ServerError::NoInput)));
        assert!(matches!(parse_input(b"null"), Err(ServerError::NoInput)));
        assert!(matches!(parse_input(b"[1, 2]"), Err(ServerError::BadRequest(_))));
        assert!(matches!(parse_input(b"{oops"), Err(ServerError::BadRequest(_))));

        let input = parse_input(br#"{"GrLivArea": 2000}"#).unwrap();
        assert_eq!(input.iter().count(), 1);
    }
}
