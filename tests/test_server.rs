//! Integration test: prediction API over a published artifact

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use properchy_ml::data::{Column, RawTable};
use properchy_ml::features::{FeatureDef, FeatureKind, FeatureSpec};
use properchy_ml::server::{create_router, AppState};
use properchy_ml::{ModelKind, Settings, TrainingPipeline};

const N_ROWS: usize = 60;

fn settings(dir: &Path) -> Settings {
    Settings::builder()
        .artifact_dir(dir.join("artifacts"))
        .model_kind(ModelKind::GradientBoostedTree)
        .test_size(None)
        .build()
        .unwrap()
}

/// Синтетическая выборка по всем 37 признакам; цена зависит от площади и качества
fn housing_table(spec: &FeatureSpec) -> RawTable {
    let mut columns: Vec<Column> = spec
        .features()
        .iter()
        .enumerate()
        .map(|(j, feature)| {
            let base = feature.default.as_f64().unwrap_or(0.0);
            let values: Vec<f64> = (0..N_ROWS)
                .map(|i| match feature.name.as_str() {
                    "Gr Liv Area" => 800.0 + 25.0 * i as f64,
                    "Overall Qual" => (3 + i % 7) as f64,
                    _ => base + ((i * (j + 1)) % 5) as f64,
                })
                .collect();
            Column::numeric(feature.name.clone(), &values)
        })
        .collect();

    let prices: Vec<f64> = (0..N_ROWS)
        .map(|i| 20_000.0 + 90.0 * (800.0 + 25.0 * i as f64) + 15_000.0 * (3 + i % 7) as f64)
        .collect();
    columns.push(Column::numeric("SalePrice", &prices));
    RawTable::new(columns).unwrap()
}

fn trained_state(dir: &Path) -> Arc<AppState> {
    let spec = FeatureSpec::housing();
    TrainingPipeline::new(settings(dir)).run_on_table(housing_table(&spec)).unwrap();
    Arc::new(AppState::new(settings(dir), spec))
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_predict(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_partial_request_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let state = trained_state(dir.path());
    state.reload().await.unwrap();

    let (status, json) = send(&state, post_predict(r#"{"GrLivArea": 2000, "OverallQual": 8}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let price = json["predicted_price"].as_f64().unwrap();
    assert!(price > 0.0);
    let formatted = json["formatted_price"].as_str().unwrap();
    assert!(formatted.starts_with('$') && formatted.contains(','));
}

#[tokio::test]
async fn test_predict_without_model() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(AppState::new(settings(dir.path()), FeatureSpec::housing()));

    let (status, json) = send(&state, post_predict(r#"{"GrLivArea": 2000}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Model not loaded");
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = trained_state(dir.path());
    state.reload().await.unwrap();

    let (status, json) = send(&state, post_predict("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No input data provided");

    let (status, json) = send(&state, post_predict("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, json) = send(&state, post_predict(r#"{"LotArea": "large"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, _) = send(&state, post_predict("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Неизвестные ключи игнорируются
    let (status, json) = send(&state, post_predict(r#"{"GrLivArea": 1500, "Color": "red"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_health_reports_model_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = trained_state(dir.path());

    let (status, json) = send(&state, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_loaded"], false);
    assert!(json["model_path"].is_null());

    let loaded = state.reload().await.unwrap();
    let (_, json) = send(&state, get("/api/health")).await;
    assert_eq!(json["model_loaded"], true);
    assert_eq!(json["model_path"], loaded.path.display().to_string());
}

#[tokio::test]
async fn test_features_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(AppState::new(settings(dir.path()), FeatureSpec::housing()));

    let (status, json) = send(&state, get("/api/features")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 37);
    assert_eq!(json["features"][0], "PID");
    assert_eq!(json["features"].as_array().unwrap().len(), 37);
}

#[tokio::test]
async fn test_reload_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(AppState::new(settings(dir.path()), FeatureSpec::housing()));

    let reload = || Request::builder().method("POST").uri("/api/reload").body(Body::empty()).unwrap();

    let (status, json) = send(&state, reload()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);

    TrainingPipeline::new(settings(dir.path()))
        .run_on_table(housing_table(&FeatureSpec::housing()))
        .unwrap();
    let (status, json) = send(&state, reload()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(state.model.current().await.is_some());
}

#[tokio::test]
async fn test_artifact_with_other_features_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let spec = FeatureSpec::new(vec![
        FeatureDef::new("Gr Liv Area", FeatureKind::Numeric, 1500.0),
        FeatureDef::new("Overall Qual", FeatureKind::Ordinal, 5.0),
    ])
    .unwrap();
    let table = RawTable::new(vec![
        Column::numeric("Gr Liv Area", &[900.0, 1400.0, 2100.0, 1700.0]),
        Column::numeric("Overall Qual", &[4.0, 6.0, 8.0, 7.0]),
        Column::numeric("SalePrice", &[110_000.0, 160_000.0, 260_000.0, 205_000.0]),
    ])
    .unwrap();
    TrainingPipeline::new(settings(dir.path()))
        .with_feature_spec(spec)
        .run_on_table(table)
        .unwrap();

    let state = Arc::new(AppState::new(settings(dir.path()), FeatureSpec::housing()));
    assert!(state.reload().await.is_err());
    assert!(state.model.current().await.is_none());
}
