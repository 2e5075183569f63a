//! Состояние сервера и текущая модель

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::error::{Result, ServerError};
use crate::config::Settings;
use crate::features::FeatureSpec;
use crate::pipeline::{ArtifactStore, TrainedArtifact};

/// Загруженный артефакт и откуда он взят
#[derive(Debug)]
pub struct LoadedModel {
    pub artifact: TrainedArtifact,
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

/// Ссылка на текущую модель.
///
/// Читатели клонируют `Arc` и сразу отпускают блокировку, поэтому запросы,
/// начатые на старой модели, дорабатывают на ней после замены.
#[derive(Debug, Default)]
pub struct ModelHandle {
    current: RwLock<Option<Arc<LoadedModel>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<LoadedModel>> {
        self.current.read().await.clone()
    }

    /// Атомарная замена; возвращает предыдущую модель
    pub async fn swap(&self, model: Arc<LoadedModel>) -> Option<Arc<LoadedModel>> {
        self.current.write().await.replace(model)
    }
}

/// Общее состояние обработчиков
pub struct AppState {
    pub settings: Settings,
    pub feature_spec: FeatureSpec,
    pub store: ArtifactStore,
    pub model: ModelHandle,
}

impl AppState {
    pub fn new(settings: Settings, feature_spec: FeatureSpec) -> Self {
        Self {
            store: ArtifactStore::new(settings.artifact_dir()),
            settings,
            feature_spec,
            model: ModelHandle::new(),
        }
    }

    /// Загружает самый свежий артефакт, если он отличается от текущего.
    /// При любой ошибке остаётся активной предыдущая модель.
    pub async fn reload(&self) -> Result<Arc<LoadedModel>> {
        let store = self.store.clone();
        let path = tokio::task::spawn_blocking(move || store.latest_path())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;

        if let Some(current) = self.model.current().await {
            if current.path == path {
                return Ok(current);
            }
        }

        let load_path = path.clone();
        let artifact = tokio::task::spawn_blocking(move || ArtifactStore::load(&load_path))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;

        if artifact.feature_names().iter().map(String::as_str).ne(self.feature_spec.names()) {
            return Err(ServerError::FeatureMismatch {
                path: path.display().to_string(),
            });
        }

        let loaded = Arc::new(LoadedModel {
            artifact,
            path,
            loaded_at: Utc::now(),
        });
        self.model.swap(loaded.clone()).await;

        tracing::info!(
            path = %loaded.path.display(),
            model_kind = %loaded.artifact.model_kind(),
            trained_at = %loaded.artifact.trained_at(),
            "Model loaded"
        );
        Ok(loaded)
    }
}

/// Периодическая проверка хранилища на новый артефакт
pub fn spawn_reload_task(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Первый тик срабатывает сразу
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = state.reload().await {
                tracing::warn!(error = %e, "Periodic model reload failed");
            }
        }
    })
}
