//! Прогон обучения: загрузка → очистка → препроцессинг → обучение → сборка → публикация
//!
//! Этапы выполняются строго последовательно. Первая же ошибка останавливает
//! прогон и возвращается с указанием этапа; артефакт в этом случае не публикуется.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::artifact::TrainedArtifact;
use super::metrics::RegressionMetrics;
use super::store::ArtifactStore;
use crate::config::Settings;
use crate::data::{Axis, Cell, Column, DropMissingValues, IngestorRegistry, RawTable};
use crate::error::{PipelineError, Stage, StageExt, ValidationError};
use crate::features::FeatureSpec;
use crate::models::{create_strategy, ModelKind, ModelStrategy};
use crate::preprocessing::{ColumnPreprocessor, TargetTransform};

/// Счётчики строк и колонок по этапам
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageCounts {
    pub ingested_rows: usize,
    pub ingested_columns: usize,
    pub unlabeled_rows_dropped: usize,
    pub missing_axis: Option<Axis>,
    pub missing_dropped: usize,
    pub rows_after_cleaning: usize,
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub encoded_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingSummary {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

/// Итог прогона для внешнего трекера экспериментов
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub model_kind: ModelKind,
    pub params: serde_json::Value,
    pub trained_at: DateTime<Utc>,
    pub counts: StageCounts,
    pub routing: RoutingSummary,
    pub train_metrics: RegressionMetrics,
    pub holdout_metrics: Option<RegressionMetrics>,
    pub artifact_path: PathBuf,
}

pub struct TrainingPipeline {
    settings: Settings,
    feature_spec: FeatureSpec,
    registry: IngestorRegistry,
    store: ArtifactStore,
}

impl TrainingPipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            registry: IngestorRegistry::with_defaults(settings.extract_dir()),
            store: ArtifactStore::new(settings.artifact_dir()),
            feature_spec: FeatureSpec::housing(),
            settings,
        }
    }

    pub fn with_feature_spec(mut self, feature_spec: FeatureSpec) -> Self {
        self.feature_spec = feature_spec;
        self
    }

    pub fn with_registry(mut self, registry: IngestorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Полный прогон от архива до опубликованного артефакта
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let strategy = self.strategy()?;

        let archive = self.settings.archive_path();
        tracing::info!(archive = %archive.display(), model_kind = %strategy.kind(), "Starting training run");
        let raw = self.registry.ingest(archive).stage(Stage::Ingest)?;

        self.train(strategy.as_ref(), raw)
    }

    /// Прогон на уже загруженной таблице
    pub fn run_on_table(&self, raw: RawTable) -> Result<RunReport, PipelineError> {
        let strategy = self.strategy()?;
        self.train(strategy.as_ref(), raw)
    }

    fn strategy(&self) -> Result<Box<dyn ModelStrategy>, PipelineError> {
        create_strategy(self.settings.model_kind(), self.settings.param_overrides()).stage(Stage::Configure)
    }

    fn train(&self, strategy: &dyn ModelStrategy, raw: RawTable) -> Result<RunReport, PipelineError> {
        let target_name = self.settings.target_column();
        let mut counts = StageCounts {
            ingested_rows: raw.n_rows(),
            ingested_columns: raw.n_cols(),
            ..StageCounts::default()
        };

        // Очистка: строки без цели, проекция на контракт признаков, пропуски
        let labeled = drop_unlabeled(&raw, target_name).stage(Stage::Clean)?;
        counts.unlabeled_rows_dropped = raw.n_rows() - labeled.n_rows();

        let mut columns = self.feature_spec.names();
        columns.push(target_name);
        let projected = labeled.select(&columns).stage(Stage::Clean)?;

        let outcome = DropMissingValues::new(self.settings.missing_axis(), self.settings.missing_threshold())
            .handle(&projected)
            .stage(Stage::Clean)?;
        counts.missing_axis = Some(self.settings.missing_axis());
        counts.missing_dropped = outcome.dropped;
        counts.rows_after_cleaning = outcome.table.n_rows();

        // Препроцессинг
        let (features, target_column) = outcome.table.split_target(target_name).stage(Stage::Preprocess)?;
        let prices = target_values(&target_column).stage(Stage::Preprocess)?;
        let transform = TargetTransform::default();
        let y_all = transform.forward_all(target_name, &prices).stage(Stage::Preprocess)?;

        let (train_rows, holdout_rows) = split_rows(features.n_rows(), self.settings.test_size(), self.settings.seed());
        counts.train_rows = train_rows.len();
        counts.holdout_rows = holdout_rows.len();

        let train_features = features.take_rows(&train_rows);
        let y_train = y_all.select(ndarray::Axis(0), &train_rows);

        let (matrix, preprocessor) = ColumnPreprocessor::new()
            .with_expected_columns(self.feature_spec.names())
            .fit_transform(&train_features, &y_train)
            .stage(Stage::Preprocess)?;
        counts.encoded_features = matrix.ncols();

        // Обучение
        let model = strategy.build_and_train(&matrix, &y_train).stage(Stage::Train)?;

        // Сборка и оценка на шкале цены
        let artifact = TrainedArtifact::assemble(preprocessor, model, transform).stage(Stage::Assemble)?;
        let train_metrics = evaluate(&artifact, &train_features, &prices.select(ndarray::Axis(0), &train_rows))
            .stage(Stage::Assemble)?;
        let holdout_metrics = if holdout_rows.is_empty() {
            None
        } else {
            let holdout_features = features.take_rows(&holdout_rows);
            let holdout_prices = prices.select(ndarray::Axis(0), &holdout_rows);
            Some(evaluate(&artifact, &holdout_features, &holdout_prices).stage(Stage::Assemble)?)
        };

        tracing::info!(
            rmse = train_metrics.rmse,
            mae = train_metrics.mae,
            r2 = ?train_metrics.r2,
            "Training metrics"
        );
        if let Some(metrics) = &holdout_metrics {
            tracing::info!(rmse = metrics.rmse, mae = metrics.mae, r2 = ?metrics.r2, "Holdout metrics");
        }

        let artifact_path = self.store.publish(&artifact).stage(Stage::Publish)?;

        let routing = artifact.preprocessor().routing();
        Ok(RunReport {
            model_kind: artifact.model_kind(),
            params: artifact.model().params(),
            trained_at: artifact.trained_at(),
            counts,
            routing: RoutingSummary {
                numeric: routing.numeric().to_vec(),
                categorical: routing.categorical().to_vec(),
            },
            train_metrics,
            holdout_metrics,
            artifact_path,
        })
    }
}

/// Строки без значения цели в обучение не попадают
fn drop_unlabeled(table: &RawTable, target: &str) -> Result<RawTable, ValidationError> {
    let column = table
        .column(target)
        .ok_or_else(|| ValidationError::MissingColumn(target.to_string()))?;
    let keep: Vec<usize> = column
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, cell)| !cell.is_missing())
        .map(|(i, _)| i)
        .collect();

    let dropped = table.n_rows() - keep.len();
    if dropped > 0 {
        tracing::warn!(column = target, dropped, "Dropping rows without target value");
    }
    Ok(table.take_rows(&keep))
}

fn target_values(column: &Column) -> Result<Array1<f64>, ValidationError> {
    column
        .cells()
        .iter()
        .map(|cell| match cell {
            Cell::Number(v) => Ok(*v),
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| ValidationError::InvalidValue {
                column: column.name().to_string(),
                value: s.clone(),
            }),
            Cell::Missing => Err(ValidationError::InvalidValue {
                column: column.name().to_string(),
                value: "missing".to_string(),
            }),
        })
        .collect()
}

/// Детерминированное разбиение индексов строк на обучающие и отложенные
fn split_rows(n_rows: usize, test_size: Option<f64>, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rows: Vec<usize> = (0..n_rows).collect();
    let Some(test_size) = test_size else {
        return (rows, Vec::new());
    };
    if n_rows < 2 {
        tracing::warn!(n_rows, "Too few rows for a holdout split, training on all rows");
        return (rows, Vec::new());
    }

    let n_holdout = ((n_rows as f64) * test_size).ceil() as usize;
    let n_holdout = n_holdout.clamp(1, n_rows - 1);

    rows.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut holdout = rows.split_off(n_rows - n_holdout);
    rows.sort_unstable();
    holdout.sort_unstable();
    (rows, holdout)
}

fn evaluate(
    artifact: &TrainedArtifact,
    features: &RawTable,
    prices: &Array1<f64>,
) -> Result<RegressionMetrics, ValidationError> {
    let predicted = artifact.predict(features)?;
    RegressionMetrics::compute(&predicted, prices)
}
