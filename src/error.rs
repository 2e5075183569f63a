//! Типы ошибок пайплайна

use std::path::PathBuf;

use thiserror::Error;

/// Ошибки загрузки архива с данными
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("not a valid archive: {0}")]
    NotAPackage(PathBuf),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no delimited table found in archive")]
    NoTableFound,

    #[error("archive contains more than one table: {}", .0.join(", "))]
    AmbiguousTable(Vec<String>),

    #[error("malformed table: {0}")]
    MalformedTable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Ошибки валидации входных данных препроцессора и стратегий
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid input type: {0}")]
    InvalidInputType(String),

    #[error("training data cannot be empty")]
    EmptyData,

    #[error("features and target must have the same length ({features} != {target})")]
    LengthMismatch { features: usize, target: usize },

    #[error("column set does not match the feature spec: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("invalid value in column '{column}': {value}")]
    InvalidValue { column: String, value: String },
}

/// Ошибки конфигурации
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown model type: {0} (supported: gradient_boosted_tree, linear_regression)")]
    UnknownModelType(String),

    #[error("invalid model parameters: {0}")]
    InvalidParams(String),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Ошибки хранилища артефактов
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no trained artifact found in {0}")]
    NoArtifactFound(PathBuf),

    #[error("artifact {path} has format version {found}, expected {expected}")]
    IncompatibleVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Этап пайплайна обучения
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configure,
    Ingest,
    Clean,
    Preprocess,
    Train,
    Assemble,
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Ingest => "ingest",
            Stage::Clean => "clean",
            Stage::Preprocess => "preprocess",
            Stage::Train => "train",
            Stage::Assemble => "assemble",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Ошибка любого этапа без привязки к этапу
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ошибка пайплайна: исходная ошибка и этап, на котором прогон остановился
#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// Привязка ошибки к этапу пайплайна
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, PipelineError>;
}

impl<T, E: Into<Error>> StageExt<T> for std::result::Result<T, E> {
    fn stage(self, stage: Stage) -> std::result::Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            stage,
            source: e.into(),
        })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
