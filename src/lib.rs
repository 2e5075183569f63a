//! Properchy ML - обучение модели цены дома и API предсказаний

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod server;
pub mod types;

pub use config::{Settings, SettingsBuilder};
pub use error::{ConfigError, IngestError, PipelineError, Stage, StoreError, ValidationError};
pub use features::{FeatureDef, FeatureKind, FeatureSpec};
pub use models::{create_strategy, FittedModel, ModelKind, ModelStrategy};
pub use pipeline::{ArtifactStore, RunReport, TrainedArtifact, TrainingPipeline};
pub use types::*;
