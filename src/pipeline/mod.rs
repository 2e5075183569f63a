/// Сборка, публикация и прогон пайплайна обучения

pub mod artifact;
pub mod metrics;
pub mod runner;
pub mod store;

pub use artifact::{TrainedArtifact, ARTIFACT_FORMAT_VERSION};
pub use metrics::RegressionMetrics;
pub use runner::{RoutingSummary, RunReport, StageCounts, TrainingPipeline};
pub use store::ArtifactStore;
