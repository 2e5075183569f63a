/// Модуль предобработки данных

pub mod normalization;
pub mod router;
pub mod target;

pub use normalization::DataNormalizer;
pub use router::{CategoryEncoding, ColumnPreprocessor, ColumnRouting, FittedPreprocessor};
pub use target::TargetTransform;
