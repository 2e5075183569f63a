/// Загрузка и очистка табличных данных

pub mod ingest;
pub mod missing;
pub mod table;

pub use ingest::{ingest, DataIngestor, IngestorRegistry, ZipIngestor};
pub use missing::{clean, Axis, CleanOutcome, DropMissingValues};
pub use table::{Cell, Column, RawTable};
