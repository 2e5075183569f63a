//! Загрузка упакованного датасета
//!
//! Архив проходит этапы `Unvalidated → Validated → Extracted → TableDiscovered → Loaded`.
//! Каждый этап - отдельный тип, переход поглощает предыдущее состояние, поэтому
//! частично загруженная таблица наружу не попадает.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::data::table::RawTable;
use crate::error::IngestError;

const ZIP_SIGNATURES: &[[u8; 4]] = &[
    [b'P', b'K', 0x03, 0x04],
    [b'P', b'K', 0x05, 0x06],
    [b'P', b'K', 0x07, 0x08],
];

/// Стратегия загрузки одного формата входных данных
pub trait DataIngestor: Send + Sync {
    /// Имя формата для логов
    fn format(&self) -> &'static str;

    /// Подходит ли файл этой стратегии (по первым байтам)
    fn accepts(&self, header: &[u8]) -> bool;

    fn ingest(&self, path: &Path) -> Result<RawTable, IngestError>;
}

/// Загрузчик zip-архива с единственной таблицей внутри
pub struct ZipIngestor {
    work_dir: PathBuf,
}

impl ZipIngestor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl DataIngestor for ZipIngestor {
    fn format(&self) -> &'static str {
        "zip"
    }

    fn accepts(&self, header: &[u8]) -> bool {
        header.len() >= 4 && ZIP_SIGNATURES.iter().any(|sig| header[..4] == sig[..])
    }

    fn ingest(&self, path: &Path) -> Result<RawTable, IngestError> {
        let table = Unvalidated::new(path)
            .validate()?
            .extract(&self.work_dir)?
            .discover()?
            .load()?;

        tracing::info!(
            path = %path.display(),
            rows = table.n_rows(),
            columns = table.n_cols(),
            "Dataset ingested"
        );
        Ok(table)
    }
}

struct Unvalidated<'a> {
    path: &'a Path,
}

struct Validated<'a> {
    path: &'a Path,
    archive: zip::ZipArchive<File>,
}

struct Extracted {
    root: PathBuf,
    entries: Vec<PathBuf>,
}

struct TableDiscovered {
    path: PathBuf,
    delimiter: u8,
}

impl<'a> Unvalidated<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path }
    }

    fn validate(self) -> Result<Validated<'a>, IngestError> {
        let file = File::open(self.path)?;
        let archive = zip::ZipArchive::new(file)
            .map_err(|_| IngestError::NotAPackage(self.path.to_path_buf()))?;
        Ok(Validated {
            path: self.path,
            archive,
        })
    }
}

impl Validated<'_> {
    fn extract(mut self, work_dir: &Path) -> Result<Extracted, IngestError> {
        let mut entries = Vec::new();
        for i in 0..self.archive.len() {
            let entry = self.archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            // Записи с абсолютными путями или `..` не извлекаются
            if let Some(name) = entry.enclosed_name() {
                entries.push(name.to_path_buf());
            }
        }

        std::fs::create_dir_all(work_dir)?;
        self.archive.extract(work_dir)?;

        tracing::debug!(
            archive = %self.path.display(),
            target = %work_dir.display(),
            entries = entries.len(),
            "Archive extracted"
        );

        Ok(Extracted {
            root: work_dir.to_path_buf(),
            entries,
        })
    }
}

impl Extracted {
    fn discover(self) -> Result<TableDiscovered, IngestError> {
        let mut tables: Vec<(PathBuf, u8)> = self
            .entries
            .iter()
            .filter(|entry| !entry.starts_with("__MACOSX"))
            .filter_map(|entry| delimiter_for(entry).map(|d| (entry.clone(), d)))
            .collect();

        match tables.len() {
            0 => Err(IngestError::NoTableFound),
            1 => {
                let (entry, delimiter) = tables.remove(0);
                Ok(TableDiscovered {
                    path: self.root.join(entry),
                    delimiter,
                })
            }
            _ => Err(IngestError::AmbiguousTable(
                tables
                    .iter()
                    .map(|(p, _)| p.display().to_string())
                    .collect(),
            )),
        }
    }
}

impl TableDiscovered {
    fn load(self) -> Result<RawTable, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        RawTable::from_records(&headers, &rows).map_err(|e| IngestError::MalformedTable(e.to_string()))
    }
}

/// Разделитель для табличных файлов, `None` для прочих
fn delimiter_for(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(b','),
        "tsv" => Some(b'\t'),
        _ => None,
    }
}

/// Набор стратегий загрузки, выбор по сигнатуре файла
pub struct IngestorRegistry {
    ingestors: Vec<Box<dyn DataIngestor>>,
}

impl IngestorRegistry {
    pub fn new() -> Self {
        Self {
            ingestors: Vec::new(),
        }
    }

    /// Реестр со всеми встроенными форматами
    pub fn with_defaults(work_dir: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ZipIngestor::new(work_dir)));
        registry
    }

    pub fn register(&mut self, ingestor: Box<dyn DataIngestor>) {
        self.ingestors.push(ingestor);
    }

    pub fn resolve(&self, path: &Path) -> Result<&dyn DataIngestor, IngestError> {
        let mut header = Vec::with_capacity(8);
        File::open(path)?.take(8).read_to_end(&mut header)?;

        self.ingestors
            .iter()
            .find(|i| i.accepts(&header))
            .map(|i| i.as_ref())
            .ok_or_else(|| IngestError::UnsupportedFormat(path.to_path_buf()))
    }

    pub fn ingest(&self, path: &Path) -> Result<RawTable, IngestError> {
        let ingestor = self.resolve(path)?;
        tracing::info!(path = %path.display(), format = ingestor.format(), "Selected ingestor");
        ingestor.ingest(path)
    }
}

impl Default for IngestorRegistry {
    fn default() -> Self {
        Self::with_defaults("extracted_data")
    }
}

/// Загрузка датасета встроенными стратегиями
pub fn ingest(path: &Path, work_dir: &Path) -> Result<RawTable, IngestError> {
    IngestorRegistry::with_defaults(work_dir).ingest(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_signature_sniffing() {
        let ingestor = ZipIngestor::new("unused");
        assert!(ingestor.accepts(b"PK\x03\x04rest"));
        assert!(ingestor.accepts(b"PK\x05\x06"));
        assert!(!ingestor.accepts(b"id,price\n"));
        assert!(!ingestor.accepts(b"PK"));
    }

    #[test]
    fn test_delimiter_by_extension() {
        assert_eq!(delimiter_for(Path::new("data/train.CSV")), Some(b','));
        assert_eq!(delimiter_for(Path::new("train.tsv")), Some(b'\t'));
        assert_eq!(delimiter_for(Path::new("readme.txt")), None);
        assert_eq!(delimiter_for(Path::new("noext")), None);
    }

    #[test]
    fn test_discover_ignores_resource_forks() {
        let extracted = Extracted {
            root: PathBuf::from("/tmp/x"),
            entries: vec![
                PathBuf::from("__MACOSX/._houses.csv"),
                PathBuf::from("houses.csv"),
                PathBuf::from("notes.md"),
            ],
        };
        let discovered = extracted.discover().unwrap();
        assert_eq!(discovered.path, PathBuf::from("/tmp/x/houses.csv"));
    }
}
