//! Хранилище артефактов
//!
//! Каталог с файлами `model-<UTC-время>.json`. Запись идёт во временный файл
//! `.<имя>.tmp` с последующим переименованием, поэтому читатель никогда не видит
//! частично записанный артефакт. Существующие файлы не перезаписываются.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;

use super::artifact::{TrainedArtifact, ARTIFACT_FORMAT_VERSION};
use crate::error::StoreError;

const ARTIFACT_PREFIX: &str = "model-";
const ARTIFACT_EXTENSION: &str = ".json";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Сохраняет артефакт под новым уникальным именем и возвращает путь к нему
    pub fn publish(&self, artifact: &TrainedArtifact) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root)?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut name = format!("{ARTIFACT_PREFIX}{stamp}{ARTIFACT_EXTENSION}");
        let mut suffix = 1;
        // `_` сортируется после `.`, порядок имён совпадает с порядком публикации
        while self.root.join(&name).exists() {
            name = format!("{ARTIFACT_PREFIX}{stamp}_{suffix:03}{ARTIFACT_EXTENSION}");
            suffix += 1;
        }

        let path = self.root.join(&name);
        let tmp_path = self.root.join(format!(".{name}.tmp"));
        let json = serde_json::to_vec_pretty(artifact)?;

        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp_path, &path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::info!(
            path = %path.display(),
            model_kind = %artifact.model_kind(),
            "Artifact published"
        );
        Ok(path)
    }

    /// Путь к самому свежему артефакту (по времени изменения, затем по имени)
    pub fn latest_path(&self) -> Result<PathBuf, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoArtifactFound(self.root.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut newest: Option<(SystemTime, String, PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_artifact_name(&name) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified()?;

            let is_newer = match &newest {
                None => true,
                Some((time, best_name, _)) => (modified, &name) > (*time, best_name),
            };
            if is_newer {
                newest = Some((modified, name, entry.path()));
            }
        }

        newest
            .map(|(_, _, path)| path)
            .ok_or_else(|| StoreError::NoArtifactFound(self.root.clone()))
    }

    /// Самый свежий артефакт вместе с путём к нему
    pub fn latest(&self) -> Result<(PathBuf, TrainedArtifact), StoreError> {
        let path = self.latest_path()?;
        let artifact = Self::load(&path)?;
        Ok((path, artifact))
    }

    pub fn load(path: &Path) -> Result<TrainedArtifact, StoreError> {
        let bytes = fs::read(path)?;
        let artifact: TrainedArtifact = serde_json::from_slice(&bytes)?;
        if artifact.format_version() != ARTIFACT_FORMAT_VERSION {
            return Err(StoreError::IncompatibleVersion {
                path: path.to_path_buf(),
                found: artifact.format_version(),
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        tracing::debug!(path = %path.display(), "Artifact loaded");
        Ok(artifact)
    }
}

fn is_artifact_name(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names() {
        assert!(is_artifact_name("model-20240101T000000.000000Z.json"));
        assert!(!is_artifact_name(".model-20240101T000000.000000Z.json.tmp"));
        assert!(!is_artifact_name("notes.json"));
    }

    #[test]
    fn test_missing_root_is_empty_store() {
        let store = ArtifactStore::new("/nonexistent/properchy/artifacts");
        assert!(matches!(store.latest_path(), Err(StoreError::NoArtifactFound(_))));
    }
}
