//! Настройки пайплайна и API сервера
//!
//! Значения берутся из окружения (и `.env`), собираются через [`SettingsBuilder`]
//! и проверяются один раз при `build()`. Готовые [`Settings`] не изменяются.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data::Axis;
use crate::error::ConfigError;
use crate::models::{ModelKind, ParamOverrides};

pub const DEFAULT_ARCHIVE_PATH: &str = "data/archive.zip";
pub const DEFAULT_EXTRACT_DIR: &str = "extracted_data";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
pub const DEFAULT_TARGET_COLUMN: &str = "SalePrice";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    archive_path: PathBuf,
    extract_dir: PathBuf,
    artifact_dir: PathBuf,
    model_kind: ModelKind,
    param_overrides: Option<ParamOverrides>,
    target_column: String,
    missing_axis: Axis,
    missing_threshold: Option<usize>,
    test_size: Option<f64>,
    seed: u64,
    host: String,
    port: u16,
    reload_interval: Option<Duration>,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Настройки из переменных окружения поверх значений по умолчанию
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Разбор настроек из произвольного источника `ключ -> значение`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut builder = Settings::builder();

        if let Some(v) = get("ZIP_FILE_PATH") {
            builder = builder.archive_path(v);
        }
        if let Some(v) = get("EXTRACT_DIR") {
            builder = builder.extract_dir(v);
        }
        if let Some(v) = get("ARTIFACT_DIR") {
            builder = builder.artifact_dir(v);
        }
        if let Some(v) = get("MODEL_TYPE") {
            builder = builder.model_kind(v.parse()?);
        }
        if let Some(v) = get("TARGET_COLUMN") {
            builder = builder.target_column(v);
        }
        if let Some(v) = get("MISSING_AXIS") {
            let axis = v.parse().map_err(|reason| ConfigError::Invalid {
                key: "MISSING_AXIS",
                reason,
            })?;
            builder = builder.missing_axis(axis);
        }
        if let Some(v) = get("MISSING_THRESHOLD") {
            builder = builder.missing_threshold(Some(parse_number("MISSING_THRESHOLD", &v)?));
        }
        if let Some(v) = get("TEST_SIZE") {
            let test_size = match v.to_ascii_lowercase().as_str() {
                "none" | "off" | "0" => None,
                _ => Some(parse_number("TEST_SIZE", &v)?),
            };
            builder = builder.test_size(test_size);
        }
        if let Some(v) = get("HOST") {
            builder = builder.host(v);
        }
        if let Some(v) = get("PORT") {
            builder = builder.port(parse_number("PORT", &v)?);
        }
        if let Some(v) = get("RELOAD_INTERVAL_SECS") {
            let secs: u64 = parse_number("RELOAD_INTERVAL_SECS", &v)?;
            builder = builder.reload_interval((secs > 0).then(|| Duration::from_secs(secs)));
        }

        builder.build()
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model_kind
    }

    pub fn param_overrides(&self) -> Option<&ParamOverrides> {
        self.param_overrides.as_ref()
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn missing_axis(&self) -> Axis {
        self.missing_axis
    }

    pub fn missing_threshold(&self) -> Option<usize> {
        self.missing_threshold
    }

    pub fn test_size(&self) -> Option<f64> {
        self.test_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload_interval
    }

    /// Копия с другим типом модели, остальные поля без изменений
    pub fn with_model_kind(&self, kind: ModelKind) -> Self {
        Self {
            model_kind: kind,
            ..self.clone()
        }
    }

    pub fn with_archive_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: path.into(),
            ..self.clone()
        }
    }

    pub fn with_address(&self, host: Option<String>, port: Option<u16>) -> Result<Self, ConfigError> {
        let mut updated = self.clone();
        if let Some(host) = host {
            updated.host = host;
        }
        if let Some(port) = port {
            updated.port = port;
        }
        updated.validate()?;
        Ok(updated)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let empty_path = |key: &'static str, path: &Path| {
            if path.as_os_str().is_empty() {
                Err(ConfigError::Invalid {
                    key,
                    reason: "path must not be empty".to_string(),
                })
            } else {
                Ok(())
            }
        };
        empty_path("ZIP_FILE_PATH", &self.archive_path)?;
        empty_path("EXTRACT_DIR", &self.extract_dir)?;
        empty_path("ARTIFACT_DIR", &self.artifact_dir)?;

        if self.target_column.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "TARGET_COLUMN",
                reason: "target column must not be empty".to_string(),
            });
        }
        if let Some(test_size) = self.test_size {
            if !(0.1..=0.5).contains(&test_size) {
                return Err(ConfigError::Invalid {
                    key: "TEST_SIZE",
                    reason: format!("{test_size} is outside [0.1, 0.5]"),
                });
            }
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "HOST",
                reason: "host must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                key: "PORT",
                reason: "port must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            archive_path: PathBuf::from(DEFAULT_ARCHIVE_PATH),
            extract_dir: PathBuf::from(DEFAULT_EXTRACT_DIR),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            model_kind: ModelKind::default(),
            param_overrides: None,
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            missing_axis: Axis::Rows,
            missing_threshold: None,
            test_size: Some(DEFAULT_TEST_SIZE),
            seed: DEFAULT_SEED,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reload_interval: None,
        }
    }
}

/// Построитель настроек
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.archive_path = path.into();
        self
    }

    pub fn extract_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.extract_dir = path.into();
        self
    }

    pub fn artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.artifact_dir = path.into();
        self
    }

    pub fn model_kind(mut self, kind: ModelKind) -> Self {
        self.settings.model_kind = kind;
        self
    }

    pub fn param_overrides(mut self, overrides: ParamOverrides) -> Self {
        self.settings.param_overrides = Some(overrides);
        self
    }

    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.settings.target_column = column.into();
        self
    }

    pub fn missing_axis(mut self, axis: Axis) -> Self {
        self.settings.missing_axis = axis;
        self
    }

    pub fn missing_threshold(mut self, threshold: Option<usize>) -> Self {
        self.settings.missing_threshold = threshold;
        self
    }

    /// `None` - обучение на всех строках без отложенной выборки
    pub fn test_size(mut self, test_size: Option<f64>) -> Self {
        self.settings.test_size = test_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.seed = seed;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.settings.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.settings.port = port;
        self
    }

    pub fn reload_interval(mut self, interval: Option<Duration>) -> Self {
        self.settings.reload_interval = interval;
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("'{value}': {e}"),
    })
}
