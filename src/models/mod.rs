//! Стратегии обучения моделей
//!
//! Набор стратегий закрыт: тег модели разрешается в одну из двух реализаций,
//! каждая из которых сама масштабирует признаки перед обучением.

#![allow(non_snake_case)]

pub mod gradient_boosting;
pub mod linear;

use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

pub use gradient_boosting::{BoostingParams, FittedBoostedTrees, GradientBoostedTreeStrategy};
pub use linear::{FittedLinearModel, LinearParams, LinearRegressionStrategy};

/// Переопределения параметров поверх значений по умолчанию
pub type ParamOverrides = serde_json::Map<String, serde_json::Value>;

/// Тип модели
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    GradientBoostedTree,
    LinearRegression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::GradientBoostedTree, ModelKind::LinearRegression];

    pub fn tag(&self) -> &'static str {
        match self {
            ModelKind::GradientBoostedTree => "gradient_boosted_tree",
            ModelKind::LinearRegression => "linear_regression",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gradient_boosted_tree" | "xgboost" => Ok(ModelKind::GradientBoostedTree),
            "linear_regression" => Ok(ModelKind::LinearRegression),
            other => Err(ConfigError::UnknownModelType(other.to_string())),
        }
    }
}

/// Общий интерфейс стратегий обучения
pub trait ModelStrategy: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Итоговые параметры после слияния с переопределениями
    fn params(&self) -> serde_json::Value;

    fn build_and_train(&self, X: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel, ValidationError>;
}

/// Обученная модель любой из стратегий
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    GradientBoostedTree(FittedBoostedTrees),
    LinearRegression(FittedLinearModel),
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::GradientBoostedTree(_) => ModelKind::GradientBoostedTree,
            FittedModel::LinearRegression(_) => ModelKind::LinearRegression,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            FittedModel::GradientBoostedTree(m) => m.n_features(),
            FittedModel::LinearRegression(m) => m.n_features(),
        }
    }

    pub fn params(&self) -> serde_json::Value {
        let params = match self {
            FittedModel::GradientBoostedTree(m) => serde_json::to_value(m.params()),
            FittedModel::LinearRegression(m) => serde_json::to_value(m.params()),
        };
        params.unwrap_or_default()
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>, ValidationError> {
        if X.ncols() != self.n_features() {
            return Err(ValidationError::InvalidInputType(format!(
                "model expects {} features, got {}",
                self.n_features(),
                X.ncols()
            )));
        }
        match self {
            FittedModel::GradientBoostedTree(m) => m.predict(X),
            FittedModel::LinearRegression(m) => m.predict(X),
        }
    }
}

/// Фабрика стратегий по типу модели
pub fn create_strategy(
    kind: ModelKind,
    overrides: Option<&ParamOverrides>,
) -> Result<Box<dyn ModelStrategy>, ConfigError> {
    let strategy: Box<dyn ModelStrategy> = match kind {
        ModelKind::GradientBoostedTree => Box::new(GradientBoostedTreeStrategy::new(overrides)?),
        ModelKind::LinearRegression => Box::new(LinearRegressionStrategy::new(overrides)?),
    };
    Ok(strategy)
}

/// Фабрика стратегий по строковому тегу
pub fn strategy_for_tag(
    tag: &str,
    overrides: Option<&ParamOverrides>,
) -> Result<Box<dyn ModelStrategy>, ConfigError> {
    create_strategy(tag.parse()?, overrides)
}

/// Проверка обучающей выборки перед обучением любой стратегии
pub fn validate_training_data(X: &Array2<f64>, y: &Array1<f64>) -> Result<(), ValidationError> {
    if X.ncols() == 0 {
        return Err(ValidationError::InvalidInputType(
            "feature matrix has no columns".to_string(),
        ));
    }
    if X.nrows() == 0 || y.is_empty() {
        return Err(ValidationError::EmptyData);
    }
    if X.nrows() != y.len() {
        return Err(ValidationError::LengthMismatch {
            features: X.nrows(),
            target: y.len(),
        });
    }
    if let Some(bad) = X.iter().find(|v| !v.is_finite()) {
        return Err(ValidationError::InvalidValue {
            column: "features".to_string(),
            value: bad.to_string(),
        });
    }
    if let Some(bad) = y.iter().find(|v| !v.is_finite()) {
        return Err(ValidationError::InvalidValue {
            column: "target".to_string(),
            value: bad.to_string(),
        });
    }
    Ok(())
}

/// Слияние: переопределения поверх параметров по умолчанию
pub(crate) fn merge_params<P>(defaults: P, overrides: Option<&ParamOverrides>) -> Result<P, ConfigError>
where
    P: Serialize + DeserializeOwned,
{
    let Some(overrides) = overrides else {
        return Ok(defaults);
    };

    let mut merged = match serde_json::to_value(defaults) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return Err(ConfigError::InvalidParams("parameters must be an object".to_string())),
        Err(e) => return Err(ConfigError::InvalidParams(e.to_string())),
    };
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }

    serde_json::from_value(serde_json::Value::Object(merged)).map_err(|e| ConfigError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_tag_resolution() {
        assert_eq!("gradient_boosted_tree".parse::<ModelKind>(), Ok(ModelKind::GradientBoostedTree));
        assert_eq!("xgboost".parse::<ModelKind>(), Ok(ModelKind::GradientBoostedTree));
        assert_eq!("linear_regression".parse::<ModelKind>(), Ok(ModelKind::LinearRegression));
        assert_eq!(
            "random_forest".parse::<ModelKind>(),
            Err(ConfigError::UnknownModelType("random_forest".to_string()))
        );
    }

    #[test]
    fn test_factory_builds_each_kind() {
        for kind in ModelKind::ALL {
            let strategy = create_strategy(kind, None).unwrap();
            assert_eq!(strategy.kind(), kind);
            assert!(strategy.params().is_object());
        }
        assert!(matches!(
            strategy_for_tag("svm", None),
            Err(ConfigError::UnknownModelType(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            validate_training_data(&Array2::zeros((0, 3)), &Array1::zeros(0)),
            Err(ValidationError::EmptyData)
        );
        assert!(matches!(
            validate_training_data(&Array2::zeros((2, 0)), &Array1::zeros(2)),
            Err(ValidationError::InvalidInputType(_))
        ));
        assert!(matches!(
            validate_training_data(&array![[f64::NAN]], &array![1.0]),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_fitted_model_serde() {
        let X = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        for kind in ModelKind::ALL {
            let model = create_strategy(kind, None).unwrap().build_and_train(&X, &y).unwrap();
            let json = serde_json::to_string(&model).unwrap();
            let restored: FittedModel = serde_json::from_str(&json).unwrap();
            assert_eq!(restored.kind(), kind);
            assert_eq!(restored.predict(&X).unwrap(), model.predict(&X).unwrap());
        }
    }

    #[test]
    fn test_predict_checks_width() {
        let model = create_strategy(ModelKind::LinearRegression, None)
            .unwrap()
            .build_and_train(&array![[1.0], [2.0]], &array![1.0, 2.0])
            .unwrap();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }
}
