//! Обученный артефакт: препроцессор и модель как единое целое

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::RawTable;
use crate::error::ValidationError;
use crate::models::{FittedModel, ModelKind};
use crate::preprocessing::{FittedPreprocessor, TargetTransform};

/// Версия формата сериализованного артефакта
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Неизменяемый результат прогона обучения.
///
/// Препроцессор и модель сохраняются только вместе: предсказание всегда проходит
/// зафиксированную маршрутизацию колонок, модель и обратное преобразование цели.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    format_version: u32,
    model_kind: ModelKind,
    trained_at: DateTime<Utc>,
    target_transform: TargetTransform,
    preprocessor: FittedPreprocessor,
    model: FittedModel,
}

impl TrainedArtifact {
    pub fn assemble(
        preprocessor: FittedPreprocessor,
        model: FittedModel,
        target_transform: TargetTransform,
    ) -> Result<Self, ValidationError> {
        if preprocessor.n_outputs() != model.n_features() {
            return Err(ValidationError::InvalidInputType(format!(
                "preprocessor produces {} features, model expects {}",
                preprocessor.n_outputs(),
                model.n_features()
            )));
        }

        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_kind: model.kind(),
            trained_at: Utc::now(),
            target_transform,
            preprocessor,
            model,
        })
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model_kind
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn target_transform(&self) -> TargetTransform {
        self.target_transform
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Входные колонки в порядке обучения
    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.routing().input_columns()
    }

    /// Предсказание на шкале исходной цели
    pub fn predict(&self, table: &RawTable) -> Result<Array1<f64>, ValidationError> {
        let features = self.preprocessor.transform(table)?;
        let y = self.model.predict(&features)?;
        Ok(self.target_transform.inverse_all(&y))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::data::Column;
    use crate::models::{create_strategy, ModelKind};
    use crate::preprocessing::ColumnPreprocessor;
    use ndarray::array;

    fn table() -> RawTable {
        RawTable::new(vec![
            Column::numeric("area", &[50.0, 80.0, 120.0, 65.0]),
            Column::text("zone", &["RL", "RM", "RL", "FV"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_predict_inverts_target_transform() {
        let prices = array![100_000.0, 160_000.0, 240_000.0, 130_000.0];
        let y = TargetTransform::Log1p.forward_all("price", &prices).unwrap();
        let (X, preprocessor) = ColumnPreprocessor::new().fit_transform(&table(), &y).unwrap();
        let model = create_strategy(ModelKind::LinearRegression, None)
            .unwrap()
            .build_and_train(&X, &y)
            .unwrap();

        let artifact = TrainedArtifact::assemble(preprocessor, model, TargetTransform::Log1p).unwrap();
        assert_eq!(artifact.format_version(), ARTIFACT_FORMAT_VERSION);
        assert_eq!(artifact.model_kind(), ModelKind::LinearRegression);
        assert_eq!(artifact.feature_names(), &["area".to_string(), "zone".to_string()]);

        let predicted = artifact.predict(&table()).unwrap();
        for (p, t) in predicted.iter().zip(prices.iter()) {
            assert!((p - t).abs() / t < 1e-3, "prediction {p} too far from {t}");
        }
    }

    #[test]
    fn test_assemble_checks_width() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let (_, preprocessor) = ColumnPreprocessor::new().fit_transform(&table(), &y).unwrap();
        let model = create_strategy(ModelKind::LinearRegression, None)
            .unwrap()
            .build_and_train(&array![[1.0], [2.0], [3.0], [4.0]], &y)
            .unwrap();

        assert!(TrainedArtifact::assemble(preprocessor, model, TargetTransform::Log1p).is_err());
    }
}
