//! Линейная регрессия

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{merge_params, validate_training_data, FittedModel, ModelKind, ModelStrategy, ParamOverrides};
use crate::error::{ConfigError, ValidationError};
use crate::preprocessing::DataNormalizer;

/// Параметры линейной регрессии
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearParams {
    pub fit_intercept: bool,
    /// Небольшая L2-добавка к диагонали: one-hot блоки коллинеарны со свободным членом
    pub alpha: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            alpha: 1e-6,
        }
    }
}

/// Обученная линейная модель со своим шагом масштабирования
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLinearModel {
    params: LinearParams,
    scaler: DataNormalizer,
    weights: Vec<f64>,
    intercept: f64,
}

impl FittedLinearModel {
    pub fn params(&self) -> &LinearParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>, ValidationError> {
        let X_scaled = self.scaler.transform(X)?;
        let weights = Array1::from_vec(self.weights.clone());
        Ok(X_scaled.dot(&weights) + self.intercept)
    }
}

/// Стратегия: стандартизация + линейная регрессия
#[derive(Debug, Clone)]
pub struct LinearRegressionStrategy {
    params: LinearParams,
}

impl LinearRegressionStrategy {
    pub fn new(overrides: Option<&ParamOverrides>) -> Result<Self, ConfigError> {
        let params: LinearParams = merge_params(LinearParams::default(), overrides)?;
        if !(params.alpha >= 0.0) {
            return Err(ConfigError::InvalidParams("alpha must be non-negative".to_string()));
        }
        tracing::info!(?params, "Initialized LinearRegressionStrategy");
        Ok(Self { params })
    }
}

impl ModelStrategy for LinearRegressionStrategy {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearRegression
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_default()
    }

    fn build_and_train(&self, X: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel, ValidationError> {
        validate_training_data(X, y)?;

        tracing::info!("Training linear regression");
        let mut scaler = DataNormalizer::new();
        let X_scaled = scaler.fit_transform(X)?;

        let (x_mean, y_mean) = if self.params.fit_intercept {
            (
                X_scaled.mean_axis(Axis(0)).ok_or(ValidationError::EmptyData)?,
                y.mean().ok_or(ValidationError::EmptyData)?,
            )
        } else {
            (Array1::zeros(X_scaled.ncols()), 0.0)
        };

        let X_centered = &X_scaled - &x_mean;
        let y_centered = y.mapv(|v| v - y_mean);

        // (X^T X + αI) w = X^T y
        let mut xtx = X_centered.t().dot(&X_centered);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += self.params.alpha;
        }
        let xty = X_centered.t().dot(&y_centered);

        let weights = solve_linear_system(&xtx, &xty)?;
        let intercept = y_mean - x_mean.dot(&weights);

        tracing::info!(intercept, features = weights.len(), "Model training completed");
        Ok(FittedModel::LinearRegression(FittedLinearModel {
            params: self.params.clone(),
            scaler,
            weights: weights.to_vec(),
            intercept,
        }))
    }
}

/// Метод Гаусса с выбором главного элемента
fn solve_linear_system(A: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ValidationError> {
    let n = A.nrows();
    let mut augmented = Array2::zeros((n, n + 1));

    for i in 0..n {
        for j in 0..n {
            augmented[[i, j]] = A[[i, j]];
        }
        augmented[[i, n]] = b[i];
    }

    // Прямой ход
    for i in 0..n {
        let mut max_row = i;
        let mut max_val = augmented[[i, i]].abs();
        for k in (i + 1)..n {
            if augmented[[k, i]].abs() > max_val {
                max_val = augmented[[k, i]].abs();
                max_row = k;
            }
        }

        if max_row != i {
            for j in 0..=n {
                augmented.swap([i, j], [max_row, j]);
            }
        }

        let pivot = augmented[[i, i]];
        if pivot.abs() < 1e-12 {
            return Err(ValidationError::InvalidInputType(
                "design matrix is singular, increase alpha".to_string(),
            ));
        }

        for k in (i + 1)..n {
            let factor = augmented[[k, i]] / pivot;
            for j in i..=n {
                augmented[[k, j]] -= factor * augmented[[i, j]];
            }
        }
    }

    // Обратный ход
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = augmented[[i, n]];
        for j in (i + 1)..n {
            sum -= augmented[[i, j]] * x[j];
        }
        x[i] = sum / augmented[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_linear_relation() {
        let X = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y = X.column(0).mapv(|v| 3.0 * v) + X.column(1).mapv(|v| -2.0 * v) + 7.0;

        let strategy = LinearRegressionStrategy::new(None).unwrap();
        let model = strategy.build_and_train(&X, &y).unwrap();
        let predictions = model.predict(&X).unwrap();

        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3, "prediction {p} too far from {t}");
        }
    }

    #[test]
    fn test_collinear_one_hot_columns() {
        // Две индикаторные колонки в сумме дают константу
        let X = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let y = array![5.0, 9.0, 5.0, 9.0];

        let model = LinearRegressionStrategy::new(None)
            .unwrap()
            .build_and_train(&X, &y)
            .unwrap();
        let predictions = model.predict(&X).unwrap();
        assert!((predictions[0] - 5.0).abs() < 1e-3);
        assert!((predictions[1] - 9.0).abs() < 1e-3);
    }

    #[test]
    fn test_length_mismatch() {
        let strategy = LinearRegressionStrategy::new(None).unwrap();
        let result = strategy.build_and_train(&array![[1.0], [2.0]], &array![1.0]);
        assert_eq!(
            result.err(),
            Some(ValidationError::LengthMismatch { features: 2, target: 1 })
        );
    }

    #[test]
    fn test_singular_system() {
        let A = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(solve_linear_system(&A, &array![1.0, 1.0]).is_err());
    }
}
