//! Метрики качества регрессии

use linfa::prelude::SingleTargetRegression;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Метрики на шкале цены (после обратного преобразования цели)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    /// Не определён для постоянной цели
    pub r2: Option<f64>,
    pub n_samples: usize,
}

impl RegressionMetrics {
    pub fn compute(predictions: &Array1<f64>, truth: &Array1<f64>) -> Result<Self, ValidationError> {
        if predictions.len() != truth.len() {
            return Err(ValidationError::LengthMismatch {
                features: predictions.len(),
                target: truth.len(),
            });
        }
        if truth.is_empty() {
            return Err(ValidationError::EmptyData);
        }

        let linfa_err = |e: linfa::Error| ValidationError::InvalidInputType(e.to_string());
        let mse = predictions.mean_squared_error(truth).map_err(linfa_err)?;
        let mae = predictions.mean_absolute_error(truth).map_err(linfa_err)?;
        let r2 = predictions.r2(truth).ok().filter(|v| v.is_finite());

        Ok(Self {
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: truth.len(),
        })
    }
}
