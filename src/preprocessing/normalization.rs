//! Нормализация данных

#![allow(non_snake_case)]

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Стандартизация признаков: (x - mean) / std
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNormalizer {
    mean: Option<Vec<f64>>,
    std: Option<Vec<f64>>,
}

impl DataNormalizer {
    pub fn new() -> Self {
        Self {
            mean: None,
            std: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.std.is_some()
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<(), ValidationError> {
        if X.nrows() == 0 {
            return Err(ValidationError::EmptyData);
        }

        // Среднее и стандартное отклонение по каждому признаку
        let mean = X.mean_axis(Axis(0)).ok_or(ValidationError::EmptyData)?;
        let mut std = X.std_axis(Axis(0), 0.0);

        // Избегаем деления на ноль
        for val in std.iter_mut() {
            if *val < 1e-10 {
                *val = 1.0;
            }
        }

        self.mean = Some(mean.to_vec());
        self.std = Some(std.to_vec());
        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>, ValidationError> {
        let (mean, std) = match (&self.mean, &self.std) {
            (Some(mean), Some(std)) => (mean, std),
            _ => {
                return Err(ValidationError::InvalidInputType(
                    "normalizer not fitted".to_string(),
                ))
            }
        };

        if X.ncols() != mean.len() {
            return Err(ValidationError::InvalidInputType(format!(
                "expected {} features, got {}",
                mean.len(),
                X.ncols()
            )));
        }

        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - mean[i]) / std[i];
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>, ValidationError> {
        self.fit(X)?;
        self.transform(X)
    }
}

impl Default for DataNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
