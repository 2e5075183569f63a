//! Преобразование целевой переменной

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Модель обучается на ln(1 + y), предсказание возвращается через exp(x) - 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    #[default]
    Log1p,
}

impl TargetTransform {
    pub fn forward(&self, y: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y.ln_1p(),
        }
    }

    pub fn inverse(&self, y: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y.exp_m1(),
        }
    }

    /// Прямое преобразование вектора целей; значения вне области определения - ошибка
    pub fn forward_all(&self, column: &str, y: &Array1<f64>) -> Result<Array1<f64>, ValidationError> {
        if let Some(bad) = y.iter().find(|v| !v.is_finite() || **v <= -1.0) {
            return Err(ValidationError::InvalidValue {
                column: column.to_string(),
                value: bad.to_string(),
            });
        }
        Ok(y.mapv(|v| self.forward(v)))
    }

    pub fn inverse_all(&self, y: &Array1<f64>) -> Array1<f64> {
        y.mapv(|v| self.inverse(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_round_trip() {
        let transform = TargetTransform::Log1p;
        for &price in &[0.0, 1.0, 12_789.0, 215_000.0, 755_000.0] {
            let restored = transform.inverse(transform.forward(price));
            assert!((restored - price).abs() <= 1e-9 * price.max(1.0));
        }
    }

    #[test]
    fn test_rejects_out_of_domain_targets() {
        let transform = TargetTransform::Log1p;
        assert!(transform.forward_all("SalePrice", &array![1.0, -1.0]).is_err());
        assert!(transform.forward_all("SalePrice", &array![f64::NAN]).is_err());
        assert_eq!(
            transform.forward_all("SalePrice", &array![0.0]).unwrap(),
            array![0.0]
        );
    }
}
