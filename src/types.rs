/// Типы данных запросов и ответов

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Признаки из запроса: подмножество контракта, возможно под короткими именами
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionInput(BTreeMap<String, serde_json::Value>);

impl PredictionInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// Предсказанная цена
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub predicted_price: f64,
    pub formatted_price: String,
}

impl PredictionOutput {
    /// Цена не бывает отрицательной
    pub fn from_price(price: f64) -> Self {
        let price = if price.is_finite() { price.max(0.0) } else { 0.0 };
        Self {
            predicted_price: price,
            formatted_price: format_price(price),
        }
    }
}

/// `$1,234,567.89`
pub fn format_price(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub predicted_price: f64,
    pub formatted_price: String,
}

impl From<PredictionOutput> for PredictResponse {
    fn from(output: PredictionOutput) -> Self {
        Self {
            success: true,
            predicted_price: output.predicted_price,
            formatted_price: output.formatted_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesResponse {
    pub features: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub model_path: String,
}
