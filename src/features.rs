//! Контракт признаков модели
//!
//! Упорядоченный список признаков, который ожидает обученный артефакт.
//! Один и тот же список используется при обучении (проекция таблицы) и при
//! инференсе (заполнение запроса значениями по умолчанию).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::table::{Cell, Column, RawTable};
use crate::error::ValidationError;
use crate::types::PredictionInput;

/// Семантический тип признака
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Count,
    Ordinal,
    Categorical,
}

impl FeatureKind {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, FeatureKind::Categorical)
    }
}

/// Описание одного признака
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub kind: FeatureKind,
    /// Значение по умолчанию, используется только при инференсе
    pub default: Cell,
}

impl FeatureDef {
    pub fn new(name: impl Into<String>, kind: FeatureKind, default: impl Into<Cell>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: default.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    features: Vec<FeatureDef>,
    /// Короткие имена из клиентских форм: (alias, canonical)
    aliases: Vec<(String, String)>,
}

impl FeatureSpec {
    pub fn new(features: Vec<FeatureDef>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for feature in &features {
            if !seen.insert(feature.name.as_str()) {
                return Err(ValidationError::InvalidInputType(format!(
                    "duplicate feature '{}'",
                    feature.name
                )));
            }
        }
        Ok(Self {
            features,
            aliases: Vec::new(),
        })
    }

    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), canonical.into()));
        self
    }

    /// 37 числовых признаков датасета Ames Housing
    pub fn housing() -> Self {
        use FeatureKind::*;

        let features = vec![
            FeatureDef::new("PID", Numeric, 1.0),
            FeatureDef::new("MS SubClass", Numeric, 60.0),
            FeatureDef::new("Lot Frontage", Numeric, 70.0),
            FeatureDef::new("Lot Area", Numeric, 10000.0),
            FeatureDef::new("Overall Qual", Ordinal, 5.0),
            FeatureDef::new("Overall Cond", Ordinal, 5.0),
            FeatureDef::new("Year Built", Numeric, 2000.0),
            FeatureDef::new("Year Remod/Add", Numeric, 2000.0),
            FeatureDef::new("Mas Vnr Area", Numeric, 0.0),
            FeatureDef::new("BsmtFin SF 1", Numeric, 0.0),
            FeatureDef::new("BsmtFin SF 2", Numeric, 0.0),
            FeatureDef::new("Bsmt Unf SF", Numeric, 0.0),
            FeatureDef::new("Total Bsmt SF", Numeric, 0.0),
            FeatureDef::new("1st Flr SF", Numeric, 1000.0),
            FeatureDef::new("2nd Flr SF", Numeric, 0.0),
            FeatureDef::new("Low Qual Fin SF", Numeric, 0.0),
            FeatureDef::new("Gr Liv Area", Numeric, 1500.0),
            FeatureDef::new("Bsmt Full Bath", Count, 0.0),
            FeatureDef::new("Bsmt Half Bath", Count, 0.0),
            FeatureDef::new("Full Bath", Count, 2.0),
            FeatureDef::new("Half Bath", Count, 0.0),
            FeatureDef::new("Bedroom AbvGr", Count, 3.0),
            FeatureDef::new("Kitchen AbvGr", Count, 1.0),
            FeatureDef::new("TotRms AbvGrd", Count, 6.0),
            FeatureDef::new("Fireplaces", Count, 0.0),
            FeatureDef::new("Garage Yr Blt", Numeric, 2000.0),
            FeatureDef::new("Garage Cars", Count, 2.0),
            FeatureDef::new("Garage Area", Numeric, 400.0),
            FeatureDef::new("Wood Deck SF", Numeric, 0.0),
            FeatureDef::new("Open Porch SF", Numeric, 0.0),
            FeatureDef::new("Enclosed Porch", Numeric, 0.0),
            FeatureDef::new("3Ssn Porch", Numeric, 0.0),
            FeatureDef::new("Screen Porch", Numeric, 0.0),
            FeatureDef::new("Pool Area", Numeric, 0.0),
            FeatureDef::new("Misc Val", Numeric, 0.0),
            FeatureDef::new("Mo Sold", Ordinal, 6.0),
            FeatureDef::new("Yr Sold", Numeric, 2026.0),
        ];

        Self {
            features,
            aliases: Vec::new(),
        }
        .with_alias("GrLivArea", "Gr Liv Area")
        .with_alias("LotArea", "Lot Area")
        .with_alias("OverallQual", "Overall Qual")
        .with_alias("YearBuilt", "Year Built")
        .with_alias("BedroomAbvGr", "Bedroom AbvGr")
        .with_alias("FullBath", "Full Bath")
        .with_alias("TotRmsAbvGrd", "TotRms AbvGrd")
        .with_alias("GarageCars", "Garage Cars")
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureDef] {
        &self.features
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureDef> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Каноническое имя для ключа запроса (alias или само имя)
    pub fn canonical_name<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        let mapped = self
            .aliases
            .iter()
            .find(|(alias, _)| alias == key)
            .map(|(_, canonical)| canonical.as_str())
            .unwrap_or(key);
        self.get(mapped).map(|f| f.name.as_str())
    }

    /// Однострочная таблица в порядке контракта: значения запроса поверх значений по умолчанию
    pub fn fill(&self, input: &PredictionInput) -> Result<RawTable, ValidationError> {
        let mut row: Vec<Cell> = self.features.iter().map(|f| f.default.clone()).collect();

        for (key, value) in input.iter() {
            let Some(name) = self.canonical_name(key) else {
                tracing::debug!(key = %key, "Ignoring unknown feature");
                continue;
            };
            let Some(index) = self.features.iter().position(|f| f.name == name) else {
                continue;
            };
            row[index] = cell_from_json(&self.features[index], value)?;
        }

        let columns = self
            .features
            .iter()
            .zip(row)
            .map(|(feature, cell)| Column::new(feature.name.clone(), vec![cell]))
            .collect();
        RawTable::new(columns)
    }
}

fn cell_from_json(feature: &FeatureDef, value: &serde_json::Value) -> Result<Cell, ValidationError> {
    let invalid = || ValidationError::InvalidValue {
        column: feature.name.clone(),
        value: value.to_string(),
    };

    match value {
        serde_json::Value::Null => Ok(Cell::Missing),
        // Для категориального признака число станет меткой при кодировании
        serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).ok_or_else(invalid),
        serde_json::Value::String(s) if feature.kind.is_numeric() => {
            s.trim().parse::<f64>().map(Cell::Number).map_err(|_| invalid())
        }
        serde_json::Value::String(s) => Ok(Cell::Text(s.clone())),
        _ => Err(invalid()),
    }
}
