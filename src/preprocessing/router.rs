//! Маршрутизация колонок и препроцессинг
//!
//! На этапе обучения колонки делятся на числовые и категориальные по
//! наблюдаемым значениям. Разбиение, средние, моды и словари категорий
//! фиксируются в [`FittedPreprocessor`] и без изменений применяются при
//! инференсе, даже если тип нового значения подсказывает иное.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::table::{Cell, Column, RawTable};
use crate::error::ValidationError;

/// Зафиксированное разбиение входных колонок
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRouting {
    input_columns: Vec<String>,
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl ColumnRouting {
    /// Колонка категориальная, если среди её значений есть текстовые метки
    pub fn detect(table: &RawTable) -> Self {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for column in table.columns() {
            if column.has_text() {
                categorical.push(column.name().to_string());
            } else {
                numeric.push(column.name().to_string());
            }
        }

        Self {
            input_columns: table.column_names().iter().map(|s| s.to_string()).collect(),
            numeric,
            categorical,
        }
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    fn check_columns(&self, table: &RawTable) -> Result<(), ValidationError> {
        let found = table.column_names();
        if found != self.input_columns {
            return Err(ValidationError::SchemaMismatch {
                expected: self.input_columns.clone(),
                found: found.iter().map(|s| s.to_string()).collect(),
            });
        }
        Ok(())
    }
}

/// Импутация категориальной колонки модой и one-hot словарь
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub column: String,
    pub fill: String,
    /// Отсортированные категории, порядок задаёт порядок индикаторов
    pub categories: Vec<String>,
}

impl CategoryEncoding {
    fn fit(column: &Column) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for label in column.cells().iter().filter_map(Cell::as_label) {
            *counts.entry(label).or_insert(0) += 1;
        }

        // При равенстве частот побеждает меньшая метка
        let mut fill = String::new();
        let mut best = 0;
        for (label, &count) in &counts {
            if count > best {
                best = count;
                fill = label.clone();
            }
        }

        let categories: BTreeSet<String> = counts.into_keys().collect();
        Self {
            column: column.name().to_string(),
            fill,
            categories: categories.into_iter().collect(),
        }
    }

    /// Индекс индикатора; неизвестная категория даёт `None` (нулевой вектор)
    fn index_of(&self, cell: &Cell) -> Option<usize> {
        let label = cell.as_label().unwrap_or_else(|| self.fill.clone());
        self.categories.binary_search(&label).ok()
    }
}

/// Обученное состояние препроцессора
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    routing: ColumnRouting,
    numeric_fill: Vec<f64>,
    encodings: Vec<CategoryEncoding>,
}

impl FittedPreprocessor {
    pub fn routing(&self) -> &ColumnRouting {
        &self.routing
    }

    pub fn numeric_fill(&self) -> &[f64] {
        &self.numeric_fill
    }

    pub fn encodings(&self) -> &[CategoryEncoding] {
        &self.encodings
    }

    /// Ширина выходной матрицы
    pub fn n_outputs(&self) -> usize {
        self.numeric_fill.len() + self.encodings.iter().map(|e| e.categories.len()).sum::<usize>()
    }

    /// Имена выходных колонок: сначала числовые, затем `колонка_категория`
    pub fn output_names(&self) -> Vec<String> {
        let mut names = self.routing.numeric.clone();
        for encoding in &self.encodings {
            for category in &encoding.categories {
                names.push(format!("{}_{}", encoding.column, category));
            }
        }
        names
    }

    pub fn transform(&self, table: &RawTable) -> Result<Array2<f64>, ValidationError> {
        if table.n_rows() == 0 {
            return Err(ValidationError::EmptyData);
        }
        self.routing.check_columns(table)?;

        let mut out = Array2::zeros((table.n_rows(), self.n_outputs()));

        for (j, (name, &fill)) in self.routing.numeric.iter().zip(&self.numeric_fill).enumerate() {
            let column = table
                .column(name)
                .ok_or_else(|| ValidationError::MissingColumn(name.clone()))?;
            for (i, cell) in column.cells().iter().enumerate() {
                out[[i, j]] = numeric_value(name, cell, fill)?;
            }
        }

        let mut offset = self.numeric_fill.len();
        for encoding in &self.encodings {
            let column = table
                .column(&encoding.column)
                .ok_or_else(|| ValidationError::MissingColumn(encoding.column.clone()))?;
            for (i, cell) in column.cells().iter().enumerate() {
                if let Some(k) = encoding.index_of(cell) {
                    out[[i, offset + k]] = 1.0;
                }
            }
            offset += encoding.categories.len();
        }

        Ok(out)
    }
}

fn numeric_value(column: &str, cell: &Cell, fill: f64) -> Result<f64, ValidationError> {
    match cell {
        Cell::Missing => Ok(fill),
        Cell::Number(v) if v.is_nan() => Ok(fill),
        Cell::Number(v) => Ok(*v),
        Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| ValidationError::InvalidValue {
            column: column.to_string(),
            value: s.clone(),
        }),
    }
}

/// Препроцессор колонок: импутация средним/модой и one-hot кодирование
#[derive(Debug, Clone, Default)]
pub struct ColumnPreprocessor {
    expected_columns: Option<Vec<String>>,
}

impl ColumnPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Перед обучением проверять, что колонки совпадают с контрактом признаков
    pub fn with_expected_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn fit(&self, table: &RawTable, target: &Array1<f64>) -> Result<FittedPreprocessor, ValidationError> {
        if table.n_cols() == 0 {
            return Err(ValidationError::InvalidInputType(
                "table has no feature columns".to_string(),
            ));
        }
        if table.n_rows() == 0 {
            return Err(ValidationError::EmptyData);
        }
        if table.n_rows() != target.len() {
            return Err(ValidationError::LengthMismatch {
                features: table.n_rows(),
                target: target.len(),
            });
        }
        if let Some(expected) = &self.expected_columns {
            let found = table.column_names();
            if found != *expected {
                return Err(ValidationError::SchemaMismatch {
                    expected: expected.clone(),
                    found: found.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        let routing = ColumnRouting::detect(table);
        tracing::info!(
            numeric = ?routing.numeric,
            categorical = ?routing.categorical,
            "Column routing fixed"
        );

        let mut numeric_fill = Vec::with_capacity(routing.numeric.len());
        for name in &routing.numeric {
            let column = table
                .column(name)
                .ok_or_else(|| ValidationError::MissingColumn(name.clone()))?;
            numeric_fill.push(column_mean(column));
        }

        let mut encodings = Vec::with_capacity(routing.categorical.len());
        for name in &routing.categorical {
            let column = table
                .column(name)
                .ok_or_else(|| ValidationError::MissingColumn(name.clone()))?;
            encodings.push(CategoryEncoding::fit(column));
        }

        Ok(FittedPreprocessor {
            routing,
            numeric_fill,
            encodings,
        })
    }

    pub fn fit_transform(
        &self,
        table: &RawTable,
        target: &Array1<f64>,
    ) -> Result<(Array2<f64>, FittedPreprocessor), ValidationError> {
        let fitted = self.fit(table, target)?;
        let matrix = fitted.transform(table)?;
        tracing::info!(
            rows = matrix.nrows(),
            features_in = table.n_cols(),
            features_out = matrix.ncols(),
            "Preprocessing complete"
        );
        Ok((matrix, fitted))
    }
}

/// Среднее непропущенных значений; для полностью пустой колонки - 0
fn column_mean(column: &Column) -> f64 {
    let values: Vec<f64> = column.cells().iter().filter_map(Cell::as_f64).collect();
    if values.is_empty() {
        tracing::warn!(column = column.name(), "Column has no values, imputing 0");
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> RawTable {
        RawTable::new(vec![
            Column::new(
                "area",
                vec![Cell::Number(100.0), Cell::Missing, Cell::Number(300.0), Cell::Number(200.0)],
            ),
            Column::new(
                "zone",
                vec![Cell::from("RM"), Cell::from("RL"), Cell::Missing, Cell::from("RL")],
            ),
        ])
        .unwrap()
    }

    fn target() -> Array1<f64> {
        array![1.0, 2.0, 3.0, 4.0]
    }

    #[test]
    fn test_routing_and_imputation() {
        let (matrix, fitted) = ColumnPreprocessor::new().fit_transform(&sample(), &target()).unwrap();

        assert_eq!(fitted.routing().numeric(), &["area".to_string()]);
        assert_eq!(fitted.routing().categorical(), &["zone".to_string()]);
        assert_eq!(fitted.output_names(), vec!["area", "zone_RL", "zone_RM"]);

        // Пропуск в числовой колонке заменён средним (200), в категориальной - модой (RL)
        let expected = array![
            [100.0, 0.0, 1.0],
            [200.0, 1.0, 0.0],
            [300.0, 1.0, 0.0],
            [200.0, 1.0, 0.0],
        ];
        assert_eq!(matrix, expected);
    }

    #[test]
    fn test_transform_replays_fit() {
        let table = sample();
        let (matrix, fitted) = ColumnPreprocessor::new().fit_transform(&table, &target()).unwrap();
        assert_eq!(fitted.transform(&table).unwrap(), matrix);
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let (_, fitted) = ColumnPreprocessor::new().fit_transform(&sample(), &target()).unwrap();
        let serving = RawTable::new(vec![
            Column::numeric("area", &[150.0]),
            Column::text("zone", &["FV"]),
        ])
        .unwrap();

        let row = fitted.transform(&serving).unwrap();
        assert_eq!(row, array![[150.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_routing_is_frozen_at_serve_time() {
        let (_, fitted) = ColumnPreprocessor::new().fit_transform(&sample(), &target()).unwrap();
        // Числовая строка в числовой колонке парсится, число в категориальной - становится меткой
        let serving = RawTable::new(vec![
            Column::text("area", &["250"]),
            Column::numeric("zone", &[7.0]),
        ])
        .unwrap();
        assert_eq!(fitted.transform(&serving).unwrap(), array![[250.0, 0.0, 0.0]]);

        let bad = RawTable::new(vec![
            Column::text("area", &["large"]),
            Column::text("zone", &["RL"]),
        ])
        .unwrap();
        assert!(matches!(
            fitted.transform(&bad),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validation_errors() {
        let preprocessor = ColumnPreprocessor::new();

        let empty = RawTable::new(vec![Column::numeric("area", &[])]).unwrap();
        assert_eq!(
            preprocessor.fit(&empty, &Array1::zeros(0)),
            Err(ValidationError::EmptyData)
        );

        assert_eq!(
            preprocessor.fit(&sample(), &array![1.0, 2.0]),
            Err(ValidationError::LengthMismatch { features: 4, target: 2 })
        );

        let no_columns = RawTable::new(vec![]).unwrap();
        assert!(matches!(
            preprocessor.fit(&no_columns, &Array1::zeros(0)),
            Err(ValidationError::InvalidInputType(_))
        ));
    }

    #[test]
    fn test_expected_columns_asserted() {
        let preprocessor = ColumnPreprocessor::new().with_expected_columns(["zone", "area"]);
        assert!(matches!(
            preprocessor.fit(&sample(), &target()),
            Err(ValidationError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_transform_rejects_reordered_columns() {
        let (_, fitted) = ColumnPreprocessor::new().fit_transform(&sample(), &target()).unwrap();
        let reordered = sample().select(&["zone", "area"]).unwrap();
        assert!(matches!(
            fitted.transform(&reordered),
            Err(ValidationError::SchemaMismatch { .. })
        ));
    }
}
