//! Табличное представление сырых данных

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Строковые маркеры пропущенного значения
pub const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "#N/A", "None",
];

/// Значение ячейки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(v) => v.is_nan(),
            Cell::Text(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Текстовое представление значения (для категориальных колонок)
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(v) if !v.is_nan() => Some(format_number(*v)),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Именованная колонка
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn numeric(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|&v| Cell::Number(v)).collect())
    }

    pub fn text(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(name, values.iter().map(|&s| Cell::from(s)).collect())
    }

    /// Колонка из сырых строк: числовая, если все непустые значения парсятся как f64
    pub fn from_raw(name: impl Into<String>, raw: &[String]) -> Self {
        let all_numeric = raw
            .iter()
            .filter(|s| !is_missing_marker(s))
            .all(|s| s.trim().parse::<f64>().is_ok());

        let cells = raw
            .iter()
            .map(|s| {
                if is_missing_marker(s) {
                    Cell::Missing
                } else if all_numeric {
                    s.trim().parse::<f64>().map(Cell::Number).unwrap_or(Cell::Missing)
                } else {
                    Cell::Text(s.trim().to_string())
                }
            })
            .collect();

        Self::new(name, cells)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_missing()).count()
    }

    /// Есть ли среди значений текстовые метки
    pub fn has_text(&self) -> bool {
        self.cells.iter().any(|c| matches!(c, Cell::Text(_)))
    }
}

/// Упорядоченный набор колонок одинаковой длины
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl RawTable {
    pub fn new(columns: Vec<Column>) -> Result<Self, ValidationError> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(ValidationError::InvalidInputType(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    n_rows
                )));
            }
            if !seen.insert(column.name()) {
                return Err(ValidationError::InvalidInputType(format!(
                    "duplicate column '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Таблица из заголовка и строк, типы колонок выводятся по значениям
    pub fn from_records(headers: &[String], rows: &[Vec<String>]) -> Result<Self, ValidationError> {
        let mut columns = Vec::with_capacity(headers.len());
        for (j, name) in headers.iter().enumerate() {
            let raw: Vec<String> = rows
                .iter()
                .map(|row| row.get(j).cloned().unwrap_or_default())
                .collect();
            columns.push(Column::from_raw(name.trim(), &raw));
        }
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Проекция на заданные колонки в заданном порядке
    pub fn select(&self, names: &[&str]) -> Result<RawTable, ValidationError> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| ValidationError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        RawTable::new(columns)
    }

    /// Новая таблица из строк с указанными индексами
    pub fn take_rows(&self, indices: &[usize]) -> RawTable {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name(),
                    indices
                        .iter()
                        .filter_map(|&i| c.cells.get(i).cloned())
                        .collect(),
                )
            })
            .collect();
        let n_rows = indices.iter().filter(|&&i| i < self.n_rows).count();
        RawTable { columns, n_rows }
    }

    /// Новая таблица только с колонками, для которых `keep` вернул true
    pub fn retain_columns<F: Fn(&Column) -> bool>(&self, keep: F) -> RawTable {
        let columns: Vec<Column> = self.columns.iter().filter(|c| keep(c)).cloned().collect();
        let n_rows = if columns.is_empty() { 0 } else { self.n_rows };
        RawTable { columns, n_rows }
    }

    /// Разделение на признаки и целевую колонку
    pub fn split_target(&self, target: &str) -> Result<(RawTable, Column), ValidationError> {
        let target_column = self
            .column(target)
            .cloned()
            .ok_or_else(|| ValidationError::MissingColumn(target.to_string()))?;
        let features = self.retain_columns(|c| c.name() != target);
        Ok((features, target_column))
    }

    /// Количество непропущенных значений в строке
    pub fn row_present_count(&self, row: usize) -> usize {
        self.columns
            .iter()
            .filter(|c| c.cells.get(row).is_some_and(|cell| !cell.is_missing()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_column_type_inference() {
        let numeric = Column::from_raw("area", &strings(&["1500", "NA", " 2000.5"]));
        assert_eq!(
            numeric.cells(),
            &[Cell::Number(1500.0), Cell::Missing, Cell::Number(2000.5)]
        );
        assert!(!numeric.has_text());

        let text = Column::from_raw("zone", &strings(&["RL", "", "120"]));
        assert_eq!(
            text.cells(),
            &[Cell::from("RL"), Cell::Missing, Cell::from("120")]
        );
        assert!(text.has_text());
    }

    #[test]
    fn test_ragged_table_rejected() {
        let result = RawTable::new(vec![
            Column::numeric("a", &[1.0, 2.0]),
            Column::numeric("b", &[1.0]),
        ]);
        assert!(matches!(result, Err(ValidationError::InvalidInputType(_))));
    }

    #[test]
    fn test_select_and_split_target() {
        let table = RawTable::new(vec![
            Column::numeric("a", &[1.0, 2.0]),
            Column::text("b", &["x", "y"]),
            Column::numeric("price", &[10.0, 20.0]),
        ])
        .unwrap();

        let selected = table.select(&["b", "a"]).unwrap();
        assert_eq!(selected.column_names(), vec!["b", "a"]);
        assert_eq!(
            table.select(&["missing"]),
            Err(ValidationError::MissingColumn("missing".to_string()))
        );

        let (features, target) = table.split_target("price").unwrap();
        assert_eq!(features.column_names(), vec!["a", "b"]);
        assert_eq!(target.present_count(), 2);
    }

    #[test]
    fn test_numeric_label() {
        assert_eq!(Cell::Number(60.0).as_label().as_deref(), Some("60"));
        assert_eq!(Cell::Number(2.5).as_label().as_deref(), Some("2.5"));
        assert_eq!(Cell::Missing.as_label(), None);
    }
}
