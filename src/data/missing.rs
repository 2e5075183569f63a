//! Обработка пропущенных значений

use serde::{Deserialize, Serialize};

use crate::data::table::RawTable;
use crate::error::ValidationError;

/// Ось удаления: строки или колонки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Rows,
    Columns,
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rows" | "row" | "0" => Ok(Axis::Rows),
            "columns" | "column" | "1" => Ok(Axis::Columns),
            other => Err(format!("unknown axis: {other}")),
        }
    }
}

/// Итог очистки
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutcome {
    pub table: RawTable,
    pub dropped: usize,
}

/// Удаление строк/колонок, в которых меньше `threshold` заполненных значений.
/// Без порога требуется полная заполненность.
#[derive(Debug, Clone, Copy)]
pub struct DropMissingValues {
    axis: Axis,
    threshold: Option<usize>,
}

impl DropMissingValues {
    pub fn new(axis: Axis, threshold: Option<usize>) -> Self {
        Self { axis, threshold }
    }

    pub fn handle(&self, table: &RawTable) -> Result<CleanOutcome, ValidationError> {
        // Повторная проверка формы: таблица могла быть собрана вне RawTable::new
        if table.columns().iter().any(|c| c.len() != table.n_rows()) {
            return Err(ValidationError::InvalidInputType(
                "columns are not row-aligned".to_string(),
            ));
        }

        tracing::info!(
            axis = ?self.axis,
            threshold = ?self.threshold,
            "Dropping missing values"
        );

        let outcome = match self.axis {
            Axis::Rows => {
                let required = self.threshold.unwrap_or(table.n_cols());
                let keep: Vec<usize> = (0..table.n_rows())
                    .filter(|&i| table.row_present_count(i) >= required)
                    .collect();
                CleanOutcome {
                    dropped: table.n_rows() - keep.len(),
                    table: table.take_rows(&keep),
                }
            }
            Axis::Columns => {
                let required = self.threshold.unwrap_or(table.n_rows());
                let cleaned = table.retain_columns(|c| c.present_count() >= required);
                CleanOutcome {
                    dropped: table.n_cols() - cleaned.n_cols(),
                    table: cleaned,
                }
            }
        };

        tracing::info!(axis = ?self.axis, dropped = outcome.dropped, "Missing values handled");
        Ok(outcome)
    }
}

/// Очистка таблицы; количество удалённого попадает только в лог
pub fn clean(table: &RawTable, axis: Axis, threshold: Option<usize>) -> Result<RawTable, ValidationError> {
    DropMissingValues::new(axis, threshold)
        .handle(table)
        .map(|outcome| outcome.table)
}
