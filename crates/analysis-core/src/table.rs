use polars::prelude::*;

use crate::{columns, AnalysisError, Diagnostics, SkipReason, StageKind};

/// A column to be derived from existing numeric columns
#[derive(Debug, Clone, Copy)]
pub struct Derivation<'a> {
    pub stage: StageKind,
    /// Human-readable metric name used in diagnostics
    pub metric: &'a str,
    pub output: &'a str,
    pub required: &'a [&'a str],
}

/// Entity table: one row per company, backed by a polars `DataFrame`.
///
/// Tables are moved between stages. Every stage consumes a table and returns
/// a new one with zero or more columns appended; rows are never removed.
/// Numeric columns are `Float64`, and both null and NaN cells read as missing.
#[derive(Debug, Clone)]
pub struct FinancialTable {
    rows: usize,
    frame: DataFrame,
}

impl FinancialTable {
    /// Empty table with a fixed number of rows
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            frame: DataFrame::empty(),
        }
    }

    pub fn from_frame(frame: DataFrame) -> Self {
        Self {
            rows: frame.height(),
            frame,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.frame.get_columns().iter().map(|c| c.name().as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    fn float_column(&self, name: &str) -> Option<&Float64Chunked> {
        self.frame
            .column(name)
            .ok()?
            .as_materialized_series()
            .f64()
            .ok()
    }

    /// Numeric column with missing cells as NaN
    pub fn numbers(&self, name: &str) -> Option<Vec<f64>> {
        self.float_column(name)
            .map(|ca| ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }

    pub fn flags(&self, name: &str) -> Option<Vec<bool>> {
        let ca = self.frame.column(name).ok()?.as_materialized_series().bool().ok()?;
        Some(ca.into_iter().map(|v| v.unwrap_or(false)).collect())
    }

    /// Value of a numeric cell, `None` when the column is absent or the cell is missing
    pub fn number_at(&self, name: &str, row: usize) -> Option<f64> {
        if row >= self.rows {
            return None;
        }
        self.float_column(name)?.get(row).filter(|v| !v.is_nan())
    }

    /// Entity label for a row (the `Company` column)
    pub fn entity_name(&self, row: usize) -> Option<&str> {
        if row >= self.rows {
            return None;
        }
        self.frame
            .column(columns::COMPANY)
            .ok()?
            .as_materialized_series()
            .str()
            .ok()?
            .get(row)
    }

    /// Required columns that are absent or not numeric, in request order
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.float_column(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// Evaluate a boolean expression per row; null counts as `false`.
    pub fn mask(&self, predicate: Expr) -> Result<Vec<bool>, AnalysisError> {
        let evaluated = self
            .frame
            .clone()
            .lazy()
            .select([predicate.fill_null(lit(false)).alias("mask")])
            .collect()?;
        let mask = evaluated.column("mask")?.as_materialized_series().bool()?;
        Ok(mask.into_iter().map(|v| v.unwrap_or(false)).collect())
    }

    pub fn with_numbers(self, name: &str, values: Vec<f64>) -> Result<Self, AnalysisError> {
        self.with_column(Column::new(name.into(), values))
    }

    pub fn with_flags(self, name: &str, values: Vec<bool>) -> Result<Self, AnalysisError> {
        self.with_column(Column::new(name.into(), values))
    }

    pub fn with_text(self, name: &str, values: Vec<String>) -> Result<Self, AnalysisError> {
        self.with_column(Column::new(name.into(), values))
    }

    /// Append a column, or replace an existing column of the same name in place.
    pub fn with_column(self, column: Column) -> Result<Self, AnalysisError> {
        if column.len() != self.rows {
            return Err(AnalysisError::LengthMismatch {
                column: column.name().to_string(),
                expected: self.rows,
                actual: column.len(),
            });
        }
        let Self { rows, mut frame } = self;
        frame.with_column(column)?;
        Ok(Self { rows, frame })
    }

    /// Broadcast one value to every row of a numeric column.
    pub fn with_constant(self, name: &str, value: f64) -> Result<Self, AnalysisError> {
        let values = vec![value; self.rows];
        self.with_numbers(name, values)
    }

    /// Raise a flag on every row set in `mask`.
    ///
    /// Creates the flag column when absent. Flags that are already set stay set.
    pub fn raise_flags(self, name: &str, mask: &[bool]) -> Result<Self, AnalysisError> {
        let previous = self.flags(name).unwrap_or_else(|| vec![false; self.rows]);
        let values = previous
            .iter()
            .zip(mask)
            .map(|(was, now)| *was || *now)
            .collect();
        self.with_flags(name, values)
    }

    /// Set every row of a flag column to `false`, creating it when absent.
    pub fn clear_flags(self, name: &str) -> Result<Self, AnalysisError> {
        let values = vec![false; self.rows];
        self.with_flags(name, values)
    }

    /// Add `derivation.output` computed by `expr` over the required columns.
    ///
    /// If any required column is missing, the table is returned unchanged and
    /// the skip is recorded. Arithmetic follows IEEE-754: zero or NaN
    /// denominators yield inf/NaN, never an error.
    pub fn derive(self, derivation: Derivation<'_>, diagnostics: &mut Diagnostics, expr: Expr) -> Self {
        let missing = self.missing_columns(derivation.required);
        if !missing.is_empty() {
            diagnostics.skip(
                derivation.stage,
                derivation.metric,
                SkipReason::MissingColumns { columns: missing },
            );
            return self;
        }

        let computed = self
            .frame
            .clone()
            .lazy()
            .with_column(expr.cast(DataType::Float64).alias(derivation.output))
            .collect();

        match computed {
            Ok(frame) => {
                tracing::debug!(
                    stage = %derivation.stage,
                    "{} -> {}",
                    derivation.metric,
                    derivation.output
                );
                Self {
                    rows: self.rows,
                    frame,
                }
            }
            Err(e) => {
                diagnostics.skip(
                    derivation.stage,
                    derivation.metric,
                    SkipReason::CalculationFailed {
                        detail: e.to_string(),
                    },
                );
                self
            }
        }
    }
}

impl Default for FinancialTable {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Tables are equal when they hold the same columns in the same order with
/// the same cells. Missing numeric cells (null or NaN) compare equal.
impl PartialEq for FinancialTable {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.frame.width() == other.frame.width()
            && self
                .frame
                .get_columns()
                .iter()
                .zip(other.frame.get_columns())
                .all(|(a, b)| columns_match(a, b))
    }
}

fn columns_match(a: &Column, b: &Column) -> bool {
    if a.name() != b.name() || a.dtype() != b.dtype() {
        return false;
    }
    let (a, b) = (a.as_materialized_series(), b.as_materialized_series());
    match (a.f64(), b.f64()) {
        (Ok(x), Ok(y)) => x
            .into_iter()
            .zip(y)
            .all(|(p, q)| p.filter(|v| !v.is_nan()) == q.filter(|v| !v.is_nan())),
        _ => a.equals_missing(b),
    }
}
