use analysis_core::{
    AnalysisError, Diagnostics, FinancialTable, QualityCheck, SkipReason, StageKind, TableStage,
};
use polars::prelude::*;

/// Flags rows with invalid inputs.
///
/// The gate never drops rows and never alters numeric data: it only attaches
/// the four `DQ_*` boolean columns and records a warning per failing check.
#[derive(Debug, Clone)]
pub struct DataQualityGate {
    checks: Vec<QualityCheck>,
}

impl DataQualityGate {
    pub fn new() -> Self {
        Self {
            checks: QualityCheck::ALL.to_vec(),
        }
    }

    /// Gate that runs only the given checks. Used to re-check WACC once the
    /// valuation chain has produced it.
    pub fn with_checks(checks: &[QualityCheck]) -> Self {
        Self {
            checks: checks.to_vec(),
        }
    }

    pub fn checks(&self) -> &[QualityCheck] {
        &self.checks
    }

    /// Rows violating `check`. Missing cells only violate the FCF check.
    fn predicate(check: QualityCheck) -> Expr {
        let value = col(check.source_column());
        let present = value.clone().is_not_nan();
        match check {
            QualityCheck::InvalidAssets | QualityCheck::NegativeEquity => {
                value.lt_eq(lit(0.0)).and(present)
            }
            QualityCheck::MissingFreeCashFlow => value.clone().is_null().or(value.is_nan()),
            QualityCheck::InvalidCostOfCapital => value
                .clone()
                .lt_eq(lit(0.0))
                .or(value.gt(lit(1.0)))
                .and(present),
        }
    }

    fn run_check(
        table: FinancialTable,
        check: QualityCheck,
        diagnostics: &mut Diagnostics,
    ) -> Result<FinancialTable, AnalysisError> {
        if !table.missing_columns(&[check.source_column()]).is_empty() {
            return Ok(table);
        }
        let mask = table.mask(Self::predicate(check))?;
        let affected = mask.iter().filter(|&&m| m).count();
        if affected == 0 {
            return Ok(table);
        }

        let flagged = table.raise_flags(check.flag_column(), &mask)?;
        diagnostics.quality_warning(check, affected);
        Ok(flagged)
    }

    /// Run the checks again from scratch: their flags are cleared first, so
    /// rows that now pass lose a flag raised by an earlier run.
    pub fn refresh(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        let table = self.checks.iter().fold(table, |table, &check| {
            attempt(table, check, diagnostics, |t, _| t.clear_flags(check.flag_column()))
        });
        self.apply(table, diagnostics)
    }
}

/// Apply one fallible step; on failure keep the table and record the skip.
fn attempt<F>(
    table: FinancialTable,
    check: QualityCheck,
    diagnostics: &mut Diagnostics,
    step: F,
) -> FinancialTable
where
    F: FnOnce(FinancialTable, &mut Diagnostics) -> Result<FinancialTable, AnalysisError>,
{
    match step(table.clone(), diagnostics) {
        Ok(table) => table,
        Err(e) => {
            diagnostics.skip(
                StageKind::DataQuality,
                check.flag_column(),
                SkipReason::CalculationFailed {
                    detail: e.to_string(),
                },
            );
            table
        }
    }
}

impl TableStage for DataQualityGate {
    fn kind(&self) -> StageKind {
        StageKind::DataQuality
    }

    fn apply(&self, mut table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        for check in QualityCheck::ALL {
            if !table.contains(check.flag_column()) {
                table = attempt(table, check, diagnostics, |t, _| t.clear_flags(check.flag_column()));
            }
        }

        self.checks.iter().fold(table, |table, &check| {
            attempt(table, check, diagnostics, |t, d| Self::run_check(t, check, d))
        })
    }
}

impl Default for DataQualityGate {
    fn default() -> Self {
        Self::new()
    }
}
