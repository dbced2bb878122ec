use std::fmt;

use serde::{Deserialize, Serialize};

use crate::columns;

/// Pipeline stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    DataQuality,
    Ratios,
    Valuation,
    FactorModel,
    DistressModel,
}

impl StageKind {
    pub fn to_label(&self) -> &'static str {
        match self {
            StageKind::DataQuality => "Data Quality",
            StageKind::Ratios => "Ratios",
            StageKind::Valuation => "Valuation",
            StageKind::FactorModel => "Fama-French",
            StageKind::DistressModel => "Distress Models",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_label())
    }
}

/// Why a metric or stage was not computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Required source columns are absent (or not numeric).
    MissingColumns { columns: Vec<String> },
    /// The label column holds fewer than two classes.
    DegenerateLabel { classes: usize },
    InsufficientData { detail: String },
    CalculationFailed { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingColumns { columns } => {
                write!(f, "Missing columns: [{}]", columns.join(", "))
            }
            SkipReason::DegenerateLabel { classes } => {
                write!(f, "Label has {} class(es), need at least 2", classes)
            }
            SkipReason::InsufficientData { detail } => write!(f, "Insufficient data: {}", detail),
            SkipReason::CalculationFailed { detail } => write!(f, "Calculation failed: {}", detail),
        }
    }
}

/// A metric that was skipped, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub stage: StageKind,
    pub metric: String,
    pub reason: SkipReason,
}

/// Row-level sanity checks run by the data quality gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    InvalidAssets,
    NegativeEquity,
    MissingFreeCashFlow,
    InvalidCostOfCapital,
}

impl QualityCheck {
    pub const ALL: [QualityCheck; 4] = [
        QualityCheck::InvalidAssets,
        QualityCheck::NegativeEquity,
        QualityCheck::MissingFreeCashFlow,
        QualityCheck::InvalidCostOfCapital,
    ];

    /// Column the check inspects
    pub fn source_column(&self) -> &'static str {
        match self {
            QualityCheck::InvalidAssets => columns::TOTAL_ASSETS,
            QualityCheck::NegativeEquity => columns::EQUITY,
            QualityCheck::MissingFreeCashFlow => columns::FCF,
            QualityCheck::InvalidCostOfCapital => columns::WACC,
        }
    }

    /// Boolean column set on violating rows
    pub fn flag_column(&self) -> &'static str {
        match self {
            QualityCheck::InvalidAssets => columns::DQ_INVALID_ASSETS,
            QualityCheck::NegativeEquity => columns::DQ_NEGATIVE_EQUITY,
            QualityCheck::MissingFreeCashFlow => columns::DQ_INVALID_FCF,
            QualityCheck::InvalidCostOfCapital => columns::DQ_INVALID_WACC,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            QualityCheck::InvalidAssets => {
                "Some observations have non-positive TotalAssets. Related ratios may be unreliable."
            }
            QualityCheck::NegativeEquity => {
                "Negative or zero Equity detected. Leverage and market ratios may be unreliable."
            }
            QualityCheck::MissingFreeCashFlow => {
                "Missing FCF values detected. DCF valuation will be missing for these rows."
            }
            QualityCheck::InvalidCostOfCapital => {
                "Invalid WACC values detected (<=0 or >100%). DCF results may be invalid."
            }
        }
    }
}

/// Advisory produced when at least one row fails a quality check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWarning {
    pub check: QualityCheck,
    pub affected_rows: usize,
    pub message: String,
}

/// An input the run filled in because the table did not carry it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub stage: StageKind,
    pub column: String,
    /// What was used in its place
    pub source: String,
}

/// Everything a run chose not to compute, plus data-quality advisories.
///
/// Returned next to the table so callers can inspect the run without
/// scraping log output. Each record is also emitted through `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub skipped: Vec<SkipRecord>,
    pub warnings: Vec<QualityWarning>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(&mut self, stage: StageKind, metric: impl Into<String>, reason: SkipReason) {
        let metric = metric.into();
        tracing::warn!("{} not calculated ({}). {}", metric, stage, reason);
        self.skipped.push(SkipRecord {
            stage,
            metric,
            reason,
        });
    }

    pub fn quality_warning(&mut self, check: QualityCheck, affected_rows: usize) {
        tracing::warn!(
            rows = affected_rows,
            column = check.source_column(),
            "{}",
            check.message()
        );
        self.warnings.push(QualityWarning {
            check,
            affected_rows,
            message: check.message().to_string(),
        });
    }

    pub fn substitute(
        &mut self,
        stage: StageKind,
        column: impl Into<String>,
        source: impl Into<String>,
    ) {
        let (column, source) = (column.into(), source.into());
        tracing::warn!("{} not in input, using {} ({})", column, source, stage);
        self.substitutions.push(Substitution {
            stage,
            column,
            source,
        });
    }

    pub fn is_substituted(&self, column: &str) -> bool {
        self.substitutions.iter().any(|s| s.column == column)
    }

    pub fn is_skipped(&self, metric: &str) -> bool {
        self.skipped.iter().any(|s| s.metric == metric)
    }

    pub fn skipped_in(&self, stage: StageKind) -> impl Iterator<Item = &SkipRecord> {
        self.skipped.iter().filter(move |s| s.stage == stage)
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.warnings.is_empty() && self.substitutions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::MissingColumns {
            columns: vec!["Inventory".to_string(), "Cash".to_string()],
        };
        assert_eq!(reason.to_string(), "Missing columns: [Inventory, Cash]");
    }

    #[test]
    fn test_diagnostics_serialize_tagged() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.skip(
            StageKind::DistressModel,
            "Distress Models",
            SkipReason::DegenerateLabel { classes: 1 },
        );

        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json["skipped"][0]["stage"], "distress_model");
        assert_eq!(json["skipped"][0]["reason"]["kind"], "degenerate_label");
        assert_eq!(json["skipped"][0]["reason"]["classes"], 1);
    }

    #[test]
    fn test_skipped_in_filters_by_stage() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.skip(
            StageKind::Ratios,
            "Quick Ratio",
            SkipReason::MissingColumns { columns: vec!["Inventory".to_string()] },
        );
        diagnostics.skip(
            StageKind::Valuation,
            "CAPM",
            SkipReason::MissingColumns { columns: vec!["Beta".to_string()] },
        );

        assert_eq!(diagnostics.skipped_in(StageKind::Ratios).count(), 1);
        assert!(diagnostics.is_skipped("CAPM"));
        assert!(!diagnostics.is_skipped("Current Ratio"));
        assert!(!diagnostics.is_clean());
    }

    #[test]
    fn test_substitution_recorded() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.substitute(StageKind::FactorModel, "SMB", "constant 0.05");

        assert!(diagnostics.is_substituted("SMB"));
        assert!(!diagnostics.is_substituted("HML"));
        assert!(!diagnostics.is_clean());
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json["substitutions"][0]["source"], "constant 0.05");
    }

    #[test]
    fn test_quality_check_columns() {
        for check in QualityCheck::ALL {
            assert!(check.flag_column().starts_with("DQ_"));
        }
        assert_eq!(QualityCheck::InvalidCostOfCapital.source_column(), "WACC");
    }
}
