use analysis_core::columns::*;
use analysis_core::{Derivation, Diagnostics, FinancialTable, SkipReason, StageKind, TableStage};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How free cash flow is capitalised into a value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DcfModel {
    /// `FCF / WACC`
    Perpetuity,
    /// `FCF / (WACC - growth)`
    GrowingPerpetuity { growth: f64 },
}

impl DcfModel {
    fn value(&self, fcf: Expr, wacc: Expr) -> Expr {
        match self {
            DcfModel::Perpetuity => fcf / wacc,
            DcfModel::GrowingPerpetuity { growth } => fcf / (wacc - lit(*growth)),
        }
    }
}

impl Default for DcfModel {
    fn default() -> Self {
        DcfModel::GrowingPerpetuity { growth: 0.05 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    pub risk_free_rate: f64,
    pub market_return: f64,
    /// Used when the table has no `CostOfDebt` column
    pub cost_of_debt: f64,
    /// Used when the table has no `TaxRate` column
    pub tax_rate: f64,
    pub dcf: DcfModel,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            market_return: 0.10,
            cost_of_debt: 0.05,
            tax_rate: 0.25,
            dcf: DcfModel::default(),
        }
    }
}

/// CAPM -> WACC -> DCF.
///
/// Each step needs the column produced by the step before it; when a step's
/// inputs are absent it is skipped and the table passes through unchanged.
#[derive(Debug, Clone, Default)]
pub struct ValuationChain {
    config: ValuationConfig,
}

impl ValuationChain {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// `Expected_Return = rf + beta * (rm - rf)`
    pub fn capm(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        let rf = self.config.risk_free_rate;
        let premium = self.config.market_return - rf;
        table.derive(
            Derivation {
                stage: StageKind::Valuation,
                metric: "CAPM",
                output: EXPECTED_RETURN,
                required: &[BETA],
            },
            diagnostics,
            lit(rf) + col(BETA) * lit(premium),
        )
    }

    /// Capital weights and the weighted average cost of capital.
    ///
    /// Cost of debt and tax rate are read per row when the table carries them,
    /// otherwise the configured scalars apply to every row.
    pub fn wacc(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        const REQUIRED: &[&str] = &[EQUITY, TOTAL_LIABILITIES, EXPECTED_RETURN];

        let missing = table.missing_columns(REQUIRED);
        if !missing.is_empty() {
            diagnostics.skip(
                StageKind::Valuation,
                "WACC",
                SkipReason::MissingColumns { columns: missing },
            );
            return table;
        }

        let cost_of_debt = column_or(&table, COST_OF_DEBT, self.config.cost_of_debt);
        let tax_rate = column_or(&table, TAX_RATE, self.config.tax_rate);
        let value = || col(EQUITY) + col(TOTAL_LIABILITIES);

        let table = table
            .derive(
                Derivation {
                    stage: StageKind::Valuation,
                    metric: "Equity Weight",
                    output: EQUITY_WEIGHT,
                    required: &[EQUITY, TOTAL_LIABILITIES],
                },
                diagnostics,
                col(EQUITY) / value(),
            )
            .derive(
                Derivation {
                    stage: StageKind::Valuation,
                    metric: "Debt Weight",
                    output: DEBT_WEIGHT,
                    required: &[EQUITY, TOTAL_LIABILITIES],
                },
                diagnostics,
                col(TOTAL_LIABILITIES) / value(),
            );

        table.derive(
            Derivation {
                stage: StageKind::Valuation,
                metric: "WACC",
                output: WACC,
                required: REQUIRED,
            },
            diagnostics,
            col(EQUITY) / value() * col(EXPECTED_RETURN)
                + col(TOTAL_LIABILITIES) / value() * cost_of_debt * (lit(1.0) - tax_rate),
        )
    }

    /// Capitalised free cash flow. No guard on the denominator: a zero
    /// spread between WACC and growth yields an infinite value.
    pub fn dcf(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        let model = self.config.dcf;
        table.derive(
            Derivation {
                stage: StageKind::Valuation,
                metric: "DCF",
                output: DCF_VALUE,
                required: &[FCF, WACC],
            },
            diagnostics,
            model.value(col(FCF), col(WACC)),
        )
    }
}

impl TableStage for ValuationChain {
    fn kind(&self) -> StageKind {
        StageKind::Valuation
    }

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        let table = self.capm(table, diagnostics);
        let table = self.wacc(table, diagnostics);
        self.dcf(table, diagnostics)
    }
}

/// The column when the table carries it, the configured scalar otherwise
fn column_or(table: &FinancialTable, name: &str, fallback: f64) -> Expr {
    if table.missing_columns(&[name]).is_empty() {
        col(name)
    } else {
        lit(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn firm_table() -> FinancialTable {
        FinancialTable::new(3)
            .with_numbers(BETA, vec![1.0, 0.8, 0.9])
            .unwrap()
            .with_numbers(EQUITY, vec![50000.0, 80000.0, 60000.0])
            .unwrap()
            .with_numbers(TOTAL_LIABILITIES, vec![50000.0, 70000.0, 60000.0])
            .unwrap()
            .with_numbers(FCF, vec![5000.0, 7000.0, 6000.0])
            .unwrap()
    }

    #[test]
    fn test_capm_expected_return() {
        let mut diagnostics = Diagnostics::new();
        let table = ValuationChain::default().capm(firm_table(), &mut diagnostics);
        let er = table.numbers(EXPECTED_RETURN).unwrap();
        assert_relative_eq!(er[0], 0.10, epsilon = 1e-12);
        assert_relative_eq!(er[1], 0.03 + 0.8 * 0.07, epsilon = 1e-12);
    }

    #[test]
    fn test_wacc_with_scalar_debt_terms() {
        let mut diagnostics = Diagnostics::new();
        let table = ValuationChain::default().apply(firm_table(), &mut diagnostics);

        // Firm A: E/V = D/V = 0.5, Re = 0.10, kd(1-t) = 0.0375
        let wacc = table.numbers(WACC).unwrap();
        assert_relative_eq!(wacc[0], 0.5 * 0.10 + 0.5 * 0.0375, epsilon = 1e-12);
        assert_relative_eq!(table.numbers(EQUITY_WEIGHT).unwrap()[0], 0.5);
        assert_relative_eq!(table.numbers(DEBT_WEIGHT).unwrap()[1], 70000.0 / 150000.0);
        assert!(diagnostics.skipped.is_empty());
    }

    #[test]
    fn test_wacc_prefers_row_level_debt_terms() {
        let input = firm_table()
            .with_numbers(COST_OF_DEBT, vec![0.08, 0.08, 0.08])
            .unwrap()
            .with_numbers(TAX_RATE, vec![0.0, 0.0, 0.0])
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let table = ValuationChain::default().apply(input, &mut diagnostics);
        assert_relative_eq!(
            table.numbers(WACC).unwrap()[0],
            0.5 * 0.10 + 0.5 * 0.08,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_growing_perpetuity_dcf() {
        let mut diagnostics = Diagnostics::new();
        let table = ValuationChain::default().apply(firm_table(), &mut diagnostics);
        let wacc = table.numbers(WACC).unwrap()[0];
        assert_relative_eq!(
            table.numbers(DCF_VALUE).unwrap()[0],
            5000.0 / (wacc - 0.05),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_zero_wacc_perpetuity_is_infinite() {
        let input = FinancialTable::new(1)
            .with_numbers(FCF, vec![10000.0])
            .unwrap()
            .with_numbers(WACC, vec![0.0])
            .unwrap();
        let chain = ValuationChain::new(ValuationConfig {
            dcf: DcfModel::Perpetuity,
            ..ValuationConfig::default()
        });
        let mut diagnostics = Diagnostics::new();
        let table = chain.dcf(input, &mut diagnostics);

        let value = table.numbers(DCF_VALUE).unwrap()[0];
        assert!(value.is_infinite() && value.is_sign_positive());
    }

    #[test]
    fn test_missing_beta_skips_whole_chain() {
        let input = firm_table();
        let without_beta = FinancialTable::new(3)
            .with_numbers(EQUITY, input.numbers(EQUITY).unwrap())
            .unwrap()
            .with_numbers(FCF, input.numbers(FCF).unwrap())
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let table = ValuationChain::default().apply(without_beta.clone(), &mut diagnostics);

        assert_eq!(table, without_beta);
        let skipped: Vec<&str> = diagnostics.skipped.iter().map(|s| s.metric.as_str()).collect();
        assert_eq!(skipped, vec!["CAPM", "WACC", "DCF"]);
        assert_eq!(
            diagnostics.skipped[1].reason,
            SkipReason::MissingColumns {
                columns: vec![TOTAL_LIABILITIES.to_string(), EXPECTED_RETURN.to_string()]
            }
        );
    }

    #[test]
    fn test_dcf_model_serde() {
        let model: DcfModel = serde_json::from_str(r#"{"model":"perpetuity"}"#).unwrap();
        assert_eq!(model, DcfModel::Perpetuity);
    }
}
