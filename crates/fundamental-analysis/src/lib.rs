//! Accounting-side stages: data quality gate, ratio table and the
//! CAPM/WACC/DCF valuation chain.

pub mod data_quality;
pub mod ratios;
pub mod valuation;

pub use data_quality::DataQualityGate;
pub use ratios::{RatioEngine, RatioFamily, RatioRule, RATIO_RULES};
pub use valuation::{DcfModel, ValuationChain, ValuationConfig};

use analysis_core::{columns, Diagnostics, FinancialTable, QualityCheck, StageKind, TableStage};

/// Runs the fundamental stages in order: quality gate, ratios, valuation,
/// then re-checks the cost of capital the valuation chain produced.
#[derive(Debug, Clone, Default)]
pub struct FundamentalAnalysisEngine {
    gate: DataQualityGate,
    ratios: RatioEngine,
    valuation: ValuationChain,
}

impl FundamentalAnalysisEngine {
    pub fn new(valuation: ValuationConfig) -> Self {
        Self {
            gate: DataQualityGate::new(),
            ratios: RatioEngine::new(),
            valuation: ValuationChain::new(valuation),
        }
    }

    pub fn valuation(&self) -> &ValuationChain {
        &self.valuation
    }
}

impl TableStage for FundamentalAnalysisEngine {
    fn kind(&self) -> StageKind {
        StageKind::Ratios
    }

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        let table = self.gate.apply(table, diagnostics);
        let table = self.ratios.apply(table, diagnostics);

        let wacc_skips_before = wacc_skips(diagnostics);
        let table = self.valuation.apply(table, diagnostics);
        if wacc_skips(diagnostics) > wacc_skips_before || !table.contains(columns::WACC) {
            return table;
        }
        // The computed WACC replaces any input column, so its flag starts over
        DataQualityGate::with_checks(&[QualityCheck::InvalidCostOfCapital]).refresh(table, diagnostics)
    }
}

fn wacc_skips(diagnostics: &Diagnostics) -> usize {
    diagnostics
        .skipped_in(StageKind::Valuation)
        .filter(|s| s.metric == "WACC")
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::columns::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_engine_flags_computed_wacc() {
        // Beta of 20 pushes the cost of equity, and so WACC, above 100%
        let input = FinancialTable::new(2)
            .with_numbers(BETA, vec![1.0, 20.0])
            .unwrap()
            .with_numbers(EQUITY, vec![100.0, 100.0])
            .unwrap()
            .with_numbers(TOTAL_LIABILITIES, vec![1.0, 1.0])
            .unwrap()
            .with_numbers(TOTAL_ASSETS, vec![101.0, 101.0])
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let table = FundamentalAnalysisEngine::default().apply(input, &mut diagnostics);

        assert_eq!(table.flags(DQ_INVALID_WACC).unwrap(), &[false, true]);
        assert_eq!(diagnostics.warnings.len(), 1);
        assert_eq!(diagnostics.warnings[0].check, QualityCheck::InvalidCostOfCapital);
        assert!(table.contains(DEBT_TO_ASSETS));
    }

    #[test]
    fn test_engine_does_not_recheck_when_wacc_skipped() {
        let input = FinancialTable::new(1)
            .with_numbers(WACC, vec![2.0])
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let table = FundamentalAnalysisEngine::default().apply(input, &mut diagnostics);

        assert_eq!(table.flags(DQ_INVALID_WACC).unwrap(), &[true]);
        assert_eq!(diagnostics.warnings.len(), 1);
    }

    #[test]
    fn test_computed_wacc_replaces_stale_flag() {
        let input = FinancialTable::new(1)
            .with_numbers(WACC, vec![2.0])
            .unwrap()
            .with_numbers(BETA, vec![1.0])
            .unwrap()
            .with_numbers(EQUITY, vec![50000.0])
            .unwrap()
            .with_numbers(TOTAL_LIABILITIES, vec![50000.0])
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let table = FundamentalAnalysisEngine::default().apply(input, &mut diagnostics);

        assert_relative_eq!(table.numbers(WACC).unwrap()[0], 0.06875, epsilon = 1e-12);
        assert_eq!(table.flags(DQ_INVALID_WACC).unwrap(), &[false]);
    }
}
