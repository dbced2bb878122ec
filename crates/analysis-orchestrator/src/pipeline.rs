use crate::config::PipelineConfig;
use analysis_core::{AnalysisError, Diagnostics, FinancialTable, TableStage};
use fundamental_analysis::FundamentalAnalysisEngine;
use quant_analysis::{
    DistressModels, DistressSummary, FactorLoadings, FamaFrenchModel, QuantAnalysisEngine,
    QuantSummary,
};
use serde::Serialize;

/// The full batch: quality gate, ratios, valuation, factor model, distress
/// models. Stages run in that order, each consuming the previous table.
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    fundamental: FundamentalAnalysisEngine,
    quant: QuantAnalysisEngine,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub table: FinancialTable,
    pub diagnostics: Diagnostics,
    pub models: QuantSummary,
}

/// Serializable view of a run, without the table itself
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub rows: usize,
    pub columns: Vec<&'a str>,
    pub diagnostics: &'a Diagnostics,
    pub factor_model: Option<&'a FactorLoadings>,
    pub distress_models: Option<&'a DistressSummary>,
}

impl AnalysisPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let valuation = config.valuation;
        Self {
            fundamental: FundamentalAnalysisEngine::new(valuation),
            quant: QuantAnalysisEngine::new(
                FamaFrenchModel::new(valuation.risk_free_rate, valuation.market_return)
                    .with_fallbacks(config.factor_fallbacks),
                DistressModels::new(config.distress.clone()),
            ),
        }
    }

    pub fn run(&self, table: FinancialTable) -> PipelineOutcome {
        let mut diagnostics = Diagnostics::new();
        tracing::info!(rows = table.len(), "Starting analysis pipeline");

        let table = self.fundamental.apply(table, &mut diagnostics);
        let (table, models) = self.quant.run(table, &mut diagnostics);

        tracing::info!(
            columns = table.width(),
            skipped = diagnostics.skipped.len(),
            warnings = diagnostics.warnings.len(),
            "Analysis pipeline finished"
        );

        PipelineOutcome {
            table,
            diagnostics,
            models,
        }
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl PipelineOutcome {
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            rows: self.table.len(),
            columns: self.table.column_names().collect(),
            diagnostics: &self.diagnostics,
            factor_model: self.models.factor.as_ref(),
            distress_models: self.models.distress.as_ref(),
        }
    }

    pub fn summary_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(&self.summary())
            .map_err(|e| AnalysisError::Dataset(e.to_string()))
    }
}
