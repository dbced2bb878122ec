//! Statistical models fit once per run across all rows: the Fama-French
//! three-factor regression and the two distress classifiers.

pub mod distress;
pub mod fama_french;
pub mod logistic;
pub mod mlp;

pub use distress::{DistressConfig, DistressModels, DistressSummary};
pub use fama_french::{ols, FactorFallbacks, FactorLoadings, FamaFrenchModel};
pub use logistic::{LogisticConfig, LogisticRegression};
pub use mlp::{MlpClassifier, MlpConfig};

use analysis_core::{Diagnostics, FinancialTable, StageKind, TableStage};
use serde::{Deserialize, Serialize};

/// Fit statistics of every model that ran; `None` where the model was skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantSummary {
    pub factor: Option<FactorLoadings>,
    pub distress: Option<DistressSummary>,
}

#[derive(Debug, Clone)]
pub struct QuantAnalysisEngine {
    factor_model: FamaFrenchModel,
    distress_models: DistressModels,
}

impl QuantAnalysisEngine {
    pub fn new(factor_model: FamaFrenchModel, distress_models: DistressModels) -> Self {
        Self {
            factor_model,
            distress_models,
        }
    }

    pub fn run(
        &self,
        table: FinancialTable,
        diagnostics: &mut Diagnostics,
    ) -> (FinancialTable, QuantSummary) {
        let (table, factor) = self.factor_model.run(table, diagnostics);
        let (table, distress) = self.distress_models.run(table, diagnostics);
        (table, QuantSummary { factor, distress })
    }
}

impl Default for QuantAnalysisEngine {
    fn default() -> Self {
        Self::new(FamaFrenchModel::new(0.03, 0.10), DistressModels::default())
    }
}

impl TableStage for QuantAnalysisEngine {
    fn kind(&self) -> StageKind {
        StageKind::FactorModel
    }

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        self.run(table, diagnostics).0
    }
}
