use crate::logistic::{LogisticConfig, LogisticRegression};
use crate::mlp::{MlpClassifier, MlpConfig};
use analysis_core::columns::*;
use analysis_core::{
    AnalysisError, Diagnostics, FinancialTable, SkipReason, StageKind, TableStage,
};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

const METRIC: &str = "Distress Models";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressConfig {
    pub features: Vec<String>,
    /// Non-zero values are the distressed class
    pub label: String,
    pub logistic: LogisticConfig,
    pub network: MlpConfig,
}

impl Default for DistressConfig {
    fn default() -> Self {
        Self {
            features: [CURRENT_RATIO, QUICK_RATIO, CASH_RATIO, DEBT_TO_EQUITY, DEBT_RATIO]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            label: DISTRESS.to_string(),
            logistic: LogisticConfig::default(),
            network: MlpConfig::default(),
        }
    }
}

/// In-sample fit statistics for the two classifiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistressSummary {
    pub observations: usize,
    pub positives: usize,
    pub logistic_accuracy: f64,
    pub network_accuracy: f64,
}

/// Per-feature z-score scaling learned from the training rows
struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    fn fit(rows: &[Vec<f64>], width: usize) -> Self {
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for j in 0..width {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            means.push(column.iter().mean());
            let std = column.iter().population_std_dev();
            // Constant features are centred but not scaled
            scales.push(if std > 0.0 { std } else { 1.0 });
        }
        Self { means, scales }
    }

    fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(x, (mean, scale))| (x - mean) / scale)
                    .collect()
            })
            .collect()
    }
}

/// Logistic regression and a small neural network predicting the distress
/// label from ratio features, trained and scored on the same rows.
#[derive(Debug, Clone, Default)]
pub struct DistressModels {
    config: DistressConfig,
}

impl DistressModels {
    pub fn new(config: DistressConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DistressConfig {
        &self.config
    }

    /// Fit both models and attach `Distress_LogReg_Pred` and `Distress_NN_Pred`.
    ///
    /// Rows with a non-finite feature get NaN predictions and are left out of
    /// training, as are rows with a NaN label.
    pub fn run(
        &self,
        table: FinancialTable,
        diagnostics: &mut Diagnostics,
    ) -> (FinancialTable, Option<DistressSummary>) {
        let required: Vec<&str> = self
            .config
            .features
            .iter()
            .chain(std::iter::once(&self.config.label))
            .map(String::as_str)
            .collect();
        let missing = table.missing_columns(&required);
        if !missing.is_empty() {
            diagnostics.skip(
                StageKind::DistressModel,
                METRIC,
                SkipReason::MissingColumns { columns: missing },
            );
            return (table, None);
        }

        let features: Vec<Vec<f64>> = self
            .config
            .features
            .iter()
            .filter_map(|name| table.numbers(name))
            .collect();
        let Some(label) = table.numbers(&self.config.label) else {
            return (table, None);
        };

        let scorable: Vec<usize> = (0..table.len())
            .filter(|&i| features.iter().all(|f| f[i].is_finite()))
            .collect();
        let training: Vec<usize> = scorable
            .iter()
            .copied()
            .filter(|&i| !label[i].is_nan())
            .collect();

        let y: Vec<f64> = training
            .iter()
            .map(|&i| if label[i] != 0.0 { 1.0 } else { 0.0 })
            .collect();
        let positives = y.iter().filter(|&&v| v == 1.0).count();
        let classes = usize::from(positives > 0) + usize::from(positives < y.len());
        if classes < 2 {
            diagnostics.skip(
                StageKind::DistressModel,
                METRIC,
                SkipReason::DegenerateLabel { classes },
            );
            return (table, None);
        }

        let row_features = |rows: &[usize]| -> Vec<Vec<f64>> {
            rows.iter()
                .map(|&i| features.iter().map(|f| f[i]).collect())
                .collect()
        };
        let raw_training = row_features(&training);
        let scaler = Standardizer::fit(&raw_training, features.len());
        let x_train = scaler.transform(&raw_training);
        let x_score = scaler.transform(&row_features(&scorable));

        let fitted = LogisticRegression::fit(&self.config.logistic, &x_train, &y).and_then(|logreg| {
            let network = MlpClassifier::fit(&self.config.network, &x_train, &y)?;
            Ok((logreg, network))
        });
        let (logreg, network) = match fitted {
            Ok(models) => models,
            Err(e) => {
                diagnostics.skip(StageKind::DistressModel, METRIC, skip_reason(e));
                return (table, None);
            }
        };

        let summary = DistressSummary {
            observations: y.len(),
            positives,
            logistic_accuracy: accuracy(&logreg.predict(&x_train), &y),
            network_accuracy: accuracy(&network.predict(&x_train), &y),
        };
        tracing::info!(
            observations = summary.observations,
            positives = summary.positives,
            logistic_accuracy = summary.logistic_accuracy,
            network_accuracy = summary.network_accuracy,
            "Distress models fitted"
        );

        let logreg_pred = scatter(table.len(), &scorable, logreg.predict(&x_score));
        let network_pred = scatter(table.len(), &scorable, network.predict(&x_score));

        let scored = table
            .clone()
            .with_numbers(DISTRESS_LOGREG_PRED, logreg_pred)
            .and_then(|t| t.with_numbers(DISTRESS_NN_PRED, network_pred));
        match scored {
            Ok(table) => (table, Some(summary)),
            Err(e) => {
                diagnostics.skip(StageKind::DistressModel, METRIC, skip_reason(e));
                (table, None)
            }
        }
    }
}

impl TableStage for DistressModels {
    fn kind(&self) -> StageKind {
        StageKind::DistressModel
    }

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        self.run(table, diagnostics).0
    }
}

fn skip_reason(error: AnalysisError) -> SkipReason {
    match error {
        AnalysisError::InsufficientData(detail) => SkipReason::InsufficientData { detail },
        other => SkipReason::CalculationFailed {
            detail: other.to_string(),
        },
    }
}

/// Spread predictions for `rows` over a full-length column, NaN elsewhere
fn scatter(len: usize, rows: &[usize], predictions: Vec<f64>) -> Vec<f64> {
    let mut column = vec![f64::NAN; len];
    for (&row, p) in rows.iter().zip(predictions) {
        column[row] = p;
    }
    column
}

fn accuracy(predictions: &[f64], labels: &[f64]) -> f64 {
    let correct = predictions.iter().zip(labels).filter(|(p, y)| p == y).count();
    correct as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DistressConfig {
        DistressConfig {
            features: vec![CURRENT_RATIO.to_string(), DEBT_TO_EQUITY.to_string()],
            ..DistressConfig::default()
        }
    }

    fn firms(distress: Vec<f64>) -> FinancialTable {
        FinancialTable::new(8)
            .with_numbers(
                CURRENT_RATIO,
                vec![2.5, 2.2, 2.0, 1.8, 0.9, 0.7, 0.6, 0.5],
            )
            .unwrap()
            .with_numbers(
                DEBT_TO_EQUITY,
                vec![0.4, 0.5, 0.6, 0.7, 2.0, 2.4, 2.8, 3.1],
            )
            .unwrap()
            .with_numbers(DISTRESS, distress)
            .unwrap()
    }

    #[test]
    fn test_all_zero_label_skips_stage() {
        let mut diagnostics = Diagnostics::new();
        let (table, summary) =
            DistressModels::new(config()).run(firms(vec![0.0; 8]), &mut diagnostics);

        assert!(summary.is_none());
        assert!(!table.contains(DISTRESS_LOGREG_PRED));
        assert!(!table.contains(DISTRESS_NN_PRED));
        assert_eq!(
            diagnostics.skipped[0].reason,
            SkipReason::DegenerateLabel { classes: 1 }
        );
    }

    #[test]
    fn test_separable_firms_predicted() {
        let labels = vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut diagnostics = Diagnostics::new();
        let (table, summary) =
            DistressModels::new(config()).run(firms(labels.clone()), &mut diagnostics);

        let summary = summary.unwrap();
        assert_eq!(summary.observations, 8);
        assert_eq!(summary.positives, 4);
        assert_eq!(summary.logistic_accuracy, 1.0);
        assert!(summary.network_accuracy >= 0.75);

        let logreg = table.numbers(DISTRESS_LOGREG_PRED).unwrap();
        assert_eq!(logreg, labels);
        let network = table.numbers(DISTRESS_NN_PRED).unwrap();
        assert!(network.iter().all(|p| *p == 0.0 || *p == 1.0));
        assert!(diagnostics.skipped.is_empty());
    }

    #[test]
    fn test_nonzero_label_counts_as_distressed() {
        let labels = vec![0.0, 0.0, 0.0, 0.0, 2.0, 1.0, 5.0, 1.0];
        let mut diagnostics = Diagnostics::new();
        let (_, summary) = DistressModels::new(config()).run(firms(labels), &mut diagnostics);
        assert_eq!(summary.unwrap().positives, 4);
    }

    #[test]
    fn test_incomplete_rows_get_nan() {
        let table = firms(vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0])
            .with_numbers(
                DEBT_TO_EQUITY,
                vec![0.4, 0.5, 0.6, f64::NAN, 2.0, 2.4, f64::INFINITY, 3.1],
            )
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let (table, summary) = DistressModels::new(config()).run(table, &mut diagnostics);

        assert_eq!(summary.unwrap().observations, 6);
        let logreg = table.numbers(DISTRESS_LOGREG_PRED).unwrap();
        assert!(logreg[3].is_nan());
        assert!(logreg[6].is_nan());
        assert_eq!(logreg[0], 0.0);
        assert_eq!(logreg[7], 1.0);
    }

    #[test]
    fn test_diverging_classifier_skips_stage() {
        let mut config = config();
        config.logistic.learning_rate = f64::MAX;
        let labels = vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut diagnostics = Diagnostics::new();
        let (table, summary) = DistressModels::new(config).run(firms(labels), &mut diagnostics);

        assert!(summary.is_none());
        assert!(!table.contains(DISTRESS_LOGREG_PRED));
        assert!(matches!(
            diagnostics.skipped[0].reason,
            SkipReason::CalculationFailed { .. }
        ));
    }

    #[test]
    fn test_missing_feature_skips_stage() {
        let table = FinancialTable::new(2)
            .with_numbers(DISTRESS, vec![0.0, 1.0])
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        let (table, summary) = DistressModels::default().run(table, &mut diagnostics);

        assert!(summary.is_none());
        assert!(!table.contains(DISTRESS_NN_PRED));
        assert!(matches!(
            &diagnostics.skipped[0].reason,
            SkipReason::MissingColumns { columns } if columns.len() == 5
        ));
    }
}
