use analysis_core::columns::*;
use analysis_core::{
    AnalysisError, Diagnostics, FinancialTable, SkipReason, StageKind, TableStage,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Singular values below this are treated as zero by the pseudo-inverse.
const PINV_EPSILON: f64 = 1e-10;

const METRIC: &str = "Fama-French";

/// Fitted three-factor loadings, shared by every row of the table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorLoadings {
    pub alpha: f64,
    pub beta_market: f64,
    pub beta_smb: f64,
    pub beta_hml: f64,
    pub r_squared: f64,
    pub observations: usize,
}

/// Ordinary least squares with an intercept.
///
/// Returns `[intercept, b1, .., bk]`. Uses the Moore-Penrose pseudo-inverse,
/// so collinear regressors still yield the minimum-norm solution.
pub fn ols(y: &[f64], regressors: &[Vec<f64>]) -> Result<Vec<f64>, AnalysisError> {
    let n = y.len();
    if n == 0 {
        return Err(AnalysisError::InsufficientData(
            "No complete observations for regression".to_string(),
        ));
    }
    if let Some(bad) = regressors.iter().find(|r| r.len() != n) {
        return Err(AnalysisError::InvalidData(format!(
            "Regressor has {} observations, response has {}",
            bad.len(),
            n
        )));
    }

    let k = regressors.len() + 1;
    let x = DMatrix::from_fn(n, k, |i, j| if j == 0 { 1.0 } else { regressors[j - 1][i] });
    let y = DVector::from_column_slice(y);

    let pinv = x
        .pseudo_inverse(PINV_EPSILON)
        .map_err(|e| AnalysisError::CalculationError(e.to_string()))?;
    let coefficients = pinv * y;
    Ok(coefficients.iter().copied().collect())
}

/// `1 - SS_res / SS_tot`; 0 when the response has no variance.
fn r_squared(y: &[f64], regressors: &[Vec<f64>], coefficients: &[f64]) -> f64 {
    let n = y.len() as f64;
    let mean_y = y.iter().sum::<f64>() / n;

    let ss_res: f64 = y
        .iter()
        .enumerate()
        .map(|(i, yi)| {
            let fitted = coefficients[0]
                + regressors
                    .iter()
                    .zip(&coefficients[1..])
                    .map(|(x, b)| x[i] * b)
                    .sum::<f64>();
            (yi - fitted).powi(2)
        })
        .sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();

    if ss_tot > 1e-15 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

/// Constant factor returns used when the table has no `SMB`/`HML` column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorFallbacks {
    pub smb: f64,
    pub hml: f64,
}

impl Default for FactorFallbacks {
    fn default() -> Self {
        Self {
            smb: 0.05,
            hml: 0.02,
        }
    }
}

/// Fama-French three-factor regression, fit once per run across all rows.
///
/// Absent inputs are substituted and recorded: `ExcessReturn` as
/// `Expected_Return - rf`, `MarketExcess` as `Beta * (rm - rf)`, and `SMB`
/// and `HML` as the configured constants.
#[derive(Debug, Clone)]
pub struct FamaFrenchModel {
    risk_free_rate: f64,
    market_return: f64,
    fallbacks: FactorFallbacks,
}

/// One regression input and where it came from
struct FactorInput {
    values: Vec<f64>,
    /// Set when the column was not in the table
    substitute: Option<String>,
}

impl FactorInput {
    fn column(values: Vec<f64>) -> Self {
        Self {
            values,
            substitute: None,
        }
    }

    fn substituted(values: Vec<f64>, source: String) -> Self {
        Self {
            values,
            substitute: Some(source),
        }
    }
}

impl FamaFrenchModel {
    pub fn new(risk_free_rate: f64, market_return: f64) -> Self {
        Self {
            risk_free_rate,
            market_return,
            fallbacks: FactorFallbacks::default(),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: FactorFallbacks) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn fallbacks(&self) -> &FactorFallbacks {
        &self.fallbacks
    }

    fn excess_return(&self, table: &FinancialTable) -> Option<FactorInput> {
        if let Some(values) = table.numbers(EXCESS_RETURN) {
            return Some(FactorInput::column(values));
        }
        let rf = self.risk_free_rate;
        table.numbers(EXPECTED_RETURN).map(|er| {
            FactorInput::substituted(
                er.iter().map(|r| r - rf).collect(),
                format!("{} - {}", EXPECTED_RETURN, rf),
            )
        })
    }

    fn market_excess(&self, table: &FinancialTable) -> Option<FactorInput> {
        if let Some(values) = table.numbers(MARKET_EXCESS) {
            return Some(FactorInput::column(values));
        }
        let premium = self.market_return - self.risk_free_rate;
        table.numbers(BETA).map(|beta| {
            FactorInput::substituted(
                beta.iter().map(|b| b * premium).collect(),
                format!("{} * {}", BETA, premium),
            )
        })
    }

    fn factor(table: &FinancialTable, name: &str, fallback: f64) -> FactorInput {
        match table.numbers(name) {
            Some(values) => FactorInput::column(values),
            None => FactorInput::substituted(vec![fallback; table.len()], format!("constant {}", fallback)),
        }
    }

    /// Fit the regression on complete rows. Rows with a NaN or infinite value
    /// in any series are left out of the fit.
    pub fn fit(&self, table: &FinancialTable) -> Result<FactorLoadings, AnalysisError> {
        self.fit_inputs(table).map(|(loadings, _)| loadings)
    }

    fn fit_inputs(
        &self,
        table: &FinancialTable,
    ) -> Result<(FactorLoadings, Vec<(&'static str, String)>), AnalysisError> {
        let (Some(y), Some(market)) = (self.excess_return(table), self.market_excess(table)) else {
            return Err(AnalysisError::InvalidData(format!(
                "Missing columns: [{}]",
                self.missing_inputs(table).join(", ")
            )));
        };
        let smb = Self::factor(table, SMB, self.fallbacks.smb);
        let hml = Self::factor(table, HML, self.fallbacks.hml);

        let complete: Vec<usize> = (0..table.len())
            .filter(|&i| {
                [&y, &market, &smb, &hml]
                    .iter()
                    .all(|s| s.values[i].is_finite())
            })
            .collect();
        let pick = |series: &FactorInput| -> Vec<f64> {
            complete.iter().map(|&i| series.values[i]).collect()
        };

        let response = pick(&y);
        let regressors = vec![pick(&market), pick(&smb), pick(&hml)];
        let coefficients = ols(&response, &regressors)?;

        let loadings = FactorLoadings {
            alpha: coefficients[0],
            beta_market: coefficients[1],
            beta_smb: coefficients[2],
            beta_hml: coefficients[3],
            r_squared: r_squared(&response, &regressors, &coefficients),
            observations: complete.len(),
        };
        let substitutes = [
            (EXCESS_RETURN, y),
            (MARKET_EXCESS, market),
            (SMB, smb),
            (HML, hml),
        ]
        .into_iter()
        .filter_map(|(name, series)| series.substitute.map(|source| (name, source)))
        .collect();
        Ok((loadings, substitutes))
    }

    /// Columns the fit cannot do without, after substitutes are considered
    pub fn missing_inputs(&self, table: &FinancialTable) -> Vec<String> {
        let mut missing = Vec::new();
        if self.excess_return(table).is_none() {
            missing.push(EXCESS_RETURN.to_string());
        }
        if self.market_excess(table).is_none() {
            missing.push(MARKET_EXCESS.to_string());
        }
        missing
    }

    /// Fit and broadcast `Alpha`, `Beta_Market`, `Beta_SMB`, `Beta_HML` to every row.
    pub fn run(
        &self,
        table: FinancialTable,
        diagnostics: &mut Diagnostics,
    ) -> (FinancialTable, Option<FactorLoadings>) {
        let missing = self.missing_inputs(&table);
        if !missing.is_empty() {
            diagnostics.skip(
                StageKind::FactorModel,
                METRIC,
                SkipReason::MissingColumns { columns: missing },
            );
            return (table, None);
        }

        let (loadings, substitutes) = match self.fit_inputs(&table) {
            Ok(fitted) => fitted,
            Err(e) => {
                diagnostics.skip(StageKind::FactorModel, METRIC, skip_reason(e));
                return (table, None);
            }
        };

        let broadcast = table
            .clone()
            .with_constant(ALPHA, loadings.alpha)
            .and_then(|t| t.with_constant(BETA_MARKET, loadings.beta_market))
            .and_then(|t| t.with_constant(BETA_SMB, loadings.beta_smb))
            .and_then(|t| t.with_constant(BETA_HML, loadings.beta_hml));
        let table = match broadcast {
            Ok(table) => table,
            Err(e) => {
                diagnostics.skip(StageKind::FactorModel, METRIC, skip_reason(e));
                return (table, None);
            }
        };

        for (column, source) in substitutes {
            diagnostics.substitute(StageKind::FactorModel, column, source);
        }
        tracing::info!(
            alpha = loadings.alpha,
            beta_market = loadings.beta_market,
            r_squared = loadings.r_squared,
            n = loadings.observations,
            "Fama-French regression fitted"
        );
        (table, Some(loadings))
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

impl TableStage for FamaFrenchModel {
    fn kind(&self) -> StageKind {
        StageKind::FactorModel
    }

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        self.run(table, diagnostics).0
    }
}
