use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Inverse regularisation strength; smaller values shrink harder
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.5,
            max_iter: 5000,
            tolerance: 1e-8,
        }
    }
}

/// Binary logistic regression with an L2 penalty, fit by batch gradient descent.
///
/// Minimises `mean(log_loss) + ||w||^2 / (2 * C * n)`. The intercept is not
/// penalised. A fit whose parameters leave the finite range is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    intercept: f64,
    iterations: usize,
}

impl LogisticRegression {
    /// Fit on row-major features `x` and 0/1 labels `y`.
    pub fn fit(config: &LogisticConfig, x: &[Vec<f64>], y: &[f64]) -> Result<Self, AnalysisError> {
        let n = x.len();
        if n == 0 {
            return Err(AnalysisError::InsufficientData(
                "No observations for logistic regression".to_string(),
            ));
        }
        if y.len() != n {
            return Err(AnalysisError::InvalidData(format!(
                "{} feature rows but {} labels",
                n,
                y.len()
            )));
        }
        if config.c <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "Regularisation strength must be positive, got {}",
                config.c
            )));
        }

        let d = x[0].len();
        let n_f = n as f64;
        let penalty = 1.0 / (config.c * n_f);
        // The penalty adds its own curvature; scaling the step keeps any C stable
        let step = config.learning_rate / (1.0 + penalty);

        let mut weights = vec![0.0; d];
        let mut intercept = 0.0;
        let mut iterations = 0;

        for _ in 0..config.max_iter {
            iterations += 1;

            let mut grad_w = vec![0.0; d];
            let mut grad_b = 0.0;
            for (row, &label) in x.iter().zip(y) {
                let error = logistic(linear(&weights, intercept, row)) - label;
                for (g, xi) in grad_w.iter_mut().zip(row) {
                    *g += error * xi;
                }
                grad_b += error;
            }

            let mut largest = (grad_b / n_f).abs();
            for (g, w) in grad_w.iter_mut().zip(&weights) {
                *g = *g / n_f + penalty * w;
                largest = largest.max(g.abs());
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= step * g;
            }
            intercept -= step * grad_b / n_f;

            if largest < config.tolerance {
                break;
            }
        }

        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(AnalysisError::CalculationError(format!(
                "Logistic regression diverged after {} iterations",
                iterations
            )));
        }
        tracing::debug!(iterations, features = d, "Logistic regression fitted");

        Ok(Self {
            weights,
            intercept,
            iterations,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter()
            .map(|row| logistic(linear(&self.weights, self.intercept, row)))
            .collect()
    }

    /// Class labels at the 0.5 threshold
    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect()
    }
}

fn linear(weights: &[f64], intercept: f64, row: &[f64]) -> f64 {
    intercept + weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = vec![
            vec![-1.5, -1.0],
            vec![-1.0, -1.2],
            vec![-0.5, -0.4],
            vec![0.5, 0.6],
            vec![1.0, 0.9],
            vec![1.5, 1.1],
        ];
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_separable_data_classified() {
        let (x, y) = separable();
        let model = LogisticRegression::fit(&LogisticConfig::default(), &x, &y).unwrap();
        assert_eq!(model.predict(&x), y);
        assert!(model.weights().iter().all(|w| *w > 0.0));
    }

    #[test]
    fn test_penalty_keeps_weights_finite() {
        let (x, y) = separable();
        let model = LogisticRegression::fit(&LogisticConfig::default(), &x, &y).unwrap();
        assert!(model.weights().iter().all(|w| w.is_finite() && w.abs() < 10.0));

        let strong = LogisticConfig {
            c: 0.01,
            ..LogisticConfig::default()
        };
        let shrunk = LogisticRegression::fit(&strong, &x, &y).unwrap();
        assert!(shrunk.weights()[0].abs() < model.weights()[0].abs());
    }

    #[test]
    fn test_strong_penalty_converges() {
        let (x, y) = separable();
        for c in [1e-4, 0.01, 0.1] {
            let config = LogisticConfig {
                c,
                ..LogisticConfig::default()
            };
            let model = LogisticRegression::fit(&config, &x, &y).unwrap();
            assert!(model.weights().iter().all(|w| w.is_finite()), "C = {}", c);
            assert!(model.intercept().is_finite());
        }
    }

    #[test]
    fn test_divergent_fit_is_an_error() {
        let (x, y) = separable();
        let config = LogisticConfig {
            learning_rate: f64::MAX,
            ..LogisticConfig::default()
        };
        assert!(matches!(
            LogisticRegression::fit(&config, &x, &y),
            Err(AnalysisError::CalculationError(_))
        ));
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = separable();
        let model = LogisticRegression::fit(&LogisticConfig::default(), &x, &y).unwrap();
        for p in model.predict_proba(&x) {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        let config = LogisticConfig::default();
        assert!(LogisticRegression::fit(&config, &[], &[]).is_err());
        assert!(LogisticRegression::fit(&config, &[vec![1.0]], &[0.0, 1.0]).is_err());
    }
}
