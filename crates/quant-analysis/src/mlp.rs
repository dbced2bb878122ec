use analysis_core::AnalysisError;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    pub hidden_units: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on both weight matrices
    pub alpha: f64,
    /// Seed for weight initialisation; a fixed seed makes fits reproducible
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_units: 5,
            learning_rate: 0.1,
            epochs: 500,
            alpha: 1e-4,
            seed: 42,
        }
    }
}

/// One hidden ReLU layer with a sigmoid output, trained by full-batch
/// gradient descent on binary cross-entropy.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    hidden_weights: DMatrix<f64>,
    hidden_bias: DVector<f64>,
    output_weights: DVector<f64>,
    output_bias: f64,
    final_loss: f64,
}

impl MlpClassifier {
    pub fn fit(config: &MlpConfig, x: &[Vec<f64>], y: &[f64]) -> Result<Self, AnalysisError> {
        let n = x.len();
        if n == 0 {
            return Err(AnalysisError::InsufficientData(
                "No observations for network training".to_string(),
            ));
        }
        if y.len() != n {
            return Err(AnalysisError::InvalidData(format!(
                "{} feature rows but {} labels",
                n,
                y.len()
            )));
        }
        if config.hidden_units == 0 {
            return Err(AnalysisError::InvalidData(
                "Network needs at least one hidden unit".to_string(),
            ));
        }

        let d = x[0].len();
        let h = config.hidden_units;
        let inputs = to_matrix(x);
        let targets = DVector::from_column_slice(y);
        let n_f = n as f64;

        // Glorot-uniform initialisation
        let mut rng = StdRng::seed_from_u64(config.seed);
        let hidden_bound = (6.0 / (d + h) as f64).sqrt();
        let output_bound = (6.0 / (h + 1) as f64).sqrt();
        let mut model = Self {
            hidden_weights: DMatrix::from_fn(d, h, |_, _| rng.gen_range(-hidden_bound..hidden_bound)),
            hidden_bias: DVector::from_fn(h, |_, _| rng.gen_range(-hidden_bound..hidden_bound)),
            output_weights: DVector::from_fn(h, |_, _| rng.gen_range(-output_bound..output_bound)),
            output_bias: rng.gen_range(-output_bound..output_bound),
            final_loss: f64::NAN,
        };

        for _ in 0..config.epochs {
            let pre_activation = model.hidden_pre_activation(&inputs);
            let activation = pre_activation.map(|z| z.max(0.0));
            let probabilities = model.output(&activation);

            model.final_loss = cross_entropy(&probabilities, &targets)
                + config.alpha / (2.0 * n_f)
                    * (model.hidden_weights.norm_squared() + model.output_weights.norm_squared());

            // dL/dz for the output unit, averaged over the batch
            let output_delta = (&probabilities - &targets) / n_f;

            let grad_output_weights =
                activation.transpose() * &output_delta + &model.output_weights * (config.alpha / n_f);
            let grad_output_bias = output_delta.sum();

            let mut hidden_delta = &output_delta * model.output_weights.transpose();
            hidden_delta.zip_apply(&pre_activation, |delta, z| {
                if z <= 0.0 {
                    *delta = 0.0;
                }
            });

            let grad_hidden_weights =
                inputs.transpose() * &hidden_delta + &model.hidden_weights * (config.alpha / n_f);
            let grad_hidden_bias = hidden_delta.row_sum().transpose();

            model.hidden_weights -= grad_hidden_weights * config.learning_rate;
            model.hidden_bias -= grad_hidden_bias * config.learning_rate;
            model.output_weights -= grad_output_weights * config.learning_rate;
            model.output_bias -= grad_output_bias * config.learning_rate;
        }

        tracing::debug!(
            epochs = config.epochs,
            hidden_units = h,
            loss = model.final_loss,
            "Network trained"
        );

        Ok(model)
    }

    /// Regularised training loss after the last epoch
    pub fn final_loss(&self) -> f64 {
        self.final_loss
    }

    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let inputs = to_matrix(x);
        let activation = self.hidden_pre_activation(&inputs).map(|z| z.max(0.0));
        self.output(&activation).iter().copied().collect()
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect()
    }

    fn hidden_pre_activation(&self, inputs: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = inputs * &self.hidden_weights;
        for (j, bias) in self.hidden_bias.iter().enumerate() {
            z.column_mut(j).add_scalar_mut(*bias);
        }
        z
    }

    fn output(&self, activation: &DMatrix<f64>) -> DVector<f64> {
        (activation * &self.output_weights).map(|z| logistic(z + self.output_bias))
    }
}

fn to_matrix(x: &[Vec<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(x.len(), x[0].len(), |i, j| x[i][j])
}

fn cross_entropy(probabilities: &DVector<f64>, targets: &DVector<f64>) -> f64 {
    const EPS: f64 = 1e-12;
    let total: f64 = probabilities
        .iter()
        .zip(targets.iter())
        .map(|(p, y)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / probabilities.len() as f64
}
