//! Logistic regression trained with full-batch gradient descent.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            learning_rate: 0.05,
            epochs: 600,
            l2: 1e-4,
        }
    }
}

/// Serialized model state. Inputs are standardized with the training-set
/// mean/std stored here; a zero std is replaced by 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Artifact {
    feature_names: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    stds: Vec<f64>,
    l2: f64,
    learning_rate: f64,
    epochs: usize,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    artifact: Artifact,
}

impl LogisticRegression {
    /// Full-batch gradient descent of binary cross-entropy with L2 on the
    /// weights (the bias is not regularized).
    pub fn train(
        samples: &[Vec<f64>],
        labels: &[f64],
        feature_names: &[&str],
        opts: TrainOptions,
    ) -> Result<Self> {
        if samples.is_empty() || samples.len() != labels.len() {
            return Err(anyhow!("invalid training dataset"));
        }
        let feat_count = samples[0].len();
        if feat_count == 0 {
            return Err(anyhow!("empty feature vectors"));
        }
        let opts = sanitize_options(opts);

        let n = samples.len() as f64;
        let mut means = vec![0.0; feat_count];
        let mut stds = vec![0.0; feat_count];
        for j in 0..feat_count {
            for row in samples {
                means[j] += row[j];
            }
            means[j] /= n;
            for row in samples {
                let d = row[j] - means[j];
                stds[j] += d * d;
            }
            stds[j] = (stds[j] / n).sqrt();
            if stds[j] == 0.0 {
                stds[j] = 1.0;
            }
        }

        let mut weights = vec![0.0; feat_count];
        let mut bias = 0.0;

        for _ in 0..opts.epochs {
            let mut grads = vec![0.0; feat_count];
            let mut grad_bias = 0.0;
            for (row, &label) in samples.iter().zip(labels.iter()) {
                let x = standardize(row, &means, &stds);
                let p = sigmoid(dot(&weights, &x) + bias);
                let err = p - label;
                for j in 0..feat_count {
                    grads[j] += err * x[j];
                }
                grad_bias += err;
            }
            for j in 0..feat_count {
                let grad = grads[j] / n + opts.l2 * weights[j];
                weights[j] -= opts.learning_rate * grad;
            }
            bias -= opts.learning_rate * (grad_bias / n);
        }

        let names = if feature_names.len() == feat_count {
            feature_names.iter().map(|s| s.to_string()).collect()
        } else {
            (0..feat_count).map(|i| format!("f{}", i)).collect()
        };

        Ok(LogisticRegression {
            artifact: Artifact {
                feature_names: names,
                weights,
                bias,
                means,
                stds,
                l2: opts.l2,
                learning_rate: opts.learning_rate,
                epochs: opts.epochs,
            },
        })
    }

    /// Probability of the positive class; mismatched input widths fall back
    /// to 0.5.
    pub fn predict_prob(&self, sample: &[f64]) -> f64 {
        if sample.len() != self.artifact.weights.len() {
            return 0.5;
        }
        let x = standardize(sample, &self.artifact.means, &self.artifact.stds);
        sigmoid(dot(&self.artifact.weights, &x) + self.artifact.bias)
    }

    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.iter().map(|s| self.predict_prob(s)).collect()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.artifact)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(anyhow!("empty artifact"));
        }
        let artifact: Artifact = serde_json::from_slice(data)?;
        if artifact.weights.is_empty()
            || artifact.weights.len() != artifact.means.len()
            || artifact.weights.len() != artifact.stds.len()
        {
            return Err(anyhow!("invalid artifact"));
        }
        Ok(LogisticRegression { artifact })
    }
}

fn sanitize_options(mut opts: TrainOptions) -> TrainOptions {
    let defaults = TrainOptions::default();
    if opts.learning_rate <= 0.0 {
        opts.learning_rate = defaults.learning_rate;
    }
    if opts.epochs == 0 {
        opts.epochs = defaults.epochs;
    }
    if opts.l2 < 0.0 {
        opts.l2 = defaults.l2;
    }
    opts
}

/// Saturates at |x| > 35 to avoid exp overflow.
fn sigmoid(x: f64) -> f64 {
    if x > 35.0 {
        return 1.0;
    }
    if x < -35.0 {
        return 0.0;
    }
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn standardize(sample: &[f64], means: &[f64], stds: &[f64]) -> Vec<f64> {
    sample
        .iter()
        .zip(means.iter().zip(stds.iter()))
        .map(|(v, (m, s))| (v - m) / s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for i in 0..200 {
            let x = (i % 20) as f64 / 10.0 - 1.0;
            let noise = ((i * 17) % 7) as f64 / 100.0;
            samples.push(vec![x, x * 0.5 + noise]);
            labels.push(if x > 0.0 { 1.0 } else { 0.0 });
        }
        (samples, labels)
    }

    #[test]
    fn test_train_learns_separable_data() {
        let (samples, labels) = separable_dataset();
        let model =
            LogisticRegression::train(&samples, &labels, &["a", "b"], TrainOptions::default())
                .unwrap();
        assert!(model.predict_prob(&[0.9, 0.45]) > 0.8);
        assert!(model.predict_prob(&[-0.9, -0.45]) < 0.2);
    }

    #[test]
    fn test_train_rejects_bad_input() {
        assert!(LogisticRegression::train(&[], &[], &[], TrainOptions::default()).is_err());
        assert!(LogisticRegression::train(
            &[vec![1.0]],
            &[1.0, 0.0],
            &[],
            TrainOptions::default()
        )
        .is_err());
    }

    #[test]
    fn test_artifact_round_trip_is_bit_identical() {
        let (samples, labels) = separable_dataset();
        let model =
            LogisticRegression::train(&samples, &labels, &["a", "b"], TrainOptions::default())
                .unwrap();
        let bytes = model.to_bytes().unwrap();
        let restored = LogisticRegression::from_bytes(&bytes).unwrap();
        for sample in &samples {
            assert_eq!(model.predict_prob(sample), restored.predict_prob(sample));
        }
        assert_eq!(model.feature_names(), restored.feature_names());
    }

    #[test]
    fn test_predict_prob_width_mismatch_is_neutral() {
        let (samples, labels) = separable_dataset();
        let model =
            LogisticRegression::train(&samples, &labels, &["a", "b"], TrainOptions::default())
                .unwrap();
        assert_eq!(model.predict_prob(&[1.0]), 0.5);
    }

    #[test]
    fn test_constant_feature_does_not_blow_up() {
        let samples: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![5.0, if i % 2 == 0 { 1.0 } else { -1.0 }])
            .collect();
        let labels: Vec<f64> = (0..50).map(|i| (i % 2 == 0) as i32 as f64).collect();
        let model =
            LogisticRegression::train(&samples, &labels, &["const", "x"], TrainOptions::default())
                .unwrap();
        let p = model.predict_prob(&[5.0, 1.0]);
        assert!(p.is_finite());
        assert!(p > 0.5);
    }
}
