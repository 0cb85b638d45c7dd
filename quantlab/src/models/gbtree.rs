//! Gradient-boosted regression trees for binary classification.
//!
//! Boosting runs on the logistic loss: each round fits a depth-limited
//! regression tree to the gradient/hessian statistics of the current margin,
//! with xgboost-style gain and L2-regularized leaf weights.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const LAMBDA: f64 = 1.0;
const MIN_CHILD_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            rounds: 40,
            learning_rate: 0.08,
            max_depth: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    feature: usize,
    threshold: f64,
    left: usize,
    right: usize,
    value: f64,
    leaf: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    fn predict(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.leaf {
                return node.value;
            }
            let value = sample.get(node.feature).copied().unwrap_or(f64::NAN);
            idx = if value < node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }
}

/// The boosted ensemble itself, serialized as its own JSON text and wrapped
/// in an envelope that carries the feature names.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnsembleText {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Artifact {
    feature_names: Vec<String>,
    model_text: String,
}

#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    feature_names: Vec<String>,
    ensemble: EnsembleText,
}

impl GradientBoostedTrees {
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
        let binary: Vec<f64> = labels.iter().map(|&y| if y >= 0.5 { 1.0 } else { 0.0 }).collect();
        let positives = binary.iter().filter(|&&y| y == 1.0).count();
        if positives == 0 || positives == binary.len() {
            return Err(anyhow!("boosted training requires at least two classes"));
        }
        let opts = sanitize_options(opts);

        let n = samples.len();
        let base_rate = (positives as f64 / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (base_rate / (1.0 - base_rate)).ln();

        let mut margins = vec![base_score; n];
        let mut trees = Vec::with_capacity(opts.rounds);
        for _ in 0..opts.rounds {
            let mut grads = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(margins[i]);
                grads[i] = p - binary[i];
                hess[i] = (p * (1.0 - p)).max(1e-12);
            }

            let mut builder = TreeBuilder {
                samples,
                grads: &grads,
                hess: &hess,
                max_depth: opts.max_depth,
                nodes: Vec::new(),
            };
            let indices: Vec<usize> = (0..n).collect();
            builder.build_node(&indices, 0);
            let tree = Tree { nodes: builder.nodes };

            for i in 0..n {
                margins[i] += opts.learning_rate * tree.predict(&samples[i]);
            }
            trees.push(tree);
        }

        let names = if feature_names.len() == feat_count {
            feature_names.iter().map(|s| s.to_string()).collect()
        } else {
            (0..feat_count).map(|i| format!("f{}", i)).collect()
        };

        Ok(GradientBoostedTrees {
            feature_names: names,
            ensemble: EnsembleText {
                base_score,
                learning_rate: opts.learning_rate,
                trees,
            },
        })
    }

    /// Probability of the positive class, clamped to [0, 1]; a NaN margin
    /// collapses to 0.5.
    pub fn predict_prob(&self, sample: &[f64]) -> f64 {
        let mut margin = self.ensemble.base_score;
        for tree in &self.ensemble.trees {
            margin += self.ensemble.learning_rate * tree.predict(sample);
        }
        let p = sigmoid(margin);
        if p.is_nan() {
            return 0.5;
        }
        p.clamp(0.0, 1.0)
    }

    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.iter().map(|s| self.predict_prob(s)).collect()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let model_text = serde_json::to_string(&self.ensemble)?;
        Ok(serde_json::to_vec(&Artifact {
            feature_names: self.feature_names.clone(),
            model_text,
        })?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(anyhow!("empty artifact"));
        }
        let artifact: Artifact = serde_json::from_slice(data)?;
        let ensemble: EnsembleText = serde_json::from_str(&artifact.model_text)?;
        if ensemble.trees.is_empty() {
            return Err(anyhow!("invalid artifact"));
        }
        Ok(GradientBoostedTrees {
            feature_names: artifact.feature_names,
            ensemble,
        })
    }
}

struct TreeBuilder<'a> {
    samples: &'a [Vec<f64>],
    grads: &'a [f64],
    hess: &'a [f64],
    max_depth: usize,
    nodes: Vec<TreeNode>,
}

impl<'a> TreeBuilder<'a> {
    /// Builds the subtree for `indices`, returning its node index.
    fn build_node(&mut self, indices: &[usize], depth: usize) -> usize {
        let g_sum: f64 = indices.iter().map(|&i| self.grads[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();

        let split = if depth < self.max_depth && indices.len() >= 2 {
            self.best_split(indices, g_sum, h_sum)
        } else {
            None
        };

        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: -g_sum / (h_sum + LAMBDA),
            leaf: true,
        });

        if let Some((feature, threshold, left_idx, right_idx)) = split {
            let left = self.build_node(&left_idx, depth + 1);
            let right = self.build_node(&right_idx, depth + 1);
            let node = &mut self.nodes[node_idx];
            node.feature = feature;
            node.threshold = threshold;
            node.left = left;
            node.right = right;
            node.leaf = false;
        }
        node_idx
    }

    #[allow(clippy::type_complexity)]
    fn best_split(
        &self,
        indices: &[usize],
        g_sum: f64,
        h_sum: f64,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let feat_count = self.samples[indices[0]].len();
        let parent_term = g_sum * g_sum / (h_sum + LAMBDA);

        let mut best_gain = 0.0;
        let mut best: Option<(usize, f64)> = None;

        for feature in 0..feat_count {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| {
                self.samples[a][feature]
                    .partial_cmp(&self.samples[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            for w in 0..order.len() - 1 {
                let idx = order[w];
                g_left += self.grads[idx];
                h_left += self.hess[idx];
                let current = self.samples[idx][feature];
                let next = self.samples[order[w + 1]][feature];
                if current == next {
                    continue;
                }
                let h_right = h_sum - h_left;
                if h_left < MIN_CHILD_WEIGHT || h_right < MIN_CHILD_WEIGHT {
                    continue;
                }
                let g_right = g_sum - g_left;
                let gain = 0.5
                    * (g_left * g_left / (h_left + LAMBDA)
                        + g_right * g_right / (h_right + LAMBDA)
                        - parent_term);
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, (current + next) / 2.0));
                }
            }
        }

        let (feature, threshold) = best?;
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &i in indices {
            if self.samples[i][feature] < threshold {
                left.push(i);
            } else {
                right.push(i);
            }
        }
        if left.is_empty() || right.is_empty() {
            return None;
        }
        Some((feature, threshold, left, right))
    }
}

fn sanitize_options(mut opts: TrainOptions) -> TrainOptions {
    let defaults = TrainOptions::default();
    if opts.rounds == 0 {
        opts.rounds = defaults.rounds;
    }
    if opts.learning_rate <= 0.0 {
        opts.learning_rate = defaults.learning_rate;
    }
    if opts.max_depth == 0 {
        opts.max_depth = defaults.max_depth;
    }
    opts
}

fn sigmoid(x: f64) -> f64 {
    if x > 35.0 {
        return 1.0;
    }
    if x < -35.0 {
        return 0.0;
    }
    1.0 / (1.0 + (-x).exp())
}
