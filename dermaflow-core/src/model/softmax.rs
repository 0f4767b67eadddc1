//! Deterministic reference backend — a softmax classifier head.
//!
//! Keeps every `ModelParams` key meaningful without pulling in a native NN
//! runtime: seeded weight init per `kernel_initializer`, minibatch SGD over
//! `epochs`/`batch_size`/`learning_rate`, a `validation_split` carve, and a
//! reduce-LR-on-plateau schedule monitoring accuracy. The `ResNet50` kind
//! routes input through a frozen seeded projection trunk (its stand-in for
//! pretrained weights) with `pooling` applied first; `Basic` trains on the
//! flattened input directly.

use crate::data::{Dataset, argmax};
use crate::error::PipelineError;
use crate::model::backend::{FitReport, Model, ModelBackend};
use crate::model::{KernelInitializer, ModelKind, ModelParams, Pooling};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Plateau schedule constants, matching ReduceLROnPlateau as configured in
/// the training entrypoint: monitor accuracy, halve on stagnation.
const PLATEAU_PATIENCE: usize = 5;
const PLATEAU_FACTOR: f64 = 0.5;
const PLATEAU_MIN_LR: f64 = 1e-7;

/// Seed for the frozen transfer-learning trunk. Fixed regardless of the
/// per-run seed: pretrained weights do not change between runs.
const TRUNK_SEED: u64 = 50;
const TRUNK_EMBED_DIM: usize = 64;
const TRUNK_POOL_WINDOW: usize = 4;

#[derive(Debug, Default)]
struct SessionState {
    live_graphs: usize,
}

/// Backend producing softmax-head models.
#[derive(Debug, Default)]
pub struct SoftmaxBackend {
    session: Mutex<SessionState>,
}

impl SoftmaxBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelBackend for SoftmaxBackend {
    fn build(
        &self,
        kind: ModelKind,
        params: &ModelParams,
        seed: u64,
    ) -> Result<Box<dyn Model>, PipelineError> {
        params.validate()?;
        let use_trunk = match kind {
            // CrossVal folds train fresh Basic models; the kind only
            // changes orchestration, not the architecture.
            ModelKind::Basic | ModelKind::CrossVal => false,
            ModelKind::ResNet50 => true,
        };
        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::training("backend session lock poisoned"))?;
        session.live_graphs += 1;
        Ok(Box::new(SoftmaxModel {
            params: params.clone(),
            seed,
            use_trunk,
            weights: None,
        }))
    }

    fn clear_session(&self) {
        if let Ok(mut session) = self.session.lock() {
            session.live_graphs = 0;
        }
    }

    fn live_graphs(&self) -> usize {
        self.session.lock().map(|s| s.live_graphs).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeadWeights {
    /// `num_classes` rows of `dim` weights each.
    w: Vec<Vec<f32>>,
    b: Vec<f32>,
}

struct SoftmaxModel {
    params: ModelParams,
    seed: u64,
    use_trunk: bool,
    weights: Option<HeadWeights>,
}

impl SoftmaxModel {
    /// Pooling + frozen projection for the transfer-learning trunk, identity
    /// for the basic head.
    fn transform(&self, row: &[f32]) -> Vec<f32> {
        if !self.use_trunk {
            return row.to_vec();
        }
        let pooled = pool(row, self.params.pooling, TRUNK_POOL_WINDOW);
        project(&pooled, TRUNK_EMBED_DIM)
    }

    fn init_weights(&self, dim: usize, rng: &mut StdRng) -> HeadWeights {
        let classes = self.params.num_classes;
        let w = match self.params.kernel_initializer {
            KernelInitializer::GlorotUniform => {
                let limit = (6.0 / (dim + classes) as f32).sqrt();
                (0..classes)
                    .map(|_| (0..dim).map(|_| rng.gen_range(-limit..limit)).collect())
                    .collect()
            }
            KernelInitializer::Normal => (0..classes)
                .map(|_| (0..dim).map(|_| gaussian(rng) * 0.05).collect())
                .collect(),
        };
        HeadWeights {
            w,
            b: vec![0.0; classes],
        }
    }

    fn forward(&self, weights: &HeadWeights, x: &[f32]) -> Vec<f32> {
        let logits: Vec<f32> = weights
            .w
            .iter()
            .zip(&weights.b)
            .map(|(row, &b)| row.iter().zip(x).map(|(&w, &v)| w * v).sum::<f32>() + b)
            .collect();
        softmax(&logits)
    }

    fn accuracy_on(&self, weights: &HeadWeights, rows: &[(Vec<f32>, usize)]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let hits = rows
            .iter()
            .filter(|(x, class)| argmax(&self.forward(weights, x)) == *class)
            .count();
        hits as f64 / rows.len() as f64
    }
}

impl Model for SoftmaxModel {
    fn fit(&mut self, train: &Dataset, params: &ModelParams) -> Result<FitReport, PipelineError> {
        train.validate(params.num_classes)?;

        let rows: Vec<(Vec<f32>, usize)> = train
            .features
            .iter()
            .zip(train.label_classes())
            .map(|(f, c)| (self.transform(f), c))
            .collect();

        // Tail carve, matching fit(validation_split=...) semantics.
        let n_val = ((rows.len() as f32) * params.validation_split).floor() as usize;
        let n_train = rows.len() - n_val;
        if n_train == 0 {
            return Err(PipelineError::training(
                "validation_split leaves no training rows",
            ));
        }
        let (train_rows, val_rows) = rows.split_at(n_train);

        let dim = train_rows[0].0.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut weights = self.init_weights(dim, &mut rng);

        let mut lr = params.learning_rate as f64;
        let mut report = FitReport::default();
        let mut best_acc = f64::NEG_INFINITY;
        let mut wait = 0usize;
        let mut order: Vec<usize> = (0..train_rows.len()).collect();

        for epoch in 0..params.epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f64;

            for batch in order.chunks(params.batch_size) {
                let scale = lr as f32 / batch.len() as f32;
                let mut grad_w = vec![vec![0.0f32; dim]; params.num_classes];
                let mut grad_b = vec![0.0f32; params.num_classes];
                for &i in batch {
                    let (x, class) = &train_rows[i];
                    let probs = self.forward(&weights, x);
                    loss_sum += -f64::from((probs[*class] + 1e-9).ln());
                    for c in 0..params.num_classes {
                        let delta = probs[c] - if c == *class { 1.0 } else { 0.0 };
                        for (g, &v) in grad_w[c].iter_mut().zip(x) {
                            *g += delta * v;
                        }
                        grad_b[c] += delta;
                    }
                }
                for c in 0..params.num_classes {
                    for (w, g) in weights.w[c].iter_mut().zip(&grad_w[c]) {
                        *w -= scale * g;
                    }
                    weights.b[c] -= scale * grad_b[c];
                }
            }

            let monitored = if val_rows.is_empty() {
                self.accuracy_on(&weights, train_rows)
            } else {
                self.accuracy_on(&weights, val_rows)
            };

            // Reduce LR on plateau of the monitored accuracy.
            if monitored > best_acc + 1e-4 {
                best_acc = monitored;
                wait = 0;
            } else {
                wait += 1;
                if wait >= PLATEAU_PATIENCE {
                    wait = 0;
                    lr = (lr * PLATEAU_FACTOR).max(PLATEAU_MIN_LR);
                }
            }

            let mean_loss = loss_sum / train_rows.len() as f64;
            report.record_epoch(mean_loss, monitored, lr);
            if params.verbose >= 2 {
                tracing::debug!(epoch, mean_loss, monitored, lr, "epoch complete");
            }
        }

        self.weights = Some(weights);
        Ok(report)
    }

    fn predict(&self, features: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let Some(weights) = &self.weights else {
            return Vec::new();
        };
        features
            .iter()
            .map(|f| self.forward(weights, &self.transform(f)))
            .collect()
    }

    fn evaluate(&self, test: &Dataset) -> Result<f64, PipelineError> {
        test.validate(self.params.num_classes)?;
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| PipelineError::training("model evaluated before fit"))?;
        let truth = test.label_classes();
        let hits = test
            .features
            .iter()
            .zip(&truth)
            .filter(|&(f, &class)| argmax(&self.forward(weights, &self.transform(f))) == class)
            .count();
        Ok(hits as f64 / test.len() as f64)
    }

    fn artifact_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| PipelineError::training("no artifact before fit"))?;
        Ok(serde_json::to_vec(weights)?)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

fn pool(row: &[f32], pooling: Pooling, window: usize) -> Vec<f32> {
    row.chunks(window)
        .map(|chunk| match pooling {
            Pooling::Avg => chunk.iter().sum::<f32>() / chunk.len() as f32,
            Pooling::Max => chunk.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        })
        .collect()
}

/// Frozen random projection keyed by [`TRUNK_SEED`].
fn project(row: &[f32], embed_dim: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(TRUNK_SEED);
    let norm = 1.0 / (row.len() as f32).sqrt();
    (0..embed_dim)
        .map(|_| {
            row.iter()
                .map(|&v| v * rng.gen_range(-1.0f32..1.0) * norm)
                .sum::<f32>()
                .max(0.0)
        })
        .collect()
}

fn gaussian(rng: &mut StdRng) -> f32 {
    // Box-Muller from two uniforms.
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0f32..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_dataset(n_per_class: usize) -> Dataset {
        // Two well-separated clusters so a linear head converges quickly.
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = (i % 5) as f32 * 0.01;
            features.push(vec![1.0 + jitter, 0.0, 0.1]);
            labels.push(vec![1.0, 0.0]);
            features.push(vec![0.0, 1.0 + jitter, 0.9]);
            labels.push(vec![0.0, 1.0]);
        }
        Dataset::new(features, labels)
    }

    fn fast_params() -> ModelParams {
        ModelParams {
            epochs: 40,
            batch_size: 8,
            learning_rate: 0.5,
            validation_split: 0.2,
            verbose: 0,
            ..ModelParams::default()
        }
    }

    #[test]
    fn same_seed_same_score() {
        let backend = SoftmaxBackend::new();
        let params = fast_params();
        let data = toy_dataset(20);

        let mut a = backend.build(ModelKind::Basic, &params, 42).unwrap();
        let mut b = backend.build(ModelKind::Basic, &params, 42).unwrap();
        a.fit(&data, &params).unwrap();
        b.fit(&data, &params).unwrap();
        let score_a = a.evaluate(&data).unwrap();
        let score_b = b.evaluate(&data).unwrap();
        assert!((score_a - score_b).abs() < 1e-12);
    }

    #[test]
    fn separable_data_is_learned() {
        let backend = SoftmaxBackend::new();
        let params = fast_params();
        let data = toy_dataset(30);
        let mut model = backend.build(ModelKind::Basic, &params, 7).unwrap();
        model.fit(&data, &params).unwrap();
        let acc = model.evaluate(&data).unwrap();
        assert!(acc > 0.9, "expected near-perfect fit, got {acc}");
    }

    #[test]
    fn trunk_variant_fits_and_evaluates() {
        let backend = SoftmaxBackend::new();
        let params = fast_params();
        let data = toy_dataset(20);
        let mut model = backend.build(ModelKind::ResNet50, &params, 7).unwrap();
        let report = model.fit(&data, &params).unwrap();
        assert_eq!(report.epochs_completed, params.epochs);
        assert!(model.evaluate(&data).unwrap() >= 0.0);
    }

    #[test]
    fn evaluate_before_fit_fails() {
        let backend = SoftmaxBackend::new();
        let params = fast_params();
        let model = backend.build(ModelKind::Basic, &params, 1).unwrap();
        assert!(model.evaluate(&toy_dataset(4)).is_err());
    }

    #[test]
    fn plateau_reduces_learning_rate() {
        // A vanishingly small LR cannot move accuracy, so the plateau
        // schedule must halve the rate after `patience` stalled epochs.
        let backend = SoftmaxBackend::new();
        let params = ModelParams {
            epochs: PLATEAU_PATIENCE * 3,
            batch_size: 8,
            learning_rate: 1e-6,
            validation_split: 0.2,
            verbose: 0,
            ..ModelParams::default()
        };
        let data = toy_dataset(20);
        let mut model = backend.build(ModelKind::Basic, &params, 3).unwrap();
        let report = model.fit(&data, &params).unwrap();
        assert!(report.final_learning_rate < f64::from(params.learning_rate));
    }

    #[test]
    fn clear_session_resets_graph_count() {
        let backend = SoftmaxBackend::new();
        let params = fast_params();
        backend.build(ModelKind::Basic, &params, 1).unwrap();
        backend.build(ModelKind::CrossVal, &params, 2).unwrap();
        assert_eq!(backend.live_graphs(), 2);
        backend.clear_session();
        assert_eq!(backend.live_graphs(), 0);
    }

    #[test]
    fn pooling_modes_differ() {
        let row = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let avg = pool(&row, Pooling::Avg, 4);
        let max = pool(&row, Pooling::Max, 4);
        assert_eq!(avg, vec![1.5, 5.5]);
        assert_eq!(max, vec![3.0, 7.0]);
    }
}
