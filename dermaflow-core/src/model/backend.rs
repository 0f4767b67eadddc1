//! Model-building backend seam.
//!
//! Real deployments back this with a native NN runtime; the in-crate
//! [`SoftmaxBackend`](crate::model::SoftmaxBackend) implementation keeps the
//! pipeline deterministic and self-contained. Backends that accumulate
//! global graph/session state expose an explicit reset, invoked through
//! [`SessionScope`] between cross-validation folds.

use crate::data::Dataset;
use crate::error::PipelineError;
use crate::model::{ModelKind, ModelParams};
use serde::{Deserialize, Serialize};

/// Per-epoch observations recorded while fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    pub loss: f64,
    pub monitored_accuracy: f64,
    pub learning_rate: f64,
}

/// Summary of one fit pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitReport {
    pub epochs_completed: usize,
    pub history: Vec<EpochStats>,
    pub final_learning_rate: f64,
}

impl FitReport {
    pub fn record_epoch(&mut self, loss: f64, monitored_accuracy: f64, learning_rate: f64) {
        self.history.push(EpochStats {
            loss,
            monitored_accuracy,
            learning_rate,
        });
        self.epochs_completed += 1;
        self.final_learning_rate = learning_rate;
    }
}

/// One trainable model instance with fresh weights.
pub trait Model: Send {
    /// Fit on `train`, carving `validation_split` from its tail.
    fn fit(&mut self, train: &Dataset, params: &ModelParams) -> Result<FitReport, PipelineError>;

    /// Class-probability rows for each feature row.
    fn predict(&self, features: &[Vec<f32>]) -> Vec<Vec<f32>>;

    /// Prediction accuracy against a held-out split: fraction of rows whose
    /// predicted-class argmax matches the true-class argmax.
    fn evaluate(&self, test: &Dataset) -> Result<f64, PipelineError>;

    /// Serialized weights for artifact storage.
    fn artifact_bytes(&self) -> Result<Vec<u8>, PipelineError>;
}

/// Factory for model instances plus explicit session control.
pub trait ModelBackend: Send + Sync {
    /// Build a fresh model for `kind`. Weights depend only on
    /// (`kind`, `params`, `seed`).
    fn build(
        &self,
        kind: ModelKind,
        params: &ModelParams,
        seed: u64,
    ) -> Result<Box<dyn Model>, PipelineError>;

    /// Drop accumulated graph/session state. State from one build must not
    /// leak into the next once this has run.
    fn clear_session(&self);

    /// Number of graphs built since the last reset.
    fn live_graphs(&self) -> usize;
}

/// Scoped session reset: clears the backend session when dropped, on every
/// exit path. The cross-validation aggregator opens one scope per fold.
pub struct SessionScope<'a> {
    backend: &'a dyn ModelBackend,
}

impl<'a> SessionScope<'a> {
    pub fn new(backend: &'a dyn ModelBackend) -> Self {
        Self { backend }
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        self.backend.clear_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SoftmaxBackend;

    #[test]
    fn session_scope_clears_on_drop() {
        let backend = SoftmaxBackend::new();
        {
            let _scope = SessionScope::new(&backend);
            backend
                .build(ModelKind::Basic, &ModelParams::default(), 7)
                .unwrap();
            assert_eq!(backend.live_graphs(), 1);
        }
        assert_eq!(backend.live_graphs(), 0);
    }

    #[test]
    fn fit_report_tracks_epochs() {
        let mut report = FitReport::default();
        report.record_epoch(0.7, 0.5, 1e-5);
        report.record_epoch(0.6, 0.6, 5e-6);
        assert_eq!(report.epochs_completed, 2);
        assert_eq!(report.final_learning_rate, 5e-6);
    }
}
