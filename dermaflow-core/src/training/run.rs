//! The finalized record of one training-variant execution.

use crate::model::{ModelKind, ModelParams};
use crate::tracking::RegisteredModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed execution of a training variant.
///
/// Created when the variant begins and finalized once training, evaluation,
/// and registration are done; never mutated afterward. Retraining produces
/// a new `TrainingRun`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub kind: ModelKind,
    pub run_id: String,
    pub run_name: String,
    pub started_at: DateTime<Utc>,
    /// Parameter snapshot the run was trained with.
    pub params: ModelParams,
    /// Per-fold accuracies; empty unless the variant is cross-validated.
    pub fold_scores: Vec<f64>,
    /// Prediction accuracy on the shared held-out test partition.
    pub accuracy: f64,
    /// The registry entry created for this run's artifact.
    pub model: RegisteredModel,
}

impl TrainingRun {
    /// The (model name, run id) pair the comparator consumes.
    pub fn candidate(&self) -> (String, String) {
        (self.model.name.clone(), self.run_id.clone())
    }
}
