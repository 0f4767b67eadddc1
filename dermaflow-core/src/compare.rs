//! Model comparison and promotion.
//!
//! Deciding the winner and acting on the decision are separate steps:
//! [`ModelComparator::compare`] only reads, [`ModelComparator::promote`]
//! performs the single registry stage transition.

use crate::error::PipelineError;
use crate::tracking::{ExperimentTracker, ModelStage, RegisteredModel};
use crate::training::variant::ACCURACY_METRIC;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One scored candidate, as read back from the tracking backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub name: String,
    pub run_id: String,
    pub accuracy: f64,
    pub version: u32,
    pub uri: String,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of one comparison across all completed variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub winning_name: String,
    pub winning_uri: String,
    pub winning_version: u32,
    pub winning_accuracy: f64,
    /// Full table, in candidate order, for logging and postmortem.
    pub scores: Vec<CandidateScore>,
}

/// Compares registered candidates by their recorded accuracy.
pub struct ModelComparator {
    tracker: Arc<dyn ExperimentTracker>,
}

impl ModelComparator {
    pub fn new(tracker: Arc<dyn ExperimentTracker>) -> Self {
        Self { tracker }
    }

    /// Fetch each candidate's recorded accuracy and pick the winner.
    ///
    /// Candidates are (model name, run id) pairs. Any unreadable metric
    /// aborts the comparison — silently excluding a candidate would bias
    /// selection without signaling it. Selection takes the strictly highest
    /// accuracy; ties go to the earliest-registered model, then to the
    /// lexicographically smaller name, so the result is deterministic.
    pub fn compare(
        &self,
        candidates: &[(String, String)],
    ) -> Result<ComparisonResult, PipelineError> {
        if candidates.is_empty() {
            return Err(PipelineError::invalid_input(
                "no candidates to compare",
            ));
        }

        let mut scores = Vec::with_capacity(candidates.len());
        for (name, run_id) in candidates {
            let accuracy = self.tracker.fetch_metric(run_id, ACCURACY_METRIC)?;
            let model = self.tracker.latest_model_version(name)?;
            scores.push(CandidateScore {
                name: name.clone(),
                run_id: run_id.clone(),
                accuracy,
                version: model.version,
                uri: model.source_uri,
                registered_at: model.registered_at,
            });
        }

        let winner = scores
            .iter()
            .min_by(|a, b| {
                b.accuracy
                    .partial_cmp(&a.accuracy)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.registered_at.cmp(&b.registered_at))
                    .then_with(|| a.name.cmp(&b.name))
            })
            .cloned()
            .ok_or_else(|| PipelineError::invalid_input("no candidates to compare"))?;

        tracing::info!(
            winner = %winner.name,
            accuracy = winner.accuracy,
            version = winner.version,
            "comparison complete"
        );

        Ok(ComparisonResult {
            winning_name: winner.name,
            winning_uri: winner.uri,
            winning_version: winner.version,
            winning_accuracy: winner.accuracy,
            scores,
        })
    }

    /// Advance the winner to `Staging` when its accuracy meets `threshold`.
    /// Returns `None` (and performs no transition) otherwise.
    pub fn promote(
        &self,
        result: &ComparisonResult,
        threshold: f64,
    ) -> Result<Option<RegisteredModel>, PipelineError> {
        if result.winning_accuracy < threshold {
            tracing::info!(
                winner = %result.winning_name,
                accuracy = result.winning_accuracy,
                threshold,
                "winner below promotion threshold, not promoting"
            );
            return Ok(None);
        }
        let promoted = self.tracker.transition_stage(
            &result.winning_name,
            result.winning_version,
            ModelStage::Staging,
        )?;
        Ok(Some(promoted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::FileTrackingStore;

    fn seeded_store(
        accuracies: &[(&str, f64)],
    ) -> (tempfile::TempDir, Arc<FileTrackingStore>, Vec<(String, String)>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTrackingStore::open(dir.path().join("tracking.json")).unwrap());
        let exp = store.get_or_create_experiment("exp").unwrap();
        let mut candidates = Vec::new();
        for (name, accuracy) in accuracies {
            let run_id = store.create_run(&exp, name).unwrap();
            store
                .log_metric(&run_id, ACCURACY_METRIC, *accuracy)
                .unwrap();
            store
                .register_model(&format!("runs:/{run_id}/{name}"), name)
                .unwrap();
            candidates.push((name.to_string(), run_id));
        }
        (dir, store, candidates)
    }

    #[test]
    fn highest_accuracy_wins() {
        let (_dir, store, candidates) =
            seeded_store(&[("A", 0.81), ("B", 0.90), ("C", 0.77)]);
        let comparator = ModelComparator::new(store);
        let result = comparator.compare(&candidates).unwrap();
        assert_eq!(result.winning_name, "B");
        assert_eq!(result.winning_version, 1);
        assert_eq!(result.scores.len(), 3);
    }

    #[test]
    fn tie_goes_to_earliest_registered() {
        let (_dir, store, candidates) = seeded_store(&[("A", 0.85), ("B", 0.85)]);
        let comparator = ModelComparator::new(store);
        let result = comparator.compare(&candidates).unwrap();
        // A was registered first
        assert_eq!(result.winning_name, "A");
    }

    #[test]
    fn missing_metric_aborts_instead_of_excluding() {
        let (_dir, store, mut candidates) = seeded_store(&[("A", 0.81), ("B", 0.90)]);
        candidates.push(("C".to_string(), "no-such-run".to_string()));
        let comparator = ModelComparator::new(store);
        let err = comparator.compare(&candidates).unwrap_err();
        assert!(matches!(err, PipelineError::MissingMetric { .. }));
    }

    #[test]
    fn empty_candidate_set_is_rejected() {
        let (_dir, store, _) = seeded_store(&[("A", 0.5)]);
        let comparator = ModelComparator::new(store);
        assert!(comparator.compare(&[]).is_err());
    }

    #[test]
    fn promote_respects_threshold() {
        let (_dir, store, candidates) = seeded_store(&[("A", 0.6)]);
        let comparator = ModelComparator::new(store.clone());
        let result = comparator.compare(&candidates).unwrap();

        assert!(comparator.promote(&result, 0.9).unwrap().is_none());
        let entry = store.get_model_version("A", 1).unwrap();
        assert_eq!(entry.stage, ModelStage::None);

        let promoted = comparator.promote(&result, 0.5).unwrap().unwrap();
        assert_eq!(promoted.stage, ModelStage::Staging);
    }
}
