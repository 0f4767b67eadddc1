//! Experiment tracking — run records, metric logging, model registry.
//!
//! The tracking backend is an external, concurrently-writable service; this
//! module owns only the contract the pipeline core needs: scoped run
//! recording, append-only parameters, metric read-back for comparison, and
//! registry stage transitions. [`FileTrackingStore`] is the in-repo
//! implementation.

pub mod file_store;

pub use file_store::FileTrackingStore;

use crate::error::PipelineError;
use crate::model::ModelParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle stage of a registered model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStage {
    None,
    Staging,
    Production,
    Archived,
}

/// A versioned model entry in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub version: u32,
    pub stage: ModelStage,
    /// Artifact location the version points at.
    pub source_uri: String,
    pub registered_at: DateTime<Utc>,
}

/// Terminal status of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// One recorded run: parameters, metrics, lifecycle timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Contract against the experiment-tracking backend.
///
/// Implementations must tolerate concurrent writers as long as each writer
/// stays under its own run id; the orchestrator guarantees run-id
/// uniqueness across parallel training nodes.
pub trait ExperimentTracker: Send + Sync {
    /// Return the id for `name`, creating the experiment if it does not
    /// exist. Only the already-exists condition is absorbed; any other
    /// backend failure surfaces.
    fn get_or_create_experiment(&self, name: &str) -> Result<String, PipelineError>;

    /// Open a new run under an experiment and return its id.
    fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<String, PipelineError>;

    /// Record one parameter. Append-only per run: logging the same key
    /// twice within a run is an already-exists error.
    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<(), PipelineError>;

    /// Append a named scalar observation to a run.
    fn log_metric(&self, run_id: &str, name: &str, value: f64) -> Result<(), PipelineError>;

    /// Read a metric back for comparison. A missing run or metric is a
    /// missing-metric error, never a default value.
    fn fetch_metric(&self, run_id: &str, name: &str) -> Result<f64, PipelineError>;

    /// Store serialized artifact bytes under a run and return their
    /// resolvable location.
    fn log_artifact(
        &self,
        run_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, PipelineError>;

    /// Create the next version under `name` pointing at `model_uri`.
    /// Initial stage is `None`.
    fn register_model(
        &self,
        model_uri: &str,
        name: &str,
    ) -> Result<RegisteredModel, PipelineError>;

    /// Look up one registered version.
    fn get_model_version(&self, name: &str, version: u32)
    -> Result<RegisteredModel, PipelineError>;

    /// The most recently registered version under `name`.
    fn latest_model_version(&self, name: &str) -> Result<RegisteredModel, PipelineError>;

    /// Move a registered version to a new lifecycle stage.
    fn transition_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
    ) -> Result<RegisteredModel, PipelineError>;

    /// Close a run with its terminal status.
    fn finalize_run(&self, run_id: &str, status: RunStatus) -> Result<(), PipelineError>;

    /// Fetch the full run record (postmortem inspection).
    fn get_run(&self, run_id: &str) -> Result<RunRecord, PipelineError>;
}

/// Scoped recording context for one run.
///
/// Guarantees finalization on every exit path: if the context is dropped
/// without an explicit [`finish`](RunContext::finish), the run is closed as
/// `Failed`, keeping already-logged parameters and metrics visible for
/// postmortem.
pub struct RunContext {
    tracker: Arc<dyn ExperimentTracker>,
    run_id: String,
    finished: bool,
}

impl RunContext {
    pub fn start(
        tracker: Arc<dyn ExperimentTracker>,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<Self, PipelineError> {
        let run_id = tracker.create_run(experiment_id, run_name)?;
        Ok(Self {
            tracker,
            run_id,
            finished: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_param(&self, key: &str, value: &str) -> Result<(), PipelineError> {
        self.tracker.log_param(&self.run_id, key, value)
    }

    /// Log every `ModelParams` key at once.
    pub fn log_params(&self, params: &ModelParams) -> Result<(), PipelineError> {
        for (key, value) in params.to_pairs() {
            self.log_param(&key, &value)?;
        }
        Ok(())
    }

    pub fn log_metric(&self, name: &str, value: f64) -> Result<(), PipelineError> {
        self.tracker.log_metric(&self.run_id, name, value)
    }

    pub fn log_artifact(&self, name: &str, bytes: &[u8]) -> Result<String, PipelineError> {
        self.tracker.log_artifact(&self.run_id, name, bytes)
    }

    pub fn register_model(
        &self,
        model_uri: &str,
        name: &str,
    ) -> Result<RegisteredModel, PipelineError> {
        self.tracker.register_model(model_uri, name)
    }

    /// Close the run with an explicit status.
    pub fn finish(mut self, status: RunStatus) -> Result<(), PipelineError> {
        self.finished = true;
        self.tracker.finalize_run(&self.run_id, status)
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.tracker.finalize_run(&self.run_id, RunStatus::Failed) {
                tracing::warn!(run_id = %self.run_id, error = %e, "failed to finalize abandoned run");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abandoned_context_finalizes_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ExperimentTracker> =
            Arc::new(FileTrackingStore::open(dir.path().join("tracking.json")).unwrap());
        let exp = store.get_or_create_experiment("exp").unwrap();

        let run_id = {
            let ctx = RunContext::start(store.clone(), &exp, "20240101_000000-Basic").unwrap();
            ctx.log_param("epochs", "2").unwrap();
            ctx.run_id().to_string()
            // dropped without finish()
        };

        let record = store.get_run(&run_id).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.params.get("epochs").unwrap(), "2");
    }

    #[test]
    fn finished_context_keeps_status() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ExperimentTracker> =
            Arc::new(FileTrackingStore::open(dir.path().join("tracking.json")).unwrap());
        let exp = store.get_or_create_experiment("exp").unwrap();

        let ctx = RunContext::start(store.clone(), &exp, "run").unwrap();
        let run_id = ctx.run_id().to_string();
        ctx.log_metric("prediction_accuracy", 0.9).unwrap();
        ctx.finish(RunStatus::Finished).unwrap();

        let record = store.get_run(&run_id).unwrap();
        assert_eq!(record.status, RunStatus::Finished);
    }
}
