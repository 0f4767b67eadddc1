//! JSON-file tracking store.
//!
//! Single-file persistence with atomic write-rename and an interior mutex.
//! Suitable for local runs and tests; remote backends implement the same
//! [`ExperimentTracker`] trait against their own storage.

use crate::error::PipelineError;
use crate::tracking::{ExperimentTracker, ModelStage, RegisteredModel, RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExperimentRecord {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TrackingState {
    experiments: Vec<ExperimentRecord>,
    runs: Vec<RunRecord>,
    models: Vec<RegisteredModel>,
}

/// File-backed implementation of [`ExperimentTracker`].
pub struct FileTrackingStore {
    path: PathBuf,
    state: Mutex<TrackingState>,
}

impl FileTrackingStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            TrackingState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// All runs recorded under an experiment, in creation order.
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>, PipelineError> {
        let state = self.lock()?;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.experiment_id == experiment_id)
            .cloned()
            .collect())
    }

    /// All registered versions, in registration order.
    pub fn list_models(&self) -> Result<Vec<RegisteredModel>, PipelineError> {
        let state = self.lock()?;
        Ok(state.models.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TrackingState>, PipelineError> {
        self.state
            .lock()
            .map_err(|_| PipelineError::tracking("tracking store lock poisoned"))
    }

    fn save(&self, state: &TrackingState) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ExperimentTracker for FileTrackingStore {
    fn get_or_create_experiment(&self, name: &str) -> Result<String, PipelineError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.experiments.iter().find(|e| e.name == name) {
            return Ok(existing.id.clone());
        }
        let record = ExperimentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let id = record.id.clone();
        state.experiments.push(record);
        self.save(&state)?;
        tracing::info!(experiment = name, %id, "created experiment");
        Ok(id)
    }

    fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<String, PipelineError> {
        let mut state = self.lock()?;
        if !state.experiments.iter().any(|e| e.id == experiment_id) {
            return Err(PipelineError::not_found(format!(
                "experiment {experiment_id}"
            )));
        }
        let run = RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            experiment_id: experiment_id.to_string(),
            run_name: run_name.to_string(),
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started_at: Utc::now(),
            ended_at: None,
        };
        let run_id = run.run_id.clone();
        state.runs.push(run);
        self.save(&state)?;
        Ok(run_id)
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<(), PipelineError> {
        let mut state = self.lock()?;
        let run = find_run_mut(&mut state.runs, run_id)?;
        if run.params.contains_key(key) {
            return Err(PipelineError::already_exists(format!(
                "param '{key}' on run {run_id}"
            )));
        }
        run.params.insert(key.to_string(), value.to_string());
        self.save(&state)
    }

    fn log_metric(&self, run_id: &str, name: &str, value: f64) -> Result<(), PipelineError> {
        let mut state = self.lock()?;
        let run = find_run_mut(&mut state.runs, run_id)?;
        run.metrics.insert(name.to_string(), value);
        self.save(&state)
    }

    fn fetch_metric(&self, run_id: &str, name: &str) -> Result<f64, PipelineError> {
        let state = self.lock()?;
        let run = state
            .runs
            .iter()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| PipelineError::missing_metric(run_id, name))?;
        run.metrics
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::missing_metric(run_id, name))
    }

    fn log_artifact(
        &self,
        run_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, PipelineError> {
        {
            let state = self.lock()?;
            if !state.runs.iter().any(|r| r.run_id == run_id) {
                return Err(PipelineError::not_found(format!("run {run_id}")));
            }
        }
        let dir = self
            .path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("artifacts")
            .join(run_id);
        std::fs::create_dir_all(&dir)?;
        let target = dir.join(name);
        std::fs::write(&target, bytes)?;
        Ok(target.display().to_string())
    }

    fn register_model(
        &self,
        model_uri: &str,
        name: &str,
    ) -> Result<RegisteredModel, PipelineError> {
        let mut state = self.lock()?;
        let version = state
            .models
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.version)
            .max()
            .map_or(1, |v| v + 1);
        let model = RegisteredModel {
            name: name.to_string(),
            version,
            stage: ModelStage::None,
            source_uri: model_uri.to_string(),
            registered_at: Utc::now(),
        };
        state.models.push(model.clone());
        self.save(&state)?;
        tracing::info!(model = name, version, "registered model version");
        Ok(model)
    }

    fn get_model_version(
        &self,
        name: &str,
        version: u32,
    ) -> Result<RegisteredModel, PipelineError> {
        let state = self.lock()?;
        state
            .models
            .iter()
            .find(|m| m.name == name && m.version == version)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("model {name} v{version}")))
    }

    fn latest_model_version(&self, name: &str) -> Result<RegisteredModel, PipelineError> {
        let state = self.lock()?;
        state
            .models
            .iter()
            .filter(|m| m.name == name)
            .max_by_key(|m| m.version)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("model {name}")))
    }

    fn transition_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
    ) -> Result<RegisteredModel, PipelineError> {
        let mut state = self.lock()?;
        let model = state
            .models
            .iter_mut()
            .find(|m| m.name == name && m.version == version)
            .ok_or_else(|| PipelineError::not_found(format!("model {name} v{version}")))?;
        model.stage = stage;
        let updated = model.clone();
        self.save(&state)?;
        tracing::info!(model = name, version, ?stage, "stage transition");
        Ok(updated)
    }

    fn finalize_run(&self, run_id: &str, status: RunStatus) -> Result<(), PipelineError> {
        let mut state = self.lock()?;
        let run = find_run_mut(&mut state.runs, run_id)?;
        run.status = status;
        run.ended_at = Some(Utc::now());
        self.save(&state)
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord, PipelineError> {
        let state = self.lock()?;
        state
            .runs
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("run {run_id}")))
    }
}

fn find_run_mut<'a>(
    runs: &'a mut [RunRecord],
    run_id: &str,
) -> Result<&'a mut RunRecord, PipelineError> {
    runs.iter_mut()
        .find(|r| r.run_id == run_id)
        .ok_or_else(|| PipelineError::not_found(format!("run {run_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, FileTrackingStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::open(dir.path().join("tracking.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn experiment_creation_is_idempotent() {
        let (_dir, store) = store();
        let a = store.get_or_create_experiment("cnn_skin_cancer").unwrap();
        let b = store.get_or_create_experiment("cnn_skin_cancer").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_param_is_rejected() {
        let (_dir, store) = store();
        let exp = store.get_or_create_experiment("exp").unwrap();
        let run = store.create_run(&exp, "run").unwrap();
        store.log_param(&run, "epochs", "2").unwrap();
        let err = store.log_param(&run, "epochs", "3").unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyExists(_)));
        // original value untouched
        assert_eq!(store.get_run(&run).unwrap().params["epochs"], "2");
    }

    #[test]
    fn versions_are_monotone_per_name() {
        let (_dir, store) = store();
        let v1 = store.register_model("runs:/a/Basic", "Basic").unwrap();
        let v2 = store.register_model("runs:/b/Basic", "Basic").unwrap();
        let other = store.register_model("runs:/c/ResNet50", "ResNet50").unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(other.version, 1);
        assert_eq!(v1.stage, ModelStage::None);
    }

    #[test]
    fn fetch_metric_missing_is_loud() {
        let (_dir, store) = store();
        let exp = store.get_or_create_experiment("exp").unwrap();
        let run = store.create_run(&exp, "run").unwrap();
        let err = store.fetch_metric(&run, "prediction_accuracy").unwrap_err();
        assert!(matches!(err, PipelineError::MissingMetric { .. }));
        let err = store.fetch_metric("no-such-run", "prediction_accuracy").unwrap_err();
        assert!(matches!(err, PipelineError::MissingMetric { .. }));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        {
            let store = FileTrackingStore::open(&path).unwrap();
            let exp = store.get_or_create_experiment("exp").unwrap();
            let run = store.create_run(&exp, "run").unwrap();
            store.log_metric(&run, "prediction_accuracy", 0.81).unwrap();
            store.finalize_run(&run, RunStatus::Finished).unwrap();
        }
        let reopened = FileTrackingStore::open(&path).unwrap();
        let exp = reopened.get_or_create_experiment("exp").unwrap();
        assert!(!exp.is_empty());
        assert_eq!(reopened.lock().unwrap().runs.len(), 1);
    }

    #[test]
    fn artifacts_land_under_the_run() {
        let (_dir, store) = store();
        let exp = store.get_or_create_experiment("exp").unwrap();
        let run = store.create_run(&exp, "run").unwrap();
        let uri = store.log_artifact(&run, "Basic.json", b"{}").unwrap();
        assert!(uri.contains(&run));
        assert_eq!(std::fs::read(&uri).unwrap(), b"{}");
    }

    #[test]
    fn stage_transition_updates_entry() {
        let (_dir, store) = store();
        store.register_model("runs:/a/Basic", "Basic").unwrap();
        let updated = store
            .transition_stage("Basic", 1, ModelStage::Staging)
            .unwrap();
        assert_eq!(updated.stage, ModelStage::Staging);
        let fetched = store.get_model_version("Basic", 1).unwrap();
        assert_eq!(fetched.stage, ModelStage::Staging);
    }
}
