//! Pipeline orchestration — preprocess once, fan out the training variants,
//! join, compare, promote.

pub mod graph;

pub use graph::{TaskGraph, TaskNode};

use crate::compare::{ComparisonResult, ModelComparator};
use crate::config::PipelineConfig;
use crate::data::{ArrayStore, BucketPreprocessor, DataHandle, FsArrayStore, Preprocessor};
use crate::error::PipelineError;
use crate::model::{ModelBackend, ModelKind, SoftmaxBackend};
use crate::tracking::{ExperimentTracker, FileTrackingStore, RegisteredModel};
use crate::training::{TrainingRun, VariantTrainer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Final user-visible status of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    SucceededWithPromotion {
        comparison: ComparisonResult,
        promoted: RegisteredModel,
    },
    /// The comparison completed but the winner did not reach the
    /// promotion threshold; no stage transition happened.
    SucceededNoPromotion { comparison: ComparisonResult },
    Failed { reason: String },
}

impl PipelineOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed { .. })
    }
}

/// Orchestrates one end-to-end pipeline run.
///
/// Construction is the fail-fast point for configuration errors; `run`
/// converts every downstream failure into `PipelineOutcome::Failed` rather
/// than comparing a partial candidate set.
pub struct Pipeline {
    config: PipelineConfig,
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn ArrayStore>,
    tracker: Arc<dyn ExperimentTracker>,
    preprocessor: Arc<dyn Preprocessor>,
    graph: TaskGraph,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ArrayStore>,
        tracker: Arc<dyn ExperimentTracker>,
        preprocessor: Arc<dyn Preprocessor>,
    ) -> Result<Self, PipelineError> {
        config.params.validate()?;
        if config.cross_validation.k_folds < 2 {
            return Err(PipelineError::config("k_folds must be >= 2"));
        }
        let graph = TaskGraph::standard();
        graph.execution_order()?;
        Ok(Self {
            config,
            backend,
            store,
            tracker,
            preprocessor,
            graph,
        })
    }

    /// Wire up the default collaborators: the softmax backend, a
    /// filesystem array store under the configured bucket, and the
    /// file-backed tracking store under the tracking URI.
    pub fn with_defaults(config: PipelineConfig) -> Result<Self, PipelineError> {
        let store: Arc<dyn ArrayStore> = Arc::new(FsArrayStore::new(&config.bucket));
        let tracker: Arc<dyn ExperimentTracker> = Arc::new(FileTrackingStore::open(
            PathBuf::from(&config.tracking.uri).join("tracking.json"),
        )?);
        let preprocessor: Arc<dyn Preprocessor> = Arc::new(BucketPreprocessor::new(store.clone()));
        Self::new(
            config,
            Arc::new(SoftmaxBackend::new()),
            store,
            tracker,
            preprocessor,
        )
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Execute the full pipeline and return its terminal outcome.
    pub async fn run(&self) -> PipelineOutcome {
        match self.run_inner().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "pipeline run failed");
                PipelineOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_inner(&self) -> Result<PipelineOutcome, PipelineError> {
        let experiment_id = self
            .tracker
            .get_or_create_experiment(&self.config.experiment_name)?;

        tracing::info!(experiment = %self.config.experiment_name, "preprocess");
        let handle = Arc::new(
            self.preprocessor
                .preprocess(&experiment_id, &self.config.bucket)
                .await?,
        );

        let runs = self.train_all(&experiment_id, &handle).await?;

        // Join barrier held: all three runs completed. Candidate order is
        // the graph's training-node order.
        let candidates: Vec<(String, String)> = runs.iter().map(TrainingRun::candidate).collect();

        tracing::info!("compare");
        let comparator = ModelComparator::new(self.tracker.clone());
        let comparison = comparator.compare(&candidates)?;

        match comparator.promote(&comparison, self.config.promotion_threshold)? {
            Some(promoted) => Ok(PipelineOutcome::SucceededWithPromotion {
                comparison,
                promoted,
            }),
            None => Ok(PipelineOutcome::SucceededNoPromotion { comparison }),
        }
    }

    /// Fan the shared handle out to the three training variants and wait
    /// for all of them. Siblings keep running when one fails; the error
    /// surfaces only after the join, so compare never sees a partial set.
    async fn train_all(
        &self,
        experiment_id: &str,
        handle: &Arc<DataHandle>,
    ) -> Result<Vec<TrainingRun>, PipelineError> {
        let kinds = [ModelKind::Basic, ModelKind::CrossVal, ModelKind::ResNet50];
        debug_assert_eq!(kinds.len(), self.graph.training_nodes().len());

        let mut joins = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let trainer = VariantTrainer::new(
                self.backend.clone(),
                self.store.clone(),
                self.tracker.clone(),
                self.config.cross_validation.clone(),
                self.config.seed,
            );
            let experiment_id = experiment_id.to_string();
            let handle = handle.clone();
            let params = self.config.params.clone();
            joins.push((
                kind,
                tokio::spawn(async move {
                    trainer.train(kind, &experiment_id, &handle, &params).await
                }),
            ));
        }

        let mut runs = Vec::with_capacity(joins.len());
        let mut first_error: Option<PipelineError> = None;
        for (kind, join) in joins {
            match join.await {
                Ok(Ok(run)) => runs.push(run),
                Ok(Err(e)) => {
                    tracing::error!(%kind, error = %e, "training node failed");
                    first_error.get_or_insert(e);
                }
                Err(join_err) => {
                    tracing::error!(%kind, error = %join_err, "training node panicked");
                    first_error.get_or_insert(PipelineError::training(format!(
                        "{kind} training task panicked: {join_err}"
                    )));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(runs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn construction_rejects_bad_config() {
        let mut config = PipelineConfig::default();
        config.cross_validation.k_folds = 1;
        let err = Pipeline::with_defaults(config).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let mut config = PipelineConfig::default();
        config.params.epochs = 0;
        assert!(Pipeline::with_defaults(config).is_err());
    }
}
