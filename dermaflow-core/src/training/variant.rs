//! Polymorphic training over the three model variants.

use crate::config::CrossValidationConfig;
use crate::data::{ArrayStore, DataHandle, Dataset};
use crate::error::PipelineError;
use crate::model::{ModelBackend, ModelKind, ModelParams};
use crate::tracking::{ExperimentTracker, RunContext, RunStatus};
use crate::training::{CrossValidationAggregator, TrainingRun};
use chrono::Utc;
use std::sync::Arc;

struct TrainingRunParts {
    fold_scores: Vec<f64>,
    accuracy: f64,
}

/// Name of the scalar every variant records for comparison.
pub const ACCURACY_METRIC: &str = "prediction_accuracy";

/// Trains one variant end to end: fit, evaluate, record, register.
pub struct VariantTrainer {
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn ArrayStore>,
    tracker: Arc<dyn ExperimentTracker>,
    cross_validation: CrossValidationConfig,
    seed: u64,
}

impl VariantTrainer {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ArrayStore>,
        tracker: Arc<dyn ExperimentTracker>,
        cross_validation: CrossValidationConfig,
        seed: u64,
    ) -> Self {
        Self {
            backend,
            store,
            tracker,
            cross_validation,
            seed,
        }
    }

    /// Train `kind` against the shared [`DataHandle`] and return the
    /// finalized run.
    ///
    /// Recording order is fixed: parameters before training, the accuracy
    /// metric after evaluation, registration last. The run context is
    /// finalized on every exit path; a failure mid-training leaves a
    /// `Failed` run with its parameters visible.
    pub async fn train(
        &self,
        kind: ModelKind,
        experiment_id: &str,
        data: &DataHandle,
        params: &ModelParams,
    ) -> Result<TrainingRun, PipelineError> {
        params.validate()?;

        tracing::info!(%kind, "loading data");
        let train = self.store.load_train(data)?;
        let test = self.store.load_test(data)?;
        train.validate(params.num_classes)?;
        test.validate(params.num_classes)?;

        let started_at = Utc::now();
        // Timestamp + kind keeps run names unique across the parallel
        // training nodes of one pipeline invocation.
        let run_name = format!("{}-{}", started_at.format("%Y%m%d_%H%M%S"), kind);
        let ctx = RunContext::start(self.tracker.clone(), experiment_id, &run_name)?;
        ctx.log_params(params)?;

        tracing::info!(%kind, run_id = ctx.run_id(), "training model");
        let parts = self.fit_and_evaluate(kind, &train, &test, params, &ctx)?;

        ctx.log_metric(ACCURACY_METRIC, parts.accuracy)?;
        tracing::info!(%kind, accuracy = parts.accuracy, "evaluated on held-out test split");

        let model_uri = format!("runs:/{}/{}", ctx.run_id(), kind);
        let registered = ctx.register_model(&model_uri, kind.as_str())?;

        let run = TrainingRun {
            kind,
            run_id: ctx.run_id().to_string(),
            run_name,
            started_at,
            params: params.clone(),
            fold_scores: parts.fold_scores,
            accuracy: parts.accuracy,
            model: registered,
        };
        ctx.finish(RunStatus::Finished)?;
        Ok(run)
    }

    fn fit_and_evaluate(
        &self,
        kind: ModelKind,
        train: &Dataset,
        test: &Dataset,
        params: &ModelParams,
        ctx: &RunContext,
    ) -> Result<TrainingRunParts, PipelineError> {
        match kind {
            ModelKind::Basic | ModelKind::ResNet50 => {
                let mut model = self.backend.build(kind, params, self.seed)?;
                model.fit(train, params)?;
                let accuracy = model.evaluate(test)?;
                ctx.log_artifact(&format!("{kind}.json"), &model.artifact_bytes()?)?;
                Ok(TrainingRunParts {
                    fold_scores: Vec::new(),
                    accuracy,
                })
            }
            ModelKind::CrossVal => {
                let aggregator = CrossValidationAggregator::new(self.backend.clone());
                let (fold_scores, mean) = aggregator.run_k_fold(
                    train,
                    params,
                    self.cross_validation.k_folds,
                    self.cross_validation.shuffle,
                    self.seed,
                )?;
                for (i, score) in fold_scores.iter().enumerate() {
                    ctx.log_metric(&format!("fold_{}_accuracy", i + 1), *score)?;
                }
                ctx.log_metric("cv_mean_accuracy", mean)?;

                // One registered model per run: refit on the full training
                // set, then score it against the shared test split.
                let mut model = self.backend.build(kind, params, self.seed)?;
                model.fit(train, params)?;
                let accuracy = model.evaluate(test)?;
                ctx.log_artifact(&format!("{kind}.json"), &model.artifact_bytes()?)?;
                Ok(TrainingRunParts {
                    fold_scores,
                    accuracy,
                })
            }
        }
    }
}
