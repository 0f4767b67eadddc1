//! K-fold cross-validation — deterministic fold assignment and score
//! aggregation.

use crate::data::Dataset;
use crate::error::PipelineError;
use crate::model::{ModelBackend, ModelKind, ModelParams, SessionScope};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

/// Deterministic k-fold splitter.
///
/// Same seed + same row count => identical fold assignment. The first
/// `n % k` folds receive one extra row, so the folds partition the rows
/// exactly: no overlap, no omission.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub k: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl KFold {
    pub fn new(k: usize, shuffle: bool, seed: u64) -> Self {
        Self { k, shuffle, seed }
    }

    /// Produce `k` (train_indices, heldout_indices) pairs over `n` rows.
    pub fn split(&self, n: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, PipelineError> {
        if self.k < 2 {
            return Err(PipelineError::config(format!(
                "k-fold requires k >= 2, got {}",
                self.k
            )));
        }
        if self.k > n {
            return Err(PipelineError::config(format!(
                "cannot split {n} rows into {} folds",
                self.k
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            indices.shuffle(&mut rng);
        }

        let base = n / self.k;
        let extra = n % self.k;
        let mut folds = Vec::with_capacity(self.k);
        let mut cursor = 0;
        for fold in 0..self.k {
            let size = base + usize::from(fold < extra);
            let heldout: Vec<usize> = indices[cursor..cursor + size].to_vec();
            let train: Vec<usize> = indices[..cursor]
                .iter()
                .chain(&indices[cursor + size..])
                .copied()
                .collect();
            folds.push((train, heldout));
            cursor += size;
        }
        Ok(folds)
    }
}

/// Runs a training variant over `k` partitions and aggregates fold scores.
///
/// Does not pick a winner among folds; the caller treats the mean as the
/// representative score.
pub struct CrossValidationAggregator {
    backend: Arc<dyn ModelBackend>,
}

impl CrossValidationAggregator {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Train a fresh model per fold on the other `k-1` folds and evaluate
    /// on the held-out one. Folds run sequentially; the backend session is
    /// reset between folds so no state leaks from one model to the next.
    pub fn run_k_fold(
        &self,
        train: &Dataset,
        params: &ModelParams,
        k: usize,
        shuffle: bool,
        seed: u64,
    ) -> Result<(Vec<f64>, f64), PipelineError> {
        params.validate()?;
        train.validate(params.num_classes)?;

        let folds = KFold::new(k, shuffle, seed).split(train.len())?;
        let mut fold_scores = Vec::with_capacity(k);

        for (fold_idx, (train_idx, heldout_idx)) in folds.iter().enumerate() {
            let _scope = SessionScope::new(self.backend.as_ref());
            let fold_train = train.select(train_idx);
            let fold_heldout = train.select(heldout_idx);

            let fold_seed = seed.wrapping_add(fold_idx as u64);
            let mut model = self
                .backend
                .build(ModelKind::Basic, params, fold_seed)?;
            model.fit(&fold_train, params)?;
            let score = model.evaluate(&fold_heldout)?;
            tracing::info!(fold = fold_idx, score, "fold evaluated");
            fold_scores.push(score);
        }

        let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        Ok((fold_scores, mean))
    }
}
