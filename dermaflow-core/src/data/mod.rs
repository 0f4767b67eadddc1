//! Data hand-off contract — handles, in-memory arrays, stores, preprocessing.

pub mod preprocess;
pub mod store;

pub use preprocess::{BucketPreprocessor, Preprocessor};
pub use store::{ArrayStore, FsArrayStore};

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Immutable reference bundle pointing at the prepared train/test arrays.
///
/// Created exactly once per pipeline run by the preprocessing stage and
/// shared read-only with every training variant, so all evaluation scores
/// are computed against the same held-out test partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataHandle {
    pub train_features: String,
    pub train_labels: String,
    pub test_features: String,
    pub test_labels: String,
}

impl DataHandle {
    pub fn new(
        train_features: impl Into<String>,
        train_labels: impl Into<String>,
        test_features: impl Into<String>,
        test_labels: impl Into<String>,
    ) -> Self {
        Self {
            train_features: train_features.into(),
            train_labels: train_labels.into(),
            test_features: test_features.into(),
            test_labels: test_labels.into(),
        }
    }

    pub fn locators(&self) -> [&str; 4] {
        [
            &self.train_features,
            &self.train_labels,
            &self.test_features,
            &self.test_labels,
        ]
    }
}

/// An in-memory split: row-major feature vectors plus one-hot label rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<Vec<f32>>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f32>>, labels: Vec<Vec<f32>>) -> Self {
        Self { features, labels }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Select the rows at `indices`, in order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    /// Validate shape consistency against the expected class count.
    ///
    /// Rows must be non-empty, every feature row the same width, and every
    /// label row exactly `num_classes` wide (one-hot form).
    pub fn validate(&self, num_classes: usize) -> Result<(), PipelineError> {
        if self.features.is_empty() {
            return Err(PipelineError::data("dataset has no feature rows"));
        }
        if self.features.len() != self.labels.len() {
            return Err(PipelineError::data(format!(
                "feature/label row count mismatch: {} vs {}",
                self.features.len(),
                self.labels.len()
            )));
        }
        let width = self.features[0].len();
        if width == 0 {
            return Err(PipelineError::data("feature rows are empty"));
        }
        for (i, row) in self.features.iter().enumerate() {
            if row.len() != width {
                return Err(PipelineError::data(format!(
                    "feature row {} has width {}, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
        }
        for (i, row) in self.labels.iter().enumerate() {
            if row.len() != num_classes {
                return Err(PipelineError::data(format!(
                    "label row {} has width {}, expected {} (one-hot)",
                    i,
                    row.len(),
                    num_classes
                )));
            }
        }
        Ok(())
    }

    /// Class index of each label row (argmax over the one-hot encoding).
    pub fn label_classes(&self) -> Vec<usize> {
        self.labels.iter().map(|row| argmax(row)).collect()
    }
}

/// Index of the largest element. Ties resolve to the lowest index.
pub fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}
