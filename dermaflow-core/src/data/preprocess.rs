//! Preprocessing collaborator — produces the per-run [`DataHandle`].
//!
//! The preprocessing stage itself (image decoding, resizing, augmentation)
//! runs outside this crate; the orchestrator only depends on the contract
//! that it yields four locators to prepared, pre-split arrays.

use crate::data::{ArrayStore, DataHandle};
use crate::error::PipelineError;
use async_trait::async_trait;
use std::sync::Arc;

/// Collaborator that prepares the train/test arrays for one pipeline run.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn preprocess(
        &self,
        experiment_id: &str,
        bucket: &str,
    ) -> Result<DataHandle, PipelineError>;
}

/// Preprocessor over already-prepared arrays in a bucket prefix.
///
/// Resolves the conventional four locators under `prep/` and verifies each
/// one is present and loadable before handing the bundle downstream, so a
/// broken hand-off fails in the preprocess stage rather than inside a
/// training node.
pub struct BucketPreprocessor {
    store: Arc<dyn ArrayStore>,
}

impl BucketPreprocessor {
    pub fn new(store: Arc<dyn ArrayStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Preprocessor for BucketPreprocessor {
    async fn preprocess(
        &self,
        experiment_id: &str,
        bucket: &str,
    ) -> Result<DataHandle, PipelineError> {
        tracing::info!(experiment_id, bucket, "resolving prepared arrays");
        let handle = DataHandle::new(
            "prep/x_train.json",
            "prep/y_train.json",
            "prep/x_test.json",
            "prep/y_test.json",
        );
        for locator in handle.locators() {
            self.store.load_array(locator).map_err(|e| {
                PipelineError::data(format!("preprocessing output missing: {locator}: {e}"))
            })?;
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FsArrayStore;

    #[tokio::test]
    async fn preprocess_fails_when_arrays_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsArrayStore::new(dir.path()));
        let prep = BucketPreprocessor::new(store);
        let err = prep.preprocess("exp-1", "bucket").await.unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[tokio::test]
    async fn preprocess_returns_the_four_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsArrayStore::new(dir.path()));
        for locator in [
            "prep/x_train.json",
            "prep/y_train.json",
            "prep/x_test.json",
            "prep/y_test.json",
        ] {
            store.save_array(locator, &[vec![0.0]]).unwrap();
        }
        let prep = BucketPreprocessor::new(store);
        let handle = prep.preprocess("exp-1", "bucket").await.unwrap();
        assert_eq!(handle.train_features, "prep/x_train.json");
        assert_eq!(handle.test_labels, "prep/y_test.json");
    }
}
