//! Array storage — locator resolution for prepared feature/label arrays.

use crate::data::{DataHandle, Dataset};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serialized form of one array pair on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredArray {
    rows: Vec<Vec<f32>>,
}

/// Resolves locators from a [`DataHandle`] into in-memory arrays.
///
/// The pipeline core only depends on this contract; production deployments
/// back it with object storage, tests and local runs with [`FsArrayStore`].
pub trait ArrayStore: Send + Sync {
    /// Load one array (feature or label rows) by locator.
    fn load_array(&self, locator: &str) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Persist one array under a locator.
    fn save_array(&self, locator: &str, rows: &[Vec<f32>]) -> Result<(), PipelineError>;

    /// Load the train split referenced by a handle.
    fn load_train(&self, handle: &DataHandle) -> Result<Dataset, PipelineError> {
        Ok(Dataset::new(
            self.load_array(&handle.train_features)?,
            self.load_array(&handle.train_labels)?,
        ))
    }

    /// Load the held-out test split referenced by a handle.
    fn load_test(&self, handle: &DataHandle) -> Result<Dataset, PipelineError> {
        Ok(Dataset::new(
            self.load_array(&handle.test_features)?,
            self.load_array(&handle.test_labels)?,
        ))
    }
}

/// Filesystem-backed array store. Locators are paths relative to the root.
#[derive(Debug, Clone)]
pub struct FsArrayStore {
    root: PathBuf,
}

impl FsArrayStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        self.root.join(locator)
    }
}

impl ArrayStore for FsArrayStore {
    fn load_array(&self, locator: &str) -> Result<Vec<Vec<f32>>, PipelineError> {
        let path = self.resolve(locator);
        if !path.exists() {
            return Err(PipelineError::data(format!(
                "array not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        let stored: StoredArray = serde_json::from_str(&content)?;
        Ok(stored.rows)
    }

    fn save_array(&self, locator: &str, rows: &[Vec<f32>]) -> Result<(), PipelineError> {
        let path = self.resolve(locator);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&StoredArray {
            rows: rows.to_vec(),
        })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
