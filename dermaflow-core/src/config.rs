//! Configuration types for the dermaflow-core crate.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! environment. The loaded `PipelineConfig` is constructed once per process
//! and passed by reference into the orchestrator; no component reads global
//! mutable state.

use crate::model::ModelParams;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Experiment namespace all runs are recorded under.
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    /// Storage bucket (or local root) holding the prepared arrays.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Experiment-tracking backend configuration.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Cross-validation configuration.
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,
    /// Minimum accuracy the winning candidate must reach to be promoted.
    /// 0.0 promotes unconditionally.
    #[serde(default)]
    pub promotion_threshold: f64,
    /// Global seed for weight init, epoch shuffling, and fold assignment.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Model hyperparameters shared by all variants.
    #[serde(default)]
    pub params: ModelParams,
    /// Downstream deployment configuration.
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            experiment_name: default_experiment_name(),
            bucket: default_bucket(),
            tracking: TrackingConfig::default(),
            cross_validation: CrossValidationConfig::default(),
            promotion_threshold: 0.0,
            seed: default_seed(),
            params: ModelParams::default(),
            deploy: DeployConfig::default(),
        }
    }
}

fn default_experiment_name() -> String {
    "cnn_skin_cancer".to_string()
}

fn default_bucket() -> String {
    ".dermaflow/data".to_string()
}

fn default_seed() -> u64 {
    11
}

/// Experiment-tracking backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Tracking store location. For the file-backed store this is a
    /// directory path; remote backends interpret it as a service URI.
    #[serde(default = "default_tracking_uri")]
    pub uri: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: default_tracking_uri(),
        }
    }
}

fn default_tracking_uri() -> String {
    ".dermaflow/tracking".to_string()
}

/// Cross-validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    /// Number of folds. Must be >= 2.
    #[serde(default = "default_k_folds")]
    pub k_folds: usize,
    /// Shuffle rows before fold assignment.
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            k_folds: default_k_folds(),
            shuffle: true,
        }
    }
}

fn default_k_folds() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// Deployment configuration for the promoted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// AWS account id.
    #[serde(default)]
    pub aws_id: String,
    /// AWS region.
    #[serde(default)]
    pub aws_region: String,
    /// Execution role name for the serving endpoint.
    #[serde(default)]
    pub role_name: String,
    /// ECR repository holding the serving image.
    #[serde(default)]
    pub ecr_repository: String,
    /// Serving image tag.
    #[serde(default)]
    pub image_tag: String,
    /// Endpoint name to create.
    #[serde(default)]
    pub endpoint_name: String,
    /// Instance type for the endpoint.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            aws_id: String::new(),
            aws_region: String::new(),
            role_name: String::new(),
            ecr_repository: String::new(),
            image_tag: String::new(),
            endpoint_name: String::new(),
            instance_type: default_instance_type(),
        }
    }
}

fn default_instance_type() -> String {
    "ml.t2.medium".to_string()
}

/// Load configuration from defaults, an optional TOML file, and
/// `DERMAFLOW_`-prefixed environment variables (highest precedence).
pub fn load_config(config_file: Option<&Path>) -> Result<PipelineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    } else {
        let default_path = PathBuf::from("dermaflow.toml");
        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
    }

    figment = figment.merge(Env::prefixed("DERMAFLOW_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.cross_validation.k_folds, 3);
        assert!(cfg.cross_validation.shuffle);
        assert_eq!(cfg.promotion_threshold, 0.0);
        assert_eq!(cfg.params.num_classes, 2);
    }

    #[test]
    fn env_overrides_defaults() {
        // figment Env provider reads from the process environment
        unsafe {
            std::env::set_var("DERMAFLOW_PROMOTION_THRESHOLD", "0.8");
        }
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.promotion_threshold, 0.8);
        unsafe {
            std::env::remove_var("DERMAFLOW_PROMOTION_THRESHOLD");
        }
    }
}
