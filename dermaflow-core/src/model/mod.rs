//! Model kinds, hyperparameters, and the model-building backend seam.

pub mod backend;
pub mod softmax;

pub use backend::{FitReport, Model, ModelBackend, SessionScope};
pub use softmax::SoftmaxBackend;

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three trainable variants.
///
/// Dispatch over this enum is exhaustive everywhere; an unrecognized kind
/// coming in from configuration fails at parse time instead of silently
/// falling through a match arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Basic,
    CrossVal,
    ResNet50,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Basic, ModelKind::CrossVal, ModelKind::ResNet50];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Basic => "Basic",
            ModelKind::CrossVal => "CrossVal",
            ModelKind::ResNet50 => "ResNet50",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Basic" => Ok(ModelKind::Basic),
            "CrossVal" => Ok(ModelKind::CrossVal),
            "ResNet50" => Ok(ModelKind::ResNet50),
            other => Err(PipelineError::config(format!(
                "unknown model kind '{other}' (expected Basic, CrossVal, or ResNet50)"
            ))),
        }
    }
}

/// Weight initialization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelInitializer {
    GlorotUniform,
    Normal,
}

/// Pooling applied by the transfer-learning trunk. Ignored by other variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    Avg,
    Max,
}

/// Hyperparameters shared by all variants. Supplied once per pipeline
/// invocation; variants ignore keys that do not apply to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default = "default_input_shape")]
    pub input_shape: [usize; 3],
    #[serde(default = "default_activation")]
    pub activation: String,
    #[serde(default = "default_initializer")]
    pub kernel_initializer: KernelInitializer,
    #[serde(default = "default_optimizer")]
    pub optimizer: String,
    #[serde(default = "default_loss")]
    pub loss: String,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "default_validation_split")]
    pub validation_split: f32,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_pooling")]
    pub pooling: Pooling,
    #[serde(default = "default_verbose")]
    pub verbose: u8,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            num_classes: default_num_classes(),
            input_shape: default_input_shape(),
            activation: default_activation(),
            kernel_initializer: default_initializer(),
            optimizer: default_optimizer(),
            loss: default_loss(),
            metrics: default_metrics(),
            validation_split: default_validation_split(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            pooling: default_pooling(),
            verbose: default_verbose(),
        }
    }
}

fn default_num_classes() -> usize {
    2
}

fn default_input_shape() -> [usize; 3] {
    [224, 224, 3]
}

fn default_activation() -> String {
    "relu".to_string()
}

fn default_initializer() -> KernelInitializer {
    KernelInitializer::GlorotUniform
}

fn default_optimizer() -> String {
    "adam".to_string()
}

fn default_loss() -> String {
    "binary_crossentropy".to_string()
}

fn default_metrics() -> Vec<String> {
    vec!["accuracy".to_string()]
}

fn default_validation_split() -> f32 {
    0.2
}

fn default_epochs() -> usize {
    2
}

fn default_batch_size() -> usize {
    64
}

fn default_learning_rate() -> f32 {
    1e-5
}

fn default_pooling() -> Pooling {
    Pooling::Avg
}

fn default_verbose() -> u8 {
    2
}

impl ModelParams {
    /// Fail-fast validation, run before any training begins.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.num_classes < 2 {
            return Err(PipelineError::config("num_classes must be >= 2"));
        }
        if self.epochs == 0 {
            return Err(PipelineError::config("epochs must be >= 1"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(PipelineError::config(
                "validation_split must be in [0.0, 1.0)",
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(PipelineError::config("learning_rate must be positive"));
        }
        Ok(())
    }

    /// Flatten to key/value pairs for parameter logging.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("num_classes".into(), self.num_classes.to_string()),
            (
                "input_shape".into(),
                format!(
                    "({}, {}, {})",
                    self.input_shape[0], self.input_shape[1], self.input_shape[2]
                ),
            ),
            ("activation".into(), self.activation.clone()),
            (
                "kernel_initializer".into(),
                format!("{:?}", self.kernel_initializer),
            ),
            ("optimizer".into(), self.optimizer.clone()),
            ("loss".into(), self.loss.clone()),
            ("metrics".into(), self.metrics.join(",")),
            (
                "validation_split".into(),
                self.validation_split.to_string(),
            ),
            ("epochs".into(), self.epochs.to_string()),
            ("batch_size".into(), self.batch_size.to_string()),
            ("learning_rate".into(), self.learning_rate.to_string()),
            ("pooling".into(), format!("{:?}", self.pooling)),
            ("verbose".into(), self.verbose.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_and_rejects() {
        assert_eq!("ResNet50".parse::<ModelKind>().unwrap(), ModelKind::ResNet50);
        let err = "Quantum".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn params_validate_bounds() {
        let mut params = ModelParams::default();
        assert!(params.validate().is_ok());

        params.epochs = 0;
        assert!(params.validate().is_err());

        params = ModelParams {
            validation_split: 1.0,
            ..ModelParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn params_flatten_every_key() {
        let pairs = ModelParams::default().to_pairs();
        assert_eq!(pairs.len(), 13);
        assert!(pairs.iter().any(|(k, v)| k == "epochs" && v == "2"));
    }
}
