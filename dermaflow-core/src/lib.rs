//! # dermaflow-core — Training-Variant Orchestration & Model Selection
//!
//! Orchestrates a multi-variant training workflow for binary skin-lesion
//! classification: preprocessing runs once, three model variants (basic,
//! cross-validated, transfer-learning) train in parallel against the same
//! prepared data, their recorded metrics are compared, and the winner is
//! promoted toward serving.
//!
//! The crate owns the orchestration contract, not the infrastructure:
//! the model-building backend, array storage, preprocessing, tracking
//! backend, and deployment target are all collaborators behind traits,
//! with file-backed defaults for local runs and tests.

// Foundation
pub mod config;
pub mod error;

// Data hand-off
pub mod data;

// Models & training
pub mod model;
pub mod training;

// Tracking & registry
pub mod tracking;

// Comparison, promotion, deployment
pub mod compare;
pub mod deploy;

// Orchestration
pub mod pipeline;

// Re-exports
pub use compare::{ComparisonResult, ModelComparator};
pub use config::{PipelineConfig, load_config};
pub use data::{DataHandle, Dataset};
pub use error::PipelineError;
pub use model::{ModelKind, ModelParams};
pub use pipeline::{Pipeline, PipelineOutcome, TaskGraph, TaskNode};
pub use tracking::{ExperimentTracker, FileTrackingStore, ModelStage, RegisteredModel};
pub use training::{CrossValidationAggregator, KFold, TrainingRun, VariantTrainer};
