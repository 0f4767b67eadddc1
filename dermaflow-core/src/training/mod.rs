//! Training variants — dispatch, cross-validation, run records.

pub mod crossval;
pub mod run;
pub mod variant;

pub use crossval::{CrossValidationAggregator, KFold};
pub use run::TrainingRun;
pub use variant::VariantTrainer;
