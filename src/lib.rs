//! # UCMayo4 Cross-Validation Harness
//!
//! A Rust library for training and evaluating endoscopic severity-grading
//! models (Mayo endoscopic subscore 0-3) under k-fold cross-validation,
//! built on the Burn framework.
//!
//! The model is trained as a regressor: a single continuous output is fitted
//! to the ordinal label with MSE loss, and mapped back to a class with fixed
//! decision boundaries at 0.5, 1.5 and 2.5. A binary remission outcome
//! (severity <= 1) is derived from the 4-class label for clinical reporting.
//!
//! ## Modules
//!
//! - `dataset`: fold discovery, image loading, Burn dataset/batcher glue
//! - `model`: CNN regressor architectures and the provider/factory
//! - `training`: fold training loop, early stopping, cross-validation driver
//! - `eval`: threshold mapping, confusion matrices, kappa, fold aggregation
//! - `utils`: logging, error handling, run tracking

pub mod backend;
pub mod dataset;
pub mod eval;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::loader::{discover_folds, DatasetStats, EndoscopyDataset, FoldPaths};
pub use dataset::{EndoscopyBatch, EndoscopyBatcher, EndoscopyBurnDataset, EndoscopyItem};
pub use eval::metrics::{ClassMetrics, ConfusionMatrix, SeverityMetrics};
pub use eval::report::{CrossValReport, FoldOutcome};
pub use eval::thresholds::{class_from_score, remission_from_class, SEVERITY_BOUNDARIES};
pub use model::provider::Architecture;
pub use training::cross_validation::{run_cross_validation, CrossValConfig};
pub use training::trainer::EarlyStopping;
pub use training::OptimizerKind;
pub use utils::error::{GradingError, Result};

/// Number of severity classes (Mayo 0-3)
pub const NUM_CLASSES: usize = 4;

/// Human-readable class names for the severity grades
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["Mayo 0", "Mayo 1", "Mayo 2", "Mayo 3"];

/// Relative improvement threshold shared by early stopping, checkpoint
/// selection and the plateau LR scheduler
pub const BEST_THRESHOLD: f64 = 1e-4;

/// Default random seed for reproducible runs
pub const DEFAULT_SEED: u64 = 35;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
