//! Evaluation module
//!
//! Maps regression scores to ordinal classes, computes classification
//! metrics (confusion matrix, per-class precision/recall/F1, Cohen's kappa,
//! sensitivity/specificity, remission outcomes) and aggregates them across
//! cross-validation folds.

pub mod metrics;
pub mod report;
pub mod thresholds;

pub use metrics::{ClassMetrics, ConfusionMatrix, RemissionMetrics, SeverityMetrics};
pub use report::{AggregateStat, CrossValReport, FoldOutcome};
pub use thresholds::{class_from_score, classes_from_scores, remission_from_class};
