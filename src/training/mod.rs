//! Training Module
//!
//! Cross-validation training of the severity regressor: per-fold training
//! loops with MSE loss, early stopping on validation accuracy, optional
//! weighted sampling and plateau-based learning rate scheduling.

pub mod cross_validation;
pub mod sampler;
pub mod scheduler;
pub mod trainer;

pub use cross_validation::{run_cross_validation, CrossValConfig};
pub use sampler::WeightedSampler;
pub use scheduler::ReduceLrOnPlateau;
pub use trainer::{train_fold, EarlyStopping, FoldTrainOptions, FoldTrainResult};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::utils::error::{GradingError, Result};

/// Default initial learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 2e-4;
/// Default weight decay (disabled)
pub const DEFAULT_WEIGHT_DECAY: f32 = 0.0;
/// Default epoch cap per fold
pub const DEFAULT_EPOCHS: usize = 200;
/// Default early stopping patience in epochs
pub const DEFAULT_PATIENCE: usize = 5;
/// SGD momentum
pub const SGD_MOMENTUM: f64 = 0.9;

/// Optimizer family used for training
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    #[value(name = "adamw")]
    AdamW,
    Sgd,
}

impl OptimizerKind {
    /// Parse an optimizer name, rejecting anything unknown
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "adamw" => Ok(Self::AdamW),
            "sgd" => Ok(Self::Sgd),
            other => Err(GradingError::Config(format!(
                "unknown optimizer '{}' (expected adam, adamw or sgd)",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Adam => "adam",
            Self::AdamW => "adamw",
            Self::Sgd => "sgd",
        }
    }
}

impl std::fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_from_name() {
        assert_eq!(OptimizerKind::from_name("adam").unwrap(), OptimizerKind::Adam);
        assert_eq!(OptimizerKind::from_name("AdamW").unwrap(), OptimizerKind::AdamW);
        assert_eq!(OptimizerKind::from_name("SGD").unwrap(), OptimizerKind::Sgd);
    }

    #[test]
    fn test_optimizer_unknown_name_rejected() {
        assert!(OptimizerKind::from_name("rmsprop").is_err());
        assert!(OptimizerKind::from_name("").is_err());
    }

    #[test]
    fn test_cli_names_match_canonical_names() {
        for kind in [OptimizerKind::Adam, OptimizerKind::AdamW, OptimizerKind::Sgd] {
            let cli_name = kind.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(cli_name, kind.name());
        }
    }
}
