//! Architecture provider
//!
//! Maps enumerated architecture names to concrete model presets. Each preset
//! carries its input size and a default batch size, since the larger presets
//! need smaller batches to fit in memory.

use burn::tensor::backend::Backend;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::cnn::{SeverityRegressor, SeverityRegressorConfig};
use crate::utils::error::{GradingError, Result};

/// Enumerated model architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Architecture {
    /// Small backbone for quick experiments
    CnnLite,
    /// Default backbone
    CnnBase,
    /// Wider backbone with a larger input resolution
    CnnWide,
}

impl Architecture {
    /// Parse an architecture name, for callers not going through clap
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "cnn_lite" => Ok(Self::CnnLite),
            "cnn_base" => Ok(Self::CnnBase),
            "cnn_wide" => Ok(Self::CnnWide),
            other => Err(GradingError::Config(format!(
                "Unknown architecture '{}' (expected cnn_lite, cnn_base or cnn_wide)",
                other
            ))),
        }
    }

    /// Canonical name used in checkpoint file stems
    pub fn name(&self) -> &'static str {
        match self {
            Self::CnnLite => "cnn_lite",
            Self::CnnBase => "cnn_base",
            Self::CnnWide => "cnn_wide",
        }
    }

    /// Input image size for this preset
    pub fn input_size(&self) -> usize {
        match self {
            Self::CnnLite => 160,
            Self::CnnBase => 224,
            Self::CnnWide => 224,
        }
    }

    /// Default batch size for this preset
    pub fn default_batch_size(&self) -> usize {
        match self {
            Self::CnnLite => 64,
            Self::CnnBase => 32,
            Self::CnnWide => 16,
        }
    }

    /// Model configuration for this preset
    pub fn config(&self) -> SeverityRegressorConfig {
        match self {
            Self::CnnLite => SeverityRegressorConfig::new()
                .with_input_size(self.input_size())
                .with_base_filters(16)
                .with_fc_units(128)
                .with_dropout_rate(0.3),
            Self::CnnBase => SeverityRegressorConfig::new()
                .with_input_size(self.input_size())
                .with_base_filters(32)
                .with_fc_units(256)
                .with_dropout_rate(0.3),
            Self::CnnWide => SeverityRegressorConfig::new()
                .with_input_size(self.input_size())
                .with_base_filters(64)
                .with_fc_units(512)
                .with_dropout_rate(0.5),
        }
    }

    /// Build a model instance for this preset
    pub fn build<B: Backend>(&self, device: &B::Device) -> SeverityRegressor<B> {
        SeverityRegressor::new(&self.config(), device)
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
