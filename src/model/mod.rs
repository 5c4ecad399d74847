//! Model module
//!
//! A small Burn CNN with a single regression output, plus a provider that
//! maps enumerated architecture names to concrete presets (input size,
//! capacity, default batch size).

pub mod cnn;
pub mod provider;

pub use cnn::{ConvBlock, SeverityRegressor, SeverityRegressorConfig};
pub use provider::Architecture;
