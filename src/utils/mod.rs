//! Shared utilities: error handling, logging and run tracking.

pub mod error;
pub mod logging;
pub mod tracking;

pub use error::{GradingError, Result};
pub use logging::{init_logging, LogConfig};
pub use tracking::RunTracker;
