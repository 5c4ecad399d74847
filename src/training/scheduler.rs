//! Learning Rate Scheduling
//!
//! Plateau-based scheduling: the learning rate is multiplied by a decay
//! factor whenever the monitored validation accuracy stops improving for a
//! configurable number of epochs.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::BEST_THRESHOLD;

/// Reduce the learning rate when validation accuracy plateaus
///
/// Monitors a maximized metric. An epoch counts as an improvement only when
/// the metric exceeds the previous best by the relative threshold, matching
/// the criterion used for checkpointing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    threshold: f64,
    min_lr: f64,
    current_lr: f64,
    best_metric: f64,
    stall_epochs: usize,
}

impl ReduceLrOnPlateau {
    /// Create a scheduler starting from `initial_lr`
    pub fn new(initial_lr: f64, factor: f64, patience: usize) -> Self {
        Self {
            factor,
            patience,
            threshold: BEST_THRESHOLD,
            min_lr: 1e-8,
            current_lr: initial_lr,
            best_metric: 0.0,
            stall_epochs: 0,
        }
    }

    /// Current learning rate
    pub fn lr(&self) -> f64 {
        self.current_lr
    }

    /// Record an epoch's validation accuracy, returns the LR to use next
    pub fn step(&mut self, metric: f64) -> f64 {
        if metric > self.best_metric * (1.0 + self.threshold) {
            self.best_metric = metric;
            self.stall_epochs = 0;
        } else {
            self.stall_epochs += 1;
            if self.stall_epochs > self.patience {
                let reduced = (self.current_lr * self.factor).max(self.min_lr);
                if reduced < self.current_lr {
                    info!(
                        "Reducing learning rate: {:.2e} -> {:.2e}",
                        self.current_lr, reduced
                    );
                    self.current_lr = reduced;
                }
                self.stall_epochs = 0;
            }
        }
        self.current_lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lr_constant_while_improving() {
        let mut scheduler = ReduceLrOnPlateau::new(1e-3, 0.2, 2);
        for metric in [0.5, 0.6, 0.7, 0.8] {
            assert_eq!(scheduler.step(metric), 1e-3);
        }
    }

    #[test]
    fn test_lr_reduced_after_plateau() {
        let mut scheduler = ReduceLrOnPlateau::new(1e-3, 0.2, 2);
        scheduler.step(0.8);
        // Three stalled epochs exceed a patience of 2
        scheduler.step(0.8);
        scheduler.step(0.79);
        let lr = scheduler.step(0.8);
        assert!((lr - 2e-4).abs() < 1e-12);
    }

    #[test]
    fn test_stall_counter_resets_on_improvement() {
        let mut scheduler = ReduceLrOnPlateau::new(1e-3, 0.2, 2);
        scheduler.step(0.5);
        scheduler.step(0.5);
        scheduler.step(0.5);
        // Improvement before the patience runs out keeps the LR unchanged
        assert_eq!(scheduler.step(0.7), 1e-3);
        assert_eq!(scheduler.step(0.7), 1e-3);
    }

    #[test]
    fn test_lr_floor() {
        let mut scheduler = ReduceLrOnPlateau::new(1e-7, 0.1, 0);
        scheduler.step(0.5);
        for _ in 0..10 {
            scheduler.step(0.4);
        }
        assert!(scheduler.lr() >= 1e-8);
    }
}
