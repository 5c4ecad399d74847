//! Cross-fold metric aggregation and reporting
//!
//! Collects one `FoldOutcome` per cross-validation fold and summarizes every
//! metric as mean +/- standard deviation across folds. The report is written
//! to the output directory as JSON plus a human-readable summary.

use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::eval::metrics::{RemissionMetrics, SeverityMetrics};
use crate::utils::error::Result;
use crate::NUM_CLASSES;

/// Metrics for a single completed fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldOutcome {
    /// Fold directory name (e.g. "fold1")
    pub fold: String,
    /// Best validation accuracy reached during training
    pub best_val_accuracy: f64,
    /// Number of epochs actually trained
    pub epochs_trained: usize,
    /// 4-class test metrics
    pub severity: SeverityMetrics,
    /// Binary remission test metrics
    pub remission: RemissionMetrics,
}

/// Mean and standard deviation of one metric across folds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AggregateStat {
    pub mean: f64,
    pub std: f64,
}

impl AggregateStat {
    /// Population mean/std of a slice of per-fold values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { mean: 0.0, std: 0.0 };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            std: var.sqrt(),
        }
    }
}

impl std::fmt::Display for AggregateStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} +/- {:.4}", self.mean, self.std)
    }
}

/// Aggregated metrics across all folds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub num_folds: usize,
    pub accuracy: AggregateStat,
    pub kappa: AggregateStat,
    pub weighted_kappa: AggregateStat,
    pub macro_precision: AggregateStat,
    pub macro_recall: AggregateStat,
    pub macro_f1: AggregateStat,
    pub mean_sensitivity: AggregateStat,
    pub mean_specificity: AggregateStat,
    /// Per-class precision/recall/F1, indexed by class
    pub class_precision: Vec<AggregateStat>,
    pub class_recall: Vec<AggregateStat>,
    pub class_f1: Vec<AggregateStat>,
    pub remission_accuracy: AggregateStat,
    pub remission_kappa: AggregateStat,
    pub remission_precision: AggregateStat,
    pub remission_recall: AggregateStat,
    pub remission_f1: AggregateStat,
    pub remission_sensitivity: AggregateStat,
    pub remission_specificity: AggregateStat,
}

/// Accumulates fold outcomes over a cross-validation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossValReport {
    pub model: String,
    pub folds: Vec<FoldOutcome>,
}

impl CrossValReport {
    /// Create an empty report for the given model name
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            folds: Vec::new(),
        }
    }

    /// Record a completed fold
    pub fn push(&mut self, outcome: FoldOutcome) {
        self.folds.push(outcome);
    }

    /// Number of folds recorded so far
    pub fn num_folds(&self) -> usize {
        self.folds.len()
    }

    fn collect<F: Fn(&FoldOutcome) -> f64>(&self, f: F) -> Vec<f64> {
        self.folds.iter().map(f).collect()
    }

    /// Aggregate every metric as mean/std across folds
    pub fn aggregate(&self) -> AggregateReport {
        let per_class_stat = |pick: &dyn Fn(&FoldOutcome, usize) -> f64| -> Vec<AggregateStat> {
            (0..NUM_CLASSES)
                .map(|class| {
                    let values: Vec<f64> =
                        self.folds.iter().map(|fold| pick(fold, class)).collect();
                    AggregateStat::from_values(&values)
                })
                .collect()
        };

        AggregateReport {
            num_folds: self.folds.len(),
            accuracy: AggregateStat::from_values(&self.collect(|f| f.severity.accuracy)),
            kappa: AggregateStat::from_values(&self.collect(|f| f.severity.kappa)),
            weighted_kappa: AggregateStat::from_values(
                &self.collect(|f| f.severity.weighted_kappa),
            ),
            macro_precision: AggregateStat::from_values(
                &self.collect(|f| f.severity.macro_precision),
            ),
            macro_recall: AggregateStat::from_values(&self.collect(|f| f.severity.macro_recall)),
            macro_f1: AggregateStat::from_values(&self.collect(|f| f.severity.macro_f1)),
            mean_sensitivity: AggregateStat::from_values(
                &self.collect(|f| f.severity.mean_sensitivity),
            ),
            mean_specificity: AggregateStat::from_values(
                &self.collect(|f| f.severity.mean_specificity),
            ),
            class_precision: per_class_stat(&|f, c| f.severity.per_class[c].precision),
            class_recall: per_class_stat(&|f, c| f.severity.per_class[c].recall),
            class_f1: per_class_stat(&|f, c| f.severity.per_class[c].f1),
            remission_accuracy: AggregateStat::from_values(
                &self.collect(|f| f.remission.accuracy),
            ),
            remission_kappa: AggregateStat::from_values(&self.collect(|f| f.remission.kappa)),
            remission_precision: AggregateStat::from_values(
                &self.collect(|f| f.remission.precision),
            ),
            remission_recall: AggregateStat::from_values(&self.collect(|f| f.remission.recall)),
            remission_f1: AggregateStat::from_values(&self.collect(|f| f.remission.f1)),
            remission_sensitivity: AggregateStat::from_values(
                &self.collect(|f| f.remission.sensitivity),
            ),
            remission_specificity: AggregateStat::from_values(
                &self.collect(|f| f.remission.specificity),
            ),
        }
    }

    /// Write the full report (per-fold + aggregate) to the output directory
    ///
    /// Produces `cv_report_<model>.json` and `cv_summary_<model>.txt`.
    pub fn write(&self, output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir)?;

        let json_path = output_dir.join(format!("cv_report_{}.json", self.model));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&json_path, json)?;

        let aggregate = self.aggregate();
        let summary_path = output_dir.join(format!("cv_summary_{}.txt", self.model));
        std::fs::write(&summary_path, self.render_summary(&aggregate))?;

        info!(
            "Cross-validation report written to {:?} and {:?}",
            json_path, summary_path
        );
        Ok(())
    }

    fn render_summary(&self, agg: &AggregateReport) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "Cross-validation summary for {} ({} folds) - {}\n\n",
            self.model,
            agg.num_folds,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        out.push_str("4-class severity metrics (mean +/- std across folds):\n");
        out.push_str(&format!("  accuracy:          {}\n", agg.accuracy));
        out.push_str(&format!("  kappa:             {}\n", agg.kappa));
        out.push_str(&format!("  weighted kappa:    {}\n", agg.weighted_kappa));
        out.push_str(&format!("  macro precision:   {}\n", agg.macro_precision));
        out.push_str(&format!("  macro recall:      {}\n", agg.macro_recall));
        out.push_str(&format!("  macro F1:          {}\n", agg.macro_f1));
        out.push_str(&format!("  mean sensitivity:  {}\n", agg.mean_sensitivity));
        out.push_str(&format!("  mean specificity:  {}\n", agg.mean_specificity));

        out.push_str("\nPer-class metrics:\n");
        for class in 0..NUM_CLASSES {
            out.push_str(&format!(
                "  class {}: precision {} | recall {} | F1 {}\n",
                class,
                agg.class_precision[class],
                agg.class_recall[class],
                agg.class_f1[class]
            ));
        }

        out.push_str("\nRemission metrics:\n");
        out.push_str(&format!("  accuracy:          {}\n", agg.remission_accuracy));
        out.push_str(&format!("  kappa:             {}\n", agg.remission_kappa));
        out.push_str(&format!("  precision:         {}\n", agg.remission_precision));
        out.push_str(&format!("  recall:            {}\n", agg.remission_recall));
        out.push_str(&format!("  F1:                {}\n", agg.remission_f1));
        out.push_str(&format!("  sensitivity:       {}\n", agg.remission_sensitivity));
        out.push_str(&format!("  specificity:       {}\n", agg.remission_specificity));

        out.push_str("\nPer-fold results:\n");
        for fold in &self.folds {
            out.push_str(&format!(
                "  {}: test acc {:.4} | kappa {:.4} | qw kappa {:.4} | best val acc {:.4} ({} epochs)\n",
                fold.fold,
                fold.severity.accuracy,
                fold.severity.kappa,
                fold.severity.weighted_kappa,
                fold.best_val_accuracy,
                fold.epochs_trained
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold_outcome(name: &str, accuracy_seed: f64) -> FoldOutcome {
        // Build a deterministic outcome from synthetic predictions
        let truth = vec![0, 0, 1, 1, 2, 2, 3, 3];
        let pred = if accuracy_seed > 0.9 {
            truth.clone()
        } else {
            vec![0, 1, 1, 2, 2, 3, 3, 3]
        };

        FoldOutcome {
            fold: name.to_string(),
            best_val_accuracy: accuracy_seed,
            epochs_trained: 10,
            severity: SeverityMetrics::from_predictions(&pred, &truth, NUM_CLASSES),
            remission: RemissionMetrics::from_severity(&pred, &truth),
        }
    }

    #[test]
    fn test_aggregate_stat() {
        let stat = AggregateStat::from_values(&[1.0, 2.0, 3.0]);
        assert!((stat.mean - 2.0).abs() < 1e-9);
        assert!((stat.std - (2.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_stat_empty() {
        let stat = AggregateStat::from_values(&[]);
        assert_eq!(stat.mean, 0.0);
        assert_eq!(stat.std, 0.0);
    }

    #[test]
    fn test_metric_vectors_match_fold_count() {
        let mut report = CrossValReport::new("cnn_base");
        for (i, name) in ["fold1", "fold2", "fold3"].iter().enumerate() {
            report.push(fold_outcome(name, 0.8 + i as f64 * 0.05));
        }

        assert_eq!(report.num_folds(), 3);
        assert_eq!(report.folds.len(), 3);

        let agg = report.aggregate();
        assert_eq!(agg.num_folds, 3);
        assert_eq!(agg.class_precision.len(), NUM_CLASSES);
        assert_eq!(agg.class_recall.len(), NUM_CLASSES);
        assert_eq!(agg.class_f1.len(), NUM_CLASSES);
    }

    #[test]
    fn test_report_roundtrip() {
        let dir = std::env::temp_dir().join(format!("ucmayo_cv_report_{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();

        let mut report = CrossValReport::new("cnn_lite");
        report.push(fold_outcome("fold1", 0.95));
        report.push(fold_outcome("fold2", 0.7));
        report.write(&dir).unwrap();

        let json = std::fs::read_to_string(dir.join("cv_report_cnn_lite.json")).unwrap();
        let loaded: CrossValReport = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.num_folds(), 2);
        assert_eq!(loaded.model, "cnn_lite");

        let summary = std::fs::read_to_string(dir.join("cv_summary_cnn_lite.txt")).unwrap();
        assert!(summary.contains("fold1"));
        assert!(summary.contains("weighted kappa"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
