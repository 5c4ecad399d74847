//! Classification metrics
//!
//! Confusion matrix with per-class precision/recall/F1, Cohen's kappa (plain
//! and quadratic-weighted), mean sensitivity/specificity over classes, and
//! binary remission metrics.

use serde::{Deserialize, Serialize};

use crate::eval::thresholds::remission_from_class;

/// Confusion matrix for multi-class classification
///
/// Rows are actual classes, columns are predicted classes, stored row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Build from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Total number of observations
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum (correct predictions)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Row sums (actual class counts)
    pub fn row_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|row| (0..self.num_classes).map(|col| self.get(row, col)).sum())
            .collect()
    }

    /// Column sums (predicted class counts)
    pub fn col_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|col| (0..self.num_classes).map(|row| self.get(row, col)).sum())
            .collect()
    }

    /// Cohen's kappa: chance-corrected agreement between predictions and
    /// ground truth
    pub fn cohen_kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }

        let po = self.accuracy();
        let rows = self.row_sums();
        let cols = self.col_sums();
        let pe: f64 = rows
            .iter()
            .zip(cols.iter())
            .map(|(&r, &c)| (r as f64 / total) * (c as f64 / total))
            .sum();

        if (1.0 - pe).abs() < f64::EPSILON {
            return 0.0;
        }
        (po - pe) / (1.0 - pe)
    }

    /// Quadratic-weighted Cohen's kappa
    ///
    /// Disagreements are weighted by the squared normalized distance between
    /// the grades, so near misses on the ordinal scale cost less than
    /// distant ones.
    pub fn quadratic_weighted_kappa(&self) -> f64 {
        let k = self.num_classes;
        let total = self.total() as f64;
        if total == 0.0 || k < 2 {
            return 0.0;
        }

        let rows = self.row_sums();
        let cols = self.col_sums();
        let denom = ((k - 1) * (k - 1)) as f64;

        let mut observed = 0.0;
        let mut expected = 0.0;
        for i in 0..k {
            for j in 0..k {
                let weight = ((i as f64 - j as f64).powi(2)) / denom;
                observed += weight * self.get(i, j) as f64;
                expected += weight * (rows[i] as f64 * cols[j] as f64) / total;
            }
        }

        if expected.abs() < f64::EPSILON {
            return 0.0;
        }
        1.0 - observed / expected
    }

    /// Pretty print (rows = actual, cols = predicted)
    pub fn display(&self, class_names: Option<&[&str]>) -> String {
        let mut output = String::new();
        output.push_str("\nConfusion matrix (rows=actual, cols=predicted):\n\n");

        output.push_str("          ");
        for col in 0..self.num_classes {
            if let Some(names) = class_names {
                output.push_str(&format!("{:>8}", names.get(col).unwrap_or(&"?")));
            } else {
                output.push_str(&format!("{:>8}", col));
            }
        }
        output.push('\n');

        for row in 0..self.num_classes {
            if let Some(names) = class_names {
                output.push_str(&format!("{:>10}", names.get(row).unwrap_or(&"?")));
            } else {
                output.push_str(&format!("{:>10}", row));
            }
            for col in 0..self.num_classes {
                output.push_str(&format!("{:>8}", self.get(row, col)));
            }
            output.push('\n');
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));
        output
    }

    /// Save the matrix as CSV
    pub fn save_csv(&self, path: &std::path::Path) -> std::io::Result<()> {
        let mut content = String::new();

        content.push_str("actual\\predicted");
        for col in 0..self.num_classes {
            content.push_str(&format!(",{}", col));
        }
        content.push('\n');

        for row in 0..self.num_classes {
            content.push_str(&format!("{}", row));
            for col in 0..self.num_classes {
                content.push_str(&format!(",{}", self.get(row, col)));
            }
            content.push('\n');
        }

        std::fs::write(path, content)
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display(None))
    }
}

/// Per-class metrics derived from a confusion matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_idx: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    /// Precision = TP / (TP + FP)
    pub precision: f64,
    /// Recall (sensitivity) = TP / (TP + FN)
    pub recall: f64,
    /// Specificity = TN / (TN + FP)
    pub specificity: f64,
    /// F1 = harmonic mean of precision and recall
    pub f1: f64,
    /// Number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Compute metrics for one class from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let total = cm.total();
        let true_negatives = total - true_positives - false_positives - false_negatives;
        let support = true_positives + false_negatives;

        let precision = if true_positives + false_positives > 0 {
            true_positives as f64 / (true_positives + false_positives) as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            true_positives as f64 / support as f64
        } else {
            0.0
        };

        let specificity = if true_negatives + false_positives > 0 {
            true_negatives as f64 / (true_negatives + false_positives) as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            true_positives,
            false_positives,
            false_negatives,
            true_negatives,
            precision,
            recall,
            specificity,
            f1,
            support,
        }
    }
}

/// Full 4-class metrics for one test pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityMetrics {
    pub total_samples: usize,
    pub accuracy: f64,
    pub kappa: f64,
    pub weighted_kappa: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    /// Mean per-class sensitivity (recall averaged over classes)
    pub mean_sensitivity: f64,
    /// Mean per-class specificity
    pub mean_specificity: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
}

impl SeverityMetrics {
    /// Compute all 4-class metrics from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "predictions and ground truth must have the same length"
        );

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, idx))
            .collect();

        let n = num_classes as f64;
        let macro_precision = per_class.iter().map(|m| m.precision).sum::<f64>() / n;
        let macro_recall = per_class.iter().map(|m| m.recall).sum::<f64>() / n;
        let macro_f1 = per_class.iter().map(|m| m.f1).sum::<f64>() / n;
        let mean_sensitivity = macro_recall;
        let mean_specificity = per_class.iter().map(|m| m.specificity).sum::<f64>() / n;

        Self {
            total_samples: predictions.len(),
            accuracy: confusion_matrix.accuracy(),
            kappa: confusion_matrix.cohen_kappa(),
            weighted_kappa: confusion_matrix.quadratic_weighted_kappa(),
            macro_precision,
            macro_recall,
            macro_f1,
            mean_sensitivity,
            mean_specificity,
            per_class,
            confusion_matrix,
        }
    }
}

/// Binary remission metrics for one test pass
///
/// Remission (severity <= 1) is the positive class. Following the clinical
/// reporting convention, sensitivity is the recall of active disease
/// (class 0) and specificity the recall of remission (class 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemissionMetrics {
    pub total_samples: usize,
    pub accuracy: f64,
    pub kappa: f64,
    /// Precision of the remission class
    pub precision: f64,
    /// Recall of the remission class
    pub recall: f64,
    /// F1 of the remission class
    pub f1: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl RemissionMetrics {
    /// Compute remission metrics from binary predictions and ground truth
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize]) -> Self {
        let confusion_matrix = ConfusionMatrix::from_predictions(predictions, ground_truth, 2);

        let active = ClassMetrics::from_confusion_matrix(&confusion_matrix, 0);
        let remission = ClassMetrics::from_confusion_matrix(&confusion_matrix, 1);

        Self {
            total_samples: predictions.len(),
            accuracy: confusion_matrix.accuracy(),
            kappa: confusion_matrix.cohen_kappa(),
            precision: remission.precision,
            recall: remission.recall,
            f1: remission.f1,
            sensitivity: active.recall,
            specificity: remission.recall,
            confusion_matrix,
        }
    }

    /// Compute remission metrics by thresholding 4-class labels
    pub fn from_severity(predictions: &[usize], ground_truth: &[usize]) -> Self {
        let pred_r: Vec<usize> = predictions.iter().map(|&c| remission_from_class(c)).collect();
        let true_r: Vec<usize> = ground_truth.iter().map(|&c| remission_from_class(c)).collect();
        Self::from_predictions(&pred_r, &true_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 2];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 2];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 2), 3);
        assert_eq!(cm.total(), 10);
        assert_eq!(cm.correct(), 7);
        assert!((cm.accuracy() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_kappa_perfect_agreement() {
        let labels = vec![0, 1, 2, 3, 0, 1, 2, 3];
        let cm = ConfusionMatrix::from_predictions(&labels, &labels, 4);

        assert!((cm.cohen_kappa() - 1.0).abs() < 1e-9);
        assert!((cm.quadratic_weighted_kappa() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_kappa_chance_agreement() {
        // Predictions independent of truth with equal marginals: kappa ~ 0
        let predictions = vec![0, 1, 0, 1];
        let ground_truth = vec![0, 0, 1, 1];
        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);

        assert!(cm.cohen_kappa().abs() < 1e-9);
    }

    #[test]
    fn test_weighted_kappa_penalizes_distance() {
        // Same number of errors, but one set of errors is further off-diagonal
        let truth = vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3];
        let near = vec![0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3, 2];
        let far = vec![0, 0, 3, 1, 1, 3, 2, 2, 0, 3, 3, 0];

        let cm_near = ConfusionMatrix::from_predictions(&near, &truth, 4);
        let cm_far = ConfusionMatrix::from_predictions(&far, &truth, 4);

        assert!(cm_near.quadratic_weighted_kappa() > cm_far.quadratic_weighted_kappa());
    }

    #[test]
    fn test_class_metrics() {
        let predictions = vec![0, 0, 0, 1, 1];
        let ground_truth = vec![0, 0, 1, 1, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        let class0 = ClassMetrics::from_confusion_matrix(&cm, 0);

        assert_eq!(class0.true_positives, 2);
        assert_eq!(class0.false_positives, 1);
        assert_eq!(class0.false_negatives, 1);
        assert!((class0.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((class0.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!((class0.specificity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_severity_metrics_macro_average() {
        let predictions = vec![0, 1, 2, 3];
        let ground_truth = vec![0, 1, 2, 3];

        let metrics = SeverityMetrics::from_predictions(&predictions, &ground_truth, 4);

        assert_eq!(metrics.total_samples, 4);
        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert!((metrics.macro_f1 - 1.0).abs() < 1e-9);
        assert!((metrics.mean_specificity - 1.0).abs() < 1e-9);
        assert_eq!(metrics.per_class.len(), 4);
    }

    #[test]
    fn test_remission_from_severity() {
        // Truth: [0, 1, 2, 3] -> remission [1, 1, 0, 0]
        // Pred:  [1, 2, 2, 0] -> remission [1, 0, 0, 1]
        let truth = vec![0, 1, 2, 3];
        let pred = vec![1, 2, 2, 0];

        let metrics = RemissionMetrics::from_severity(&pred, &truth);

        assert_eq!(metrics.total_samples, 4);
        assert!((metrics.accuracy - 0.5).abs() < 1e-9);
        // Remission class: TP=1, FP=1, FN=1
        assert!((metrics.precision - 0.5).abs() < 1e-9);
        assert!((metrics.recall - 0.5).abs() < 1e-9);
        // Active disease recall: 1 of 2
        assert!((metrics.sensitivity - 0.5).abs() < 1e-9);
    }
}
