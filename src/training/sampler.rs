//! Weighted random sampling for imbalanced severity grades
//!
//! Draws training indices with replacement, weighting each sample by the
//! inverse frequency of its class so that rare grades are seen as often as
//! common ones.

use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::utils::error::{GradingError, Result};

/// Samples dataset indices proportionally to inverse class frequency
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    distribution: WeightedIndex<f64>,
    num_samples: usize,
}

impl WeightedSampler {
    /// Build a sampler from per-sample class labels
    pub fn from_labels(labels: &[usize], num_classes: usize) -> Result<Self> {
        if labels.is_empty() {
            return Err(GradingError::Dataset(
                "cannot build a weighted sampler from an empty label set".to_string(),
            ));
        }

        let mut counts = vec![0usize; num_classes];
        for &label in labels {
            if label >= num_classes {
                return Err(GradingError::Dataset(format!(
                    "label {} out of range for {} classes",
                    label, num_classes
                )));
            }
            counts[label] += 1;
        }

        let weights: Vec<f64> = labels
            .iter()
            .map(|&label| 1.0 / counts[label] as f64)
            .collect();

        let distribution = WeightedIndex::new(&weights)
            .map_err(|e| GradingError::Dataset(format!("invalid sample weights: {}", e)))?;

        Ok(Self {
            distribution,
            num_samples: labels.len(),
        })
    }

    /// Draw one epoch worth of indices (dataset length, with replacement)
    pub fn sample_epoch<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        self.sample_indices(self.num_samples, rng)
    }

    /// Draw `n` indices with replacement
    pub fn sample_indices<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<usize> {
        (0..n).map(|_| self.distribution.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_empty_labels_rejected() {
        assert!(WeightedSampler::from_labels(&[], 4).is_err());
    }

    #[test]
    fn test_out_of_range_label_rejected() {
        assert!(WeightedSampler::from_labels(&[0, 4], 4).is_err());
    }

    #[test]
    fn test_epoch_length_matches_dataset() {
        let labels = vec![0, 0, 1, 2, 3, 3, 3];
        let sampler = WeightedSampler::from_labels(&labels, 4).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(35);

        let indices = sampler.sample_epoch(&mut rng);
        assert_eq!(indices.len(), labels.len());
        assert!(indices.iter().all(|&i| i < labels.len()));
    }

    #[test]
    fn test_rare_class_oversampled() {
        // 90 samples of class 0 vs 10 of class 1; weighting should pull the
        // draw towards an even class split.
        let mut labels = vec![0usize; 90];
        labels.extend(vec![1usize; 10]);
        let sampler = WeightedSampler::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(35);

        let draws = sampler.sample_indices(10_000, &mut rng);
        let minority = draws.iter().filter(|&&i| labels[i] == 1).count();
        let fraction = minority as f64 / draws.len() as f64;

        assert!(fraction > 0.4 && fraction < 0.6, "fraction = {}", fraction);
    }
}
