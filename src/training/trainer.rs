//! Per-Fold Training Loop
//!
//! Custom training loop over Burn's optimizer API: MSE regression on the
//! severity grade, thresholded accuracy for monitoring, checkpointing of the
//! best validation model and early stopping when validation accuracy stalls.

use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Int, Tensor},
};
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::dataset::augmentation::Augmenter;
use crate::dataset::burn_dataset::{EndoscopyBatcher, EndoscopyBurnDataset, EndoscopyItem};
use crate::eval::thresholds::SEVERITY_BOUNDARIES;
use crate::model::cnn::SeverityRegressor;
use crate::training::{ReduceLrOnPlateau, WeightedSampler};
use crate::utils::error::{GradingError, Result};
use crate::utils::tracking::{EpochRecord, RunTracker};
use crate::{BEST_THRESHOLD, NUM_CLASSES};

/// Stops training when validation accuracy stops improving
///
/// An epoch counts as an improvement only when accuracy exceeds the previous
/// best by a small relative margin. Improvements reset the stall counter.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    relative_threshold: f64,
    best_accuracy: f64,
    stall_epochs: usize,
}

impl EarlyStopping {
    /// Create with the given patience and the default relative threshold
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            relative_threshold: BEST_THRESHOLD,
            best_accuracy: 0.0,
            stall_epochs: 0,
        }
    }

    /// Record an epoch's validation accuracy; returns true on improvement
    pub fn observe(&mut self, val_accuracy: f64) -> bool {
        if val_accuracy > self.best_accuracy * (1.0 + self.relative_threshold) {
            self.best_accuracy = val_accuracy;
            self.stall_epochs = 0;
            true
        } else {
            self.stall_epochs += 1;
            false
        }
    }

    /// Whether the stall counter has reached the patience
    pub fn should_stop(&self) -> bool {
        self.stall_epochs >= self.patience
    }

    /// Best validation accuracy seen so far
    pub fn best_accuracy(&self) -> f64 {
        self.best_accuracy
    }
}

/// Options for training a single fold
#[derive(Debug, Clone)]
pub struct FoldTrainOptions {
    pub fold: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub patience: usize,
    /// (factor, patience) for plateau LR scheduling, None disables it
    pub lr_schedule: Option<(f64, usize)>,
    pub weighted_sampling: bool,
    pub augmenter: Option<Augmenter>,
    pub seed: u64,
}

/// Outcome of a fold's training run
#[derive(Debug, Clone)]
pub struct FoldTrainResult {
    pub best_val_accuracy: f64,
    pub epochs_trained: usize,
    pub checkpoint_saved: bool,
}

/// Map regression scores to class indices on-device
///
/// A score's class is the number of decision boundaries it reaches, so a
/// score exactly on a boundary rounds up.
pub fn predicted_classes<B: Backend>(scores: Tensor<B, 1>) -> Tensor<B, 1, Int> {
    let mut classes = scores.clone().greater_equal_elem(SEVERITY_BOUNDARIES[0]).int();
    for &boundary in &SEVERITY_BOUNDARIES[1..] {
        classes = classes + scores.clone().greater_equal_elem(boundary).int();
    }
    classes
}

/// Train one fold's model, checkpointing the best validation state
///
/// The optimizer is passed in pre-built so the caller can choose the family
/// without this function naming the adaptor types.
#[allow(clippy::too_many_arguments)]
pub fn train_fold<B, O>(
    mut model: SeverityRegressor<B>,
    mut optimizer: O,
    train_dataset: &EndoscopyBurnDataset,
    val_dataset: &EndoscopyBurnDataset,
    batcher: &EndoscopyBatcher,
    checkpoint_path: &Path,
    opts: &FoldTrainOptions,
    mut tracker: Option<&mut RunTracker>,
    device: &B::Device,
) -> Result<FoldTrainResult>
where
    B: AutodiffBackend,
    O: Optimizer<SeverityRegressor<B>, B>,
{
    let num_train = train_dataset.len();
    if num_train == 0 {
        return Err(GradingError::Dataset(
            "training split is empty".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(opts.seed.wrapping_add(opts.fold as u64));
    let sampler = if opts.weighted_sampling {
        Some(WeightedSampler::from_labels(
            &train_dataset.labels(),
            NUM_CLASSES,
        )?)
    } else {
        None
    };

    let mut scheduler = opts
        .lr_schedule
        .map(|(factor, patience)| ReduceLrOnPlateau::new(opts.learning_rate, factor, patience));
    let mut learning_rate = opts.learning_rate;

    let mut early_stopping = EarlyStopping::new(opts.patience);
    let mut checkpoint_saved = false;
    let mut epochs_trained = 0;
    let image_size = train_dataset.image_size();

    for epoch in 0..opts.epochs {
        epochs_trained = epoch + 1;
        println!(
            "{}",
            format!("Epoch {}/{}", epoch + 1, opts.epochs).yellow().bold()
        );

        // Training phase
        let indices: Vec<usize> = match &sampler {
            Some(sampler) => sampler.sample_epoch(&mut rng),
            None => {
                let mut shuffled: Vec<usize> = (0..num_train).collect();
                shuffled.shuffle(&mut rng);
                shuffled
            }
        };

        let num_batches = indices.len().div_ceil(opts.batch_size);
        let mut epoch_loss = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for batch_idx in 0..num_batches {
            let start = batch_idx * opts.batch_size;
            let end = (start + opts.batch_size).min(indices.len());

            let items: Vec<EndoscopyItem> = indices[start..end]
                .iter()
                .filter_map(|&i| train_dataset.get(i))
                .map(|item| match &opts.augmenter {
                    Some(augmenter) => {
                        let image = augmenter.apply(&item.image, image_size, &mut rng);
                        EndoscopyItem::from_data(image, item.label, item.path.clone())
                    }
                    None => item,
                })
                .collect();

            if items.is_empty() {
                continue;
            }

            let batch = batcher.batch(items, device);
            let scores = model.forward_scores(batch.images.clone());

            let loss = MseLoss::new().forward(
                scores.clone(),
                batch.targets.clone(),
                Reduction::Mean,
            );
            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;

            let batch_correct: i64 = predicted_classes(scores)
                .equal(batch.classes.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            seen += batch.targets.dims()[0];

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(learning_rate, model, grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx == num_batches - 1 {
                debug!(
                    "  batch {}/{}: loss = {:.4}, acc = {:.4}",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    correct as f64 / seen.max(1) as f64
                );
            }

            drop(batch);
        }

        let train_loss = epoch_loss / num_batches.max(1) as f64;
        let train_acc = correct as f64 / seen.max(1) as f64;

        // Validation phase
        let (val_loss, val_acc) =
            evaluate::<B>(&model, val_dataset, batcher, opts.batch_size, device);

        let improved = early_stopping.observe(val_acc);
        if improved {
            let recorder = CompactRecorder::new();
            model
                .clone()
                .save_file(checkpoint_path, &recorder)
                .map_err(|e| GradingError::Model(format!("failed to save checkpoint: {}", e)))?;
            checkpoint_saved = true;
            info!(
                "Fold {}: new best validation accuracy {:.4}, checkpoint updated",
                opts.fold, val_acc
            );
        }

        println!(
            "  {} Loss: {:.4} | Train Acc: {:.2}% | Val Loss: {:.4} | Val Acc: {:.2}% {}",
            "→".cyan(),
            train_loss,
            100.0 * train_acc,
            val_loss,
            100.0 * val_acc,
            if improved {
                "(best)".green().to_string()
            } else {
                String::new()
            }
        );

        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.log_epoch(&EpochRecord {
                fold: opts.fold,
                epoch: epoch + 1,
                learning_rate,
                train_loss,
                train_accuracy: train_acc,
                val_loss,
                val_accuracy: val_acc,
            })?;
        }

        if let Some(scheduler) = scheduler.as_mut() {
            learning_rate = scheduler.step(val_acc);
        }

        if early_stopping.should_stop() {
            println!(
                "{}",
                format!(
                    "Early stopping after {} epochs without improvement",
                    opts.patience
                )
                .yellow()
            );
            break;
        }
    }

    Ok(FoldTrainResult {
        best_val_accuracy: early_stopping.best_accuracy(),
        epochs_trained,
        checkpoint_saved,
    })
}

/// Evaluate the model on a dataset, returns (mean loss, thresholded accuracy)
pub fn evaluate<B>(
    model: &SeverityRegressor<B>,
    dataset: &EndoscopyBurnDataset,
    batcher: &EndoscopyBatcher,
    batch_size: usize,
    device: &B::Device,
) -> (f64, f64)
where
    B: AutodiffBackend,
{
    let valid_model = model.valid();
    let num_samples = dataset.len();
    if num_samples == 0 {
        return (0.0, 0.0);
    }

    let num_batches = num_samples.div_ceil(batch_size);
    let mut total_loss = 0.0f64;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch_idx in 0..num_batches {
        let start = batch_idx * batch_size;
        let end = (start + batch_size).min(num_samples);

        let items: Vec<EndoscopyItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(items, device);
        let scores = valid_model.forward_scores(batch.images.clone());

        let loss = MseLoss::new().forward(
            scores.clone(),
            batch.targets.clone(),
            Reduction::Mean,
        );
        total_loss += loss.into_scalar().elem::<f64>();

        let batch_correct: i64 = predicted_classes(scores)
            .equal(batch.classes.clone())
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        seen += batch.targets.dims()[0];
    }

    (
        total_loss / num_batches.max(1) as f64,
        correct as f64 / seen.max(1) as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    #[test]
    fn test_improvement_requires_relative_margin() {
        let mut es = EarlyStopping::new(5);
        assert!(es.observe(0.5));
        // Equal accuracy is not an improvement
        assert!(!es.observe(0.5));
        // Within the relative threshold is not an improvement either
        assert!(!es.observe(0.5 * (1.0 + 5e-5)));
        // Beyond the threshold is
        assert!(es.observe(0.5 * (1.0 + 2e-4)));
        assert!((es.best_accuracy() - 0.5 * (1.0 + 2e-4)).abs() < 1e-12);
    }

    #[test]
    fn test_stops_after_patience_stalled_epochs() {
        let mut es = EarlyStopping::new(3);
        es.observe(0.8);
        es.observe(0.7);
        es.observe(0.75);
        assert!(!es.should_stop());
        es.observe(0.8);
        assert!(es.should_stop());
    }

    #[test]
    fn test_improvement_resets_stall_counter() {
        let mut es = EarlyStopping::new(2);
        es.observe(0.6);
        es.observe(0.5);
        assert!(!es.should_stop());
        assert!(es.observe(0.7));
        es.observe(0.6);
        assert!(!es.should_stop());
        es.observe(0.6);
        assert!(es.should_stop());
    }

    #[test]
    fn test_zero_accuracy_never_improves() {
        let mut es = EarlyStopping::new(1);
        assert!(!es.observe(0.0));
        assert!(es.should_stop());
    }

    #[test]
    fn test_predicted_classes_thresholds() {
        let device = Default::default();
        let scores = Tensor::<DefaultBackend, 1>::from_floats(
            [-0.3, 0.49, 0.5, 1.2, 1.5, 2.49, 2.5, 9.0],
            &device,
        );
        let classes: Vec<i64> = predicted_classes(scores).into_data().to_vec().unwrap();
        assert_eq!(classes, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }
}
