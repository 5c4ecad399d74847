//! Cross-Validation Driver
//!
//! Runs the full experiment: discovers fold directories, trains one model per
//! fold with per-fold normalization statistics, reloads each fold's best
//! checkpoint and evaluates it on the held-out test set, then aggregates the
//! metrics across folds.

use std::path::PathBuf;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, AdamConfig, AdamWConfig, SgdConfig,
    },
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use colored::Colorize;
use tracing::info;

use crate::dataset::burn_dataset::{EndoscopyBatcher, EndoscopyBurnDataset};
use crate::dataset::loader::{discover_folds, EndoscopyDataset, FoldPaths};
use crate::dataset::augmentation::Augmenter;
use crate::eval::metrics::{RemissionMetrics, SeverityMetrics};
use crate::eval::report::{CrossValReport, FoldOutcome};
use crate::eval::thresholds::class_from_score;
use crate::model::cnn::SeverityRegressor;
use crate::model::provider::Architecture;
use crate::training::{
    trainer::{train_fold, FoldTrainOptions, FoldTrainResult},
    OptimizerKind, SGD_MOMENTUM,
};
use crate::utils::error::{GradingError, Result};
use crate::utils::tracking::{RunSummary, RunTracker};
use crate::{CLASS_NAMES, NUM_CLASSES};

/// Configuration for a full cross-validation run
#[derive(Debug, Clone)]
pub struct CrossValConfig {
    /// Root directory containing `fold*` subdirectories
    pub cv_root: PathBuf,
    /// Held-out test set directory (class-per-subdirectory layout)
    pub test_root: PathBuf,
    pub architecture: Architecture,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub epochs: usize,
    pub patience: usize,
    /// Overrides the architecture's default batch size when set
    pub batch_size: Option<usize>,
    pub use_lr_scheduling: bool,
    pub lr_factor: f64,
    pub lr_patience: usize,
    pub weighted_sampling: bool,
    pub augment: bool,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub track: bool,
}

impl CrossValConfig {
    fn effective_batch_size(&self) -> usize {
        self.batch_size
            .unwrap_or_else(|| self.architecture.default_batch_size())
    }

    fn checkpoint_path(&self, fold: &FoldPaths) -> PathBuf {
        self.output_dir
            .join(format!("best_R_{}_{}", self.architecture.name(), fold.name))
    }
}

/// Run the full cross-validation experiment
pub fn run_cross_validation<B>(config: &CrossValConfig) -> Result<CrossValReport>
where
    B: AutodiffBackend,
{
    let device = B::Device::default();
    std::fs::create_dir_all(&config.output_dir)?;

    println!("{}", "Discovering folds...".cyan());
    let folds = discover_folds(&config.cv_root)?;
    println!(
        "  Found {} folds: {}",
        folds.len(),
        folds
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let batch_size = config.effective_batch_size();

    println!("{}", "Loading test set...".cyan());
    let test_dataset = EndoscopyDataset::new(&config.test_root)?;
    test_dataset.get_stats().print();

    let mut report = CrossValReport::new(config.architecture.name());

    for (fold_idx, fold) in folds.iter().enumerate() {
        println!();
        println!(
            "{}",
            format!("===== Fold {}/{} ({}) =====", fold_idx + 1, folds.len(), fold.name)
                .green()
                .bold()
        );

        let outcome = run_fold::<B>(config, fold, fold_idx, &test_dataset, batch_size, &device)?;

        println!(
            "  {} {}: test accuracy {:.4}, kappa {:.4}, weighted kappa {:.4}",
            "✓".green(),
            fold.name,
            outcome.severity.accuracy,
            outcome.severity.kappa,
            outcome.severity.weighted_kappa
        );
        report.push(outcome);
    }

    report.write(&config.output_dir)?;

    let aggregate = report.aggregate();
    println!();
    println!("{}", "Cross-validation complete".green().bold());
    println!("  Accuracy:         {}", aggregate.accuracy);
    println!("  Kappa:            {}", aggregate.kappa);
    println!("  Weighted kappa:   {}", aggregate.weighted_kappa);
    println!("  Mean sensitivity: {}", aggregate.mean_sensitivity);
    println!("  Mean specificity: {}", aggregate.mean_specificity);

    Ok(report)
}

fn run_fold<B>(
    config: &CrossValConfig,
    fold: &FoldPaths,
    fold_idx: usize,
    test_dataset: &EndoscopyDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<FoldOutcome>
where
    B: AutodiffBackend,
{
    let image_size = config.architecture.input_size();

    let train_raw = EndoscopyDataset::new(&fold.train_dir)?;
    let val_raw = EndoscopyDataset::new(&fold.val_dir)?;
    println!(
        "  Train: {} samples | Val: {} samples",
        train_raw.len(),
        val_raw.len()
    );

    // Normalization statistics come from this fold's train split only
    println!("{}", "  Computing channel statistics...".cyan());
    let stats = train_raw.channel_stats(image_size);
    info!(
        "Fold {} channel stats: mean {:?}, std {:?}",
        fold.name, stats.mean, stats.std
    );

    println!("{}", "  Pre-loading images...".cyan());
    let train_dataset = EndoscopyBurnDataset::new_cached(train_raw.sample_pairs(), image_size)?;
    let val_dataset = EndoscopyBurnDataset::new_cached(val_raw.sample_pairs(), image_size)?;

    let batcher = EndoscopyBatcher::new(image_size, stats);
    let model = config.architecture.build::<B>(device);
    let checkpoint_path = config.checkpoint_path(fold);

    let opts = FoldTrainOptions {
        fold: fold_idx + 1,
        epochs: config.epochs,
        batch_size,
        learning_rate: config.learning_rate,
        patience: config.patience,
        lr_schedule: config
            .use_lr_scheduling
            .then_some((config.lr_factor, config.lr_patience)),
        weighted_sampling: config.weighted_sampling,
        augmenter: config.augment.then(Augmenter::default),
        seed: config.seed,
    };

    let mut tracker = if config.track {
        Some(RunTracker::new(&config.output_dir, fold_idx + 1)?)
    } else {
        None
    };

    let result = dispatch_training::<B>(
        config,
        model,
        &train_dataset,
        &val_dataset,
        &batcher,
        &checkpoint_path,
        &opts,
        tracker.as_mut(),
        device,
    )?;

    if let Some(tracker) = tracker.as_mut() {
        tracker.finish(RunSummary {
            fold: fold_idx + 1,
            model: config.architecture.name().to_string(),
            optimizer: config.optimizer.name().to_string(),
            learning_rate: config.learning_rate,
            weight_decay: config.weight_decay as f64,
            batch_size,
            epochs_trained: result.epochs_trained,
            best_val_accuracy: result.best_val_accuracy,
            finished_at: String::new(),
        })?;
    }

    if !result.checkpoint_saved {
        return Err(GradingError::Training(format!(
            "fold {} produced no checkpoint (validation accuracy never improved)",
            fold.name
        )));
    }

    // Reload the best checkpoint for testing
    println!("{}", "  Evaluating best checkpoint on the test set...".cyan());
    let recorder = CompactRecorder::new();
    let best_model = config
        .architecture
        .build::<B>(device)
        .load_file(&checkpoint_path, &recorder, device)
        .map_err(|e| GradingError::Model(format!("failed to load checkpoint: {}", e)))?;

    let (predictions, ground_truth) =
        test_predictions::<B>(&best_model, test_dataset, &batcher, image_size, device)?;

    let severity = SeverityMetrics::from_predictions(&predictions, &ground_truth, NUM_CLASSES);
    let remission = RemissionMetrics::from_severity(&predictions, &ground_truth);

    println!("{}", severity.confusion_matrix.display(Some(&CLASS_NAMES[..])));
    severity.confusion_matrix.save_csv(
        &config
            .output_dir
            .join(format!("confusion_{}_{}.csv", config.architecture.name(), fold.name)),
    )?;

    Ok(FoldOutcome {
        fold: fold.name.clone(),
        best_val_accuracy: result.best_val_accuracy,
        epochs_trained: result.epochs_trained,
        severity,
        remission,
    })
}

/// Build the configured optimizer and hand off to the generic training loop
#[allow(clippy::too_many_arguments)]
fn dispatch_training<B>(
    config: &CrossValConfig,
    model: SeverityRegressor<B>,
    train_dataset: &EndoscopyBurnDataset,
    val_dataset: &EndoscopyBurnDataset,
    batcher: &EndoscopyBatcher,
    checkpoint_path: &std::path::Path,
    opts: &FoldTrainOptions,
    tracker: Option<&mut RunTracker>,
    device: &B::Device,
) -> Result<FoldTrainResult>
where
    B: AutodiffBackend,
{
    match config.optimizer {
        OptimizerKind::Adam => {
            let optimizer = AdamConfig::new()
                .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay)))
                .init();
            train_fold(
                model,
                optimizer,
                train_dataset,
                val_dataset,
                batcher,
                checkpoint_path,
                opts,
                tracker,
                device,
            )
        }
        OptimizerKind::AdamW => {
            let optimizer = AdamWConfig::new()
                .with_weight_decay(config.weight_decay)
                .init();
            train_fold(
                model,
                optimizer,
                train_dataset,
                val_dataset,
                batcher,
                checkpoint_path,
                opts,
                tracker,
                device,
            )
        }
        OptimizerKind::Sgd => {
            let optimizer = SgdConfig::new()
                .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay)))
                .with_momentum(Some(
                    MomentumConfig::new().with_momentum(SGD_MOMENTUM),
                ))
                .init();
            train_fold(
                model,
                optimizer,
                train_dataset,
                val_dataset,
                batcher,
                checkpoint_path,
                opts,
                tracker,
                device,
            )
        }
    }
}

/// Run the test set through the model one image at a time
fn test_predictions<B>(
    model: &SeverityRegressor<B>,
    test_dataset: &EndoscopyDataset,
    batcher: &EndoscopyBatcher,
    image_size: usize,
    device: &B::Device,
) -> Result<(Vec<usize>, Vec<usize>)>
where
    B: AutodiffBackend,
{
    let valid_model = model.valid();
    let burn_dataset = EndoscopyBurnDataset::new(test_dataset.sample_pairs(), image_size);

    let mut predictions = Vec::with_capacity(burn_dataset.len());
    let mut ground_truth = Vec::with_capacity(burn_dataset.len());

    for index in 0..burn_dataset.len() {
        let item = burn_dataset.get(index).ok_or_else(|| {
            GradingError::Dataset(format!("failed to load test sample {}", index))
        })?;
        let label = item.label;

        let batch = batcher.batch(vec![item], device);
        let score: f32 = valid_model
            .forward_scores(batch.images)
            .into_scalar()
            .elem();

        predictions.push(class_from_score(score));
        ground_truth.push(label);
    }

    Ok((predictions, ground_truth))
}
