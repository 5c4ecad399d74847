//! Ulcerative Colitis Severity Grading CLI
//!
//! Entry point for cross-validation training and evaluation of endoscopic
//! severity-grading regressors (Mayo subscore 0-3) with the Burn framework.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use ucmayo_cv::backend::{backend_name, TrainingBackend};
use ucmayo_cv::training::{
    CrossValConfig, OptimizerKind, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, DEFAULT_PATIENCE,
    DEFAULT_WEIGHT_DECAY,
};
use ucmayo_cv::utils::logging::{init_logging, LogConfig};
use ucmayo_cv::{run_cross_validation, Architecture, EndoscopyDataset, DEFAULT_SEED};

/// Ulcerative Colitis Severity Grading under Cross-Validation
///
/// Trains one regression CNN per cross-validation fold, evaluates each
/// fold's best checkpoint on a held-out test set and reports metrics as
/// mean +/- std across folds.
#[derive(Parser, Debug)]
#[command(name = "ucmayo_cv")]
#[command(version = "0.1.0")]
#[command(about = "Endoscopic severity grading with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run cross-validation training and evaluation
    Train {
        /// Directory containing fold subdirectories (fold1/train, fold1/val, ...)
        #[arg(long)]
        cv_fold_path: PathBuf,

        /// Held-out test set directory (one subdirectory per class)
        #[arg(long)]
        test_set_path: PathBuf,

        /// Model architecture
        #[arg(short, long, value_enum, default_value = "cnn-base")]
        model: Architecture,

        /// Optimizer family
        #[arg(long, value_enum, default_value = "adam")]
        optimizer: OptimizerKind,

        /// Initial learning rate
        #[arg(short, long, default_value_t = DEFAULT_LEARNING_RATE)]
        learning_rate: f64,

        /// Weight decay
        #[arg(long, default_value_t = DEFAULT_WEIGHT_DECAY)]
        weight_decay: f32,

        /// Maximum number of epochs per fold
        #[arg(short, long, default_value_t = DEFAULT_EPOCHS)]
        num_epoch: usize,

        /// Early stopping patience in epochs
        #[arg(long, default_value_t = DEFAULT_PATIENCE)]
        early_stopping_threshold: usize,

        /// Batch size (defaults to the architecture's preset)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Disable plateau-based learning rate scheduling
        #[arg(long, default_value = "false")]
        no_lr_scheduling: bool,

        /// Plateau patience before reducing the learning rate
        #[arg(long, default_value = "15")]
        lr_patience: usize,

        /// Factor applied to the learning rate on plateau
        #[arg(long, default_value = "0.2")]
        lr_factor: f64,

        /// Disable inverse-frequency weighted sampling of training batches
        #[arg(long, default_value = "false")]
        no_weighted_sampler: bool,

        /// Disable flip/rotation augmentation during training
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Random seed for reproducibility
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Output directory for checkpoints and reports
        #[arg(short, long, default_value = "weights")]
        output_dir: PathBuf,

        /// Write per-epoch metrics and run summaries to the output directory
        #[arg(long, default_value = "false")]
        track: bool,
    },

    /// Show dataset statistics for a class-per-subdirectory layout
    Stats {
        /// Path to the dataset directory
        #[arg(short, long)]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            cv_fold_path,
            test_set_path,
            model,
            optimizer,
            learning_rate,
            weight_decay,
            num_epoch,
            early_stopping_threshold,
            batch_size,
            no_lr_scheduling,
            lr_patience,
            lr_factor,
            no_weighted_sampler,
            no_augmentation,
            seed,
            output_dir,
            track,
        } => {
            let config = CrossValConfig {
                cv_root: cv_fold_path,
                test_root: test_set_path,
                architecture: model,
                optimizer,
                learning_rate,
                weight_decay,
                epochs: num_epoch,
                patience: early_stopping_threshold,
                batch_size,
                use_lr_scheduling: !no_lr_scheduling,
                lr_factor,
                lr_patience,
                weighted_sampling: !no_weighted_sampler,
                augment: !no_augmentation,
                seed,
                output_dir,
                track,
            };

            println!("{}", "Configuration:".cyan().bold());
            println!("  Backend:       {}", backend_name());
            println!("  Model:         {}", config.architecture);
            println!("  Optimizer:     {}", config.optimizer);
            println!("  Learning rate: {}", config.learning_rate);
            println!("  Weight decay:  {}", config.weight_decay);
            println!("  Max epochs:    {}", config.epochs);
            println!("  Patience:      {}", config.patience);
            println!("  Seed:          {}", config.seed);
            println!();

            info!("Starting cross-validation run");
            run_cross_validation::<TrainingBackend>(&config)?;
        }

        Commands::Stats { data_dir } => {
            let dataset = EndoscopyDataset::new(&data_dir)?;
            dataset.get_stats().print();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_train(extra: &[&str]) -> Commands {
        let mut args = vec![
            "ucmayo_cv",
            "train",
            "--cv-fold-path",
            "data/cv",
            "--test-set-path",
            "data/test",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_default_run_schedules_and_augments() {
        match parse_train(&[]) {
            Commands::Train {
                no_lr_scheduling,
                no_augmentation,
                no_weighted_sampler,
                ..
            } => {
                assert!(!no_lr_scheduling);
                assert!(!no_augmentation);
                assert!(!no_weighted_sampler);
            }
            other => panic!("expected train subcommand, got {:?}", other),
        }
    }

    #[test]
    fn test_opt_out_flags() {
        match parse_train(&["--no-lr-scheduling", "--no-augmentation"]) {
            Commands::Train {
                no_lr_scheduling,
                no_augmentation,
                ..
            } => {
                assert!(no_lr_scheduling);
                assert!(no_augmentation);
            }
            other => panic!("expected train subcommand, got {:?}", other),
        }
    }

    #[test]
    fn test_optimizer_adamw_spelling() {
        match parse_train(&["--optimizer", "adamw"]) {
            Commands::Train { optimizer, .. } => assert_eq!(optimizer, OptimizerKind::AdamW),
            other => panic!("expected train subcommand, got {:?}", other),
        }
    }
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════╗
 ║   UCMayo4 Severity Grading / Cross-Validation        ║
 ║   Endoscopic Mayo Subscore Regression with Burn      ║
 ╚══════════════════════════════════════════════════════╝
  "#
        .green()
    );
}
