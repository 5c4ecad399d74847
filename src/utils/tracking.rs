//! Run Tracking Module
//!
//! Local experiment tracking: per-epoch metrics are appended to a JSONL file
//! and a run summary is written alongside when the fold finishes. This stands
//! in for a hosted tracking service so runs stay comparable offline.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::Result;

/// One epoch worth of tracked metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub fold: usize,
    pub epoch: usize,
    pub learning_rate: f64,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Final per-fold summary written when a run closes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub fold: usize,
    pub model: String,
    pub optimizer: String,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    pub epochs_trained: usize,
    pub best_val_accuracy: f64,
    pub finished_at: String,
}

/// Appends epoch records to `<dir>/run_fold<N>.jsonl` and the summary to
/// `<dir>/summary_fold<N>.json`.
pub struct RunTracker {
    writer: BufWriter<File>,
    summary_path: PathBuf,
    fold: usize,
}

impl RunTracker {
    /// Open a tracker for one fold, creating the output directory if needed
    pub fn new(output_dir: &Path, fold: usize) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;

        let log_path = output_dir.join(format!("run_fold{}.jsonl", fold));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        info!("Tracking fold {} metrics in {:?}", fold, log_path);

        Ok(Self {
            writer: BufWriter::new(file),
            summary_path: output_dir.join(format!("summary_fold{}.json", fold)),
            fold,
        })
    }

    /// Append one epoch record
    pub fn log_epoch(&mut self, record: &EpochRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write the final summary for this fold
    pub fn finish(&mut self, mut summary: RunSummary) -> Result<()> {
        summary.fold = self.fold;
        summary.finished_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&self.summary_path, json)?;

        info!("Run summary written to {:?}", self.summary_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ucmayo_cv_tracking_{}_{}",
            tag,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_epoch_records_are_jsonl() {
        let dir = temp_dir("epochs");
        let mut tracker = RunTracker::new(&dir, 1).unwrap();

        for epoch in 0..3 {
            tracker
                .log_epoch(&EpochRecord {
                    fold: 1,
                    epoch,
                    learning_rate: 2e-4,
                    train_loss: 0.8 - epoch as f64 * 0.1,
                    train_accuracy: 0.5 + epoch as f64 * 0.1,
                    val_loss: 0.9,
                    val_accuracy: 0.4,
                })
                .unwrap();
        }

        let content = std::fs::read_to_string(dir.join("run_fold1.jsonl")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: EpochRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.epoch, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_summary_written() {
        let dir = temp_dir("summary");
        let mut tracker = RunTracker::new(&dir, 2).unwrap();

        tracker
            .finish(RunSummary {
                fold: 0,
                model: "cnn_base".to_string(),
                optimizer: "adam".to_string(),
                learning_rate: 2e-4,
                weight_decay: 0.0,
                batch_size: 32,
                epochs_trained: 12,
                best_val_accuracy: 0.81,
                finished_at: String::new(),
            })
            .unwrap();

        let content = std::fs::read_to_string(dir.join("summary_fold2.json")).unwrap();
        let summary: RunSummary = serde_json::from_str(&content).unwrap();
        assert_eq!(summary.fold, 2);
        assert!(!summary.finished_at.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
