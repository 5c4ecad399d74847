//! UCMayo4 Dataset Loader
//!
//! Loads a labeled-image-directory dataset from disk and discovers
//! cross-validation folds. Severity grades come from the class subdirectory
//! names, which sort into label order (0-3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::ImageReader;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dataset::is_image_file;
use crate::utils::error::{GradingError, Result};

/// A single image sample with its grade label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Severity label index (0-3)
    pub label: usize,
    /// Class directory name the sample came from
    pub class_name: String,
}

/// One cross-validation fold on disk
#[derive(Debug, Clone)]
pub struct FoldPaths {
    /// Fold directory name (e.g. "fold1")
    pub name: String,
    /// Path to the fold's train split
    pub train_dir: PathBuf,
    /// Path to the fold's validation split
    pub val_dir: PathBuf,
}

/// Discover fold directories under a cross-validation root
///
/// Folds are subdirectories whose name starts with `fold`, sorted by name.
/// Each fold must contain `train` and `val` subdirectories.
pub fn discover_folds(cv_root: &Path) -> Result<Vec<FoldPaths>> {
    if !cv_root.exists() {
        return Err(GradingError::PathNotFound(cv_root.to_path_buf()));
    }

    let mut names: Vec<String> = std::fs::read_dir(cv_root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with("fold"))
        .collect();
    names.sort();

    if names.is_empty() {
        return Err(GradingError::Dataset(format!(
            "No fold directories found under {:?} (expected names starting with 'fold')",
            cv_root
        )));
    }

    let mut folds = Vec::with_capacity(names.len());
    for name in names {
        let fold_dir = cv_root.join(&name);
        let train_dir = fold_dir.join("train");
        let val_dir = fold_dir.join("val");

        if !train_dir.is_dir() || !val_dir.is_dir() {
            return Err(GradingError::Dataset(format!(
                "Fold '{}' is missing its train/ or val/ subdirectory",
                name
            )));
        }

        folds.push(FoldPaths {
            name,
            train_dir,
            val_dir,
        });
    }

    info!("Discovered {} folds under {:?}", folds.len(), cv_root);
    Ok(folds)
}

/// Per-channel mean and standard deviation of a dataset split
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ChannelStats {
    fn default() -> Self {
        // ImageNet statistics, used when a split is too small to estimate from
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Labeled-image-directory dataset
#[derive(Debug)]
pub struct EndoscopyDataset {
    /// Root directory of the split
    pub root_dir: PathBuf,
    /// All samples in the split
    pub samples: Vec<ImageSample>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
    /// Mapping from label index to class name
    pub idx_to_class: HashMap<usize, String>,
}

impl EndoscopyDataset {
    /// Load a dataset split from a directory of class subdirectories
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading dataset split from: {:?}", root_dir);

        if !root_dir.exists() {
            return Err(GradingError::PathNotFound(root_dir));
        }

        let mut class_dirs: Vec<String> = std::fs::read_dir(&root_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        class_dirs.sort();

        if class_dirs.is_empty() {
            return Err(GradingError::Dataset(format!(
                "No class subdirectories found under {:?}",
                root_dir
            )));
        }

        let class_to_idx: HashMap<String, usize> = class_dirs
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let idx_to_class: HashMap<usize, String> = class_dirs
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx, name.clone()))
            .collect();

        let mut samples = Vec::new();
        for class_name in &class_dirs {
            let class_dir = root_dir.join(class_name);
            let label = class_to_idx[class_name];
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if is_image_file(&path) {
                    samples.push(ImageSample {
                        path,
                        label,
                        class_name: class_name.clone(),
                    });
                }
            }

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name,
                label,
                samples.len() - before
            );
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            class_to_idx,
            idx_to_class,
        })
    }

    /// Number of samples in this split
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the split is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes in this split
    pub fn num_classes(&self) -> usize {
        self.class_to_idx.len()
    }

    /// Labels of all samples, in sample order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// (path, label) pairs for Burn dataset construction
    pub fn sample_pairs(&self) -> Vec<(PathBuf, usize)> {
        self.samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect()
    }

    /// Compute per-channel mean/std over the split
    ///
    /// Images are resized to `image_size` first so the statistics match what
    /// the batcher will normalize. Falls back to ImageNet statistics when the
    /// split has no decodable images.
    pub fn channel_stats(&self, image_size: usize) -> ChannelStats {
        let accum = self
            .samples
            .par_iter()
            .filter_map(|sample| {
                let img = ImageReader::open(&sample.path).ok()?.decode().ok()?;
                let rgb = img
                    .resize_exact(
                        image_size as u32,
                        image_size as u32,
                        image::imageops::FilterType::Triangle,
                    )
                    .to_rgb8();

                let mut sum = [0.0f64; 3];
                let mut sum_sq = [0.0f64; 3];
                for pixel in rgb.pixels() {
                    for c in 0..3 {
                        let v = pixel[c] as f64 / 255.0;
                        sum[c] += v;
                        sum_sq[c] += v * v;
                    }
                }
                Some((sum, sum_sq, (image_size * image_size) as f64))
            })
            .reduce(
                || ([0.0f64; 3], [0.0f64; 3], 0.0f64),
                |mut a, b| {
                    for c in 0..3 {
                        a.0[c] += b.0[c];
                        a.1[c] += b.1[c];
                    }
                    a.2 += b.2;
                    a
                },
            );

        let (sum, sum_sq, count) = accum;
        if count == 0.0 {
            return ChannelStats::default();
        }

        let mut mean = [0.0f32; 3];
        let mut std = [0.0f32; 3];
        for c in 0..3 {
            let m = sum[c] / count;
            let var = (sum_sq[c] / count - m * m).max(0.0);
            mean[c] = m as f32;
            std[c] = (var.sqrt() as f32).max(1e-6);
        }

        debug!("Channel stats: mean = {:?}, std = {:?}", mean, std);
        ChannelStats { mean, std }
    }

    /// Get statistics about the split
    pub fn get_stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.idx_to_class.clone(),
        }
    }
}

/// Statistics about a dataset split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: HashMap<usize, String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\nDataset statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        let mut sorted: Vec<_> = self.class_names.iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);

        for (idx, name) in sorted {
            let count = self.class_counts[*idx];
            let pct = if self.total_samples > 0 {
                100.0 * count as f64 / self.total_samples as f64
            } else {
                0.0
            };
            println!("    {:3}. {:12} {:6} ({:5.1}%)", idx, name, count, pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fold_tree(tag: &str, fold_names: &[&str]) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "ucmayo_cv_loader_{}_{}",
            tag,
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();
        for fold in fold_names {
            for split in ["train", "val"] {
                for class in ["0", "1", "2", "3"] {
                    std::fs::create_dir_all(root.join(fold).join(split).join(class)).unwrap();
                }
            }
        }
        root
    }

    #[test]
    fn test_discover_folds_sorted() {
        let root = make_fold_tree("sorted", &["fold3", "fold1", "fold2"]);

        let folds = discover_folds(&root).unwrap();
        let names: Vec<_> = folds.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["fold1", "fold2", "fold3"]);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_discover_folds_ignores_other_dirs() {
        let root = make_fold_tree("ignores", &["fold1"]);
        std::fs::create_dir_all(root.join("test_set")).unwrap();
        std::fs::create_dir_all(root.join("notes")).unwrap();

        let folds = discover_folds(&root).unwrap();
        assert_eq!(folds.len(), 1);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_discover_folds_requires_train_val() {
        let root = std::env::temp_dir().join(format!(
            "ucmayo_cv_loader_missing_{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(root.join("fold1").join("train")).unwrap();

        let err = discover_folds(&root).unwrap_err();
        assert!(matches!(err, GradingError::Dataset(_)));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_discover_folds_empty_root() {
        let root = std::env::temp_dir().join(format!(
            "ucmayo_cv_loader_empty_{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(&root).unwrap();

        assert!(discover_folds(&root).is_err());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_dataset_class_ordering() {
        let root = make_fold_tree("classes", &["fold1"]);
        let train = root.join("fold1").join("train");

        let dataset = EndoscopyDataset::new(&train).unwrap();
        assert_eq!(dataset.num_classes(), 4);
        assert_eq!(dataset.class_to_idx["0"], 0);
        assert_eq!(dataset.class_to_idx["3"], 3);
        assert!(dataset.is_empty());

        std::fs::remove_dir_all(&root).ok();
    }
}
