//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` trait and a `Batcher` for the UCMayo4 images.
//! Batches carry both the float regression target (the grade as a scalar)
//! and the integer class label, so the training loop can compute MSE loss
//! and thresholded accuracy from the same batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::loader::ChannelStats;
use crate::utils::error::{GradingError, Result as GradingResult};

/// A single preprocessed sample ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndoscopyItem {
    /// Image data as flattened CHW float array [3 * H * W], in [0, 1]
    pub image: Vec<f32>,
    /// Severity label (0-3)
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl EndoscopyItem {
    /// Load and preprocess an image from disk
    pub fn from_path(path: &PathBuf, label: usize, image_size: usize) -> GradingResult<Self> {
        let img = ImageReader::open(path)
            .map_err(|e| GradingError::ImageLoad(path.clone(), e.to_string()))?
            .decode()
            .map_err(|e| GradingError::ImageLoad(path.clone(), e.to_string()))?
            .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
            .to_rgb8();

        let (width, height) = (image_size, image_size);
        let mut image = vec![0.0f32; 3 * height * width];

        // CHW layout, scaled to [0, 1]
        for y in 0..height {
            for x in 0..width {
                let pixel = img.get_pixel(x as u32, y as u32);
                image[y * width + x] = pixel[0] as f32 / 255.0;
                image[height * width + y * width + x] = pixel[1] as f32 / 255.0;
                image[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
            }
        }

        Ok(Self {
            image,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Create from pre-loaded image data
    pub fn from_data(image: Vec<f32>, label: usize, path: String) -> Self {
        Self { image, label, path }
    }
}

/// UCMayo4 dataset implementing Burn's `Dataset` trait
///
/// Loads images lazily by default; `new_cached` preloads everything in
/// parallel, which the training loop prefers since folds are revisited
/// every epoch.
#[derive(Debug, Clone)]
pub struct EndoscopyBurnDataset {
    /// List of (image_path, label) pairs
    samples: Vec<(PathBuf, usize)>,
    /// Target image size
    image_size: usize,
    /// Cached items, populated by `new_cached`
    cached_items: Option<Vec<EndoscopyItem>>,
}

impl EndoscopyBurnDataset {
    /// Create a lazy-loading dataset from a list of samples
    pub fn new(samples: Vec<(PathBuf, usize)>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
            cached_items: None,
        }
    }

    /// Create a dataset with all images preloaded into memory
    pub fn new_cached(
        samples: Vec<(PathBuf, usize)>,
        image_size: usize,
    ) -> GradingResult<Self> {
        let total = samples.len();

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicUsize::new(0);

        // Parallel loading with rayon
        let cached_items: GradingResult<Vec<_>> = samples
            .par_iter()
            .map(|(path, label)| {
                let item = EndoscopyItem::from_path(path, *label, image_size);
                let count = loaded.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    pb.set_position(count as u64);
                }
                item
            })
            .collect();

        pb.finish_and_clear();

        Ok(Self {
            samples,
            image_size,
            cached_items: Some(cached_items?),
        })
    }

    /// The configured image size
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Labels of all samples, in sample order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|(_, label)| *label).collect()
    }

    /// Samples per class, indexed by label
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for (_, label) in &self.samples {
            if *label < num_classes {
                counts[*label] += 1;
            }
        }
        counts
    }
}

impl Dataset<EndoscopyItem> for EndoscopyBurnDataset {
    fn get(&self, index: usize) -> Option<EndoscopyItem> {
        if index >= self.samples.len() {
            return None;
        }

        if let Some(ref cached) = self.cached_items {
            return cached.get(index).cloned();
        }

        let (path, label) = &self.samples[index];
        EndoscopyItem::from_path(path, *label, self.image_size).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of endoscopy images for regression training
#[derive(Clone, Debug)]
pub struct EndoscopyBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Regression targets (grade as float) with shape [batch_size]
    pub targets: Tensor<B, 1>,
    /// Integer class labels with shape [batch_size]
    pub classes: Tensor<B, 1, Int>,
}

/// Batcher normalizing with per-fold channel statistics
#[derive(Clone, Debug)]
pub struct EndoscopyBatcher {
    image_size: usize,
    stats: ChannelStats,
}

impl EndoscopyBatcher {
    /// Create a batcher for the given image size and channel statistics
    pub fn new(image_size: usize, stats: ChannelStats) -> Self {
        Self { image_size, stats }
    }
}

impl<B: Backend> Batcher<B, EndoscopyItem, EndoscopyBatch<B>> for EndoscopyBatcher {
    fn batch(&self, items: Vec<EndoscopyItem>, device: &B::Device) -> EndoscopyBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            device,
        );

        // Normalize with the fold's train-split statistics: (x - mean) / std
        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(self.stats.mean.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(self.stats.std.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<f32> = items.iter().map(|item| item.label as f32).collect();
        let targets = Tensor::<B, 1>::from_floats(
            TensorData::new(targets_data, [batch_size]),
            device,
        );

        let classes_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let classes = Tensor::<B, 1, Int>::from_data(
            TensorData::new(classes_data, [batch_size]),
            device,
        );

        EndoscopyBatch {
            images,
            targets,
            classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    #[test]
    fn test_item_from_data() {
        let image = vec![0.5f32; 3 * 64 * 64];
        let item = EndoscopyItem::from_data(image, 2, "frame.jpg".to_string());

        assert_eq!(item.label, 2);
        assert_eq!(item.image.len(), 3 * 64 * 64);
    }

    #[test]
    fn test_class_distribution() {
        let samples = vec![
            (PathBuf::from("a.jpg"), 0),
            (PathBuf::from("b.jpg"), 0),
            (PathBuf::from("c.jpg"), 1),
            (PathBuf::from("d.jpg"), 3),
        ];

        let dataset = EndoscopyBurnDataset::new(samples, 64);
        assert_eq!(dataset.class_distribution(4), vec![2, 1, 0, 1]);
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let batcher = EndoscopyBatcher::new(32, ChannelStats::default());

        let items = vec![
            EndoscopyItem::from_data(vec![0.2f32; 3 * 32 * 32], 1, "a.jpg".to_string()),
            EndoscopyItem::from_data(vec![0.8f32; 3 * 32 * 32], 3, "b.jpg".to_string()),
        ];

        let batch: EndoscopyBatch<DefaultBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 32, 32]);
        assert_eq!(batch.targets.dims(), [2]);
        assert_eq!(batch.classes.dims(), [2]);

        let targets: Vec<f32> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![1.0, 3.0]);
    }

    #[test]
    fn test_batch_normalization() {
        let device = Default::default();
        let stats = ChannelStats {
            mean: [0.5, 0.5, 0.5],
            std: [0.25, 0.25, 0.25],
        };
        let batcher = EndoscopyBatcher::new(2, stats);

        // Constant 0.75 image: normalized value is (0.75 - 0.5) / 0.25 = 1.0
        let items = vec![EndoscopyItem::from_data(
            vec![0.75f32; 3 * 2 * 2],
            0,
            "c.jpg".to_string(),
        )];
        let batch: EndoscopyBatch<DefaultBackend> = batcher.batch(items, &device);

        let values: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        for v in values {
            assert!((v - 1.0).abs() < 1e-5);
        }
    }
}
