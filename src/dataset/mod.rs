//! Dataset module for the UCMayo4 endoscopic image collection
//!
//! This module provides:
//! - Loading a labeled-image-directory dataset (one subdirectory per grade)
//! - Cross-validation fold discovery (`fold*` directories with `train`/`val`)
//! - Burn `Dataset`/`Batcher` integration with per-fold channel normalization
//! - Light train-time augmentation (horizontal flip, quarter-turn rotations)
//!
//! ## Directory convention
//!
//! ```text
//! cv_root/
//! ├── fold1/
//! │   ├── train/
//! │   │   ├── 0/   (Mayo 0 frames)
//! │   │   ├── 1/
//! │   │   ├── 2/
//! │   │   └── 3/
//! │   └── val/
//! │       └── ...
//! ├── fold2/
//! │   └── ...
//! └── ...
//! ```
//!
//! The held-out test set uses the same class-subdirectory layout.

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;

pub use augmentation::Augmenter;
pub use burn_dataset::{EndoscopyBatch, EndoscopyBatcher, EndoscopyBurnDataset, EndoscopyItem};
pub use loader::{discover_folds, ChannelStats, DatasetStats, EndoscopyDataset, FoldPaths};

/// File extensions accepted as image samples
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Check whether a path looks like an image sample
pub fn is_image_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("frame_001.jpg")));
        assert!(is_image_file(Path::new("frame_001.PNG")));
        assert!(!is_image_file(Path::new("labels.csv")));
        assert!(!is_image_file(Path::new("no_extension")));
    }
}
