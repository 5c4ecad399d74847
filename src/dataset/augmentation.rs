//! Train-time augmentation
//!
//! Random horizontal flips and quarter-turn rotations applied to cached CHW
//! float buffers, so augmented variants can be drawn fresh every epoch
//! without re-decoding images. Endoscopic frames have no canonical
//! orientation, which is what makes rotations safe here.

use rand::Rng;

/// Augmentation policy applied per item, per epoch
#[derive(Debug, Clone, Copy)]
pub struct Augmenter {
    /// Probability of a horizontal flip
    pub flip_prob: f64,
    /// Whether to apply a random quarter-turn rotation (0/90/180/270 degrees)
    pub rotate: bool,
}

impl Default for Augmenter {
    fn default() -> Self {
        Self {
            flip_prob: 0.5,
            rotate: true,
        }
    }
}

impl Augmenter {
    /// Apply the policy to a CHW image buffer, returning the augmented copy
    pub fn apply<R: Rng>(&self, image: &[f32], size: usize, rng: &mut R) -> Vec<f32> {
        let mut out = image.to_vec();

        if self.rotate {
            let quarter_turns = rng.gen_range(0..4u8);
            for _ in 0..quarter_turns {
                out = rotate90_chw(&out, size);
            }
        }

        if rng.gen_bool(self.flip_prob) {
            out = flip_horizontal_chw(&out, size);
        }

        out
    }
}

/// Flip a square CHW buffer horizontally
pub fn flip_horizontal_chw(image: &[f32], size: usize) -> Vec<f32> {
    let plane = size * size;
    let mut out = vec![0.0f32; image.len()];

    for c in 0..3 {
        for y in 0..size {
            for x in 0..size {
                out[c * plane + y * size + x] = image[c * plane + y * size + (size - 1 - x)];
            }
        }
    }

    out
}

/// Rotate a square CHW buffer 90 degrees clockwise
pub fn rotate90_chw(image: &[f32], size: usize) -> Vec<f32> {
    let plane = size * size;
    let mut out = vec![0.0f32; image.len()];

    for c in 0..3 {
        for y in 0..size {
            for x in 0..size {
                // (y, x) -> (x, size - 1 - y)
                out[c * plane + x * size + (size - 1 - y)] = image[c * plane + y * size + x];
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ramp_image(size: usize) -> Vec<f32> {
        (0..3 * size * size).map(|i| i as f32).collect()
    }

    #[test]
    fn test_flip_is_involution() {
        let img = ramp_image(4);
        let flipped = flip_horizontal_chw(&img, 4);
        assert_ne!(img, flipped);
        assert_eq!(flip_horizontal_chw(&flipped, 4), img);
    }

    #[test]
    fn test_four_rotations_identity() {
        let img = ramp_image(5);
        let mut rotated = img.clone();
        for _ in 0..4 {
            rotated = rotate90_chw(&rotated, 5);
        }
        assert_eq!(rotated, img);
    }

    #[test]
    fn test_rotate_moves_corner() {
        // 2x2 single check: top-left goes to top-right under clockwise rotation
        let size = 2;
        let img = ramp_image(size);
        let rotated = rotate90_chw(&img, size);
        assert_eq!(rotated[1], img[0]);
    }

    #[test]
    fn test_augmenter_preserves_length() {
        let img = ramp_image(8);
        let mut rng = ChaCha8Rng::seed_from_u64(35);
        let aug = Augmenter::default();

        for _ in 0..10 {
            let out = aug.apply(&img, 8, &mut rng);
            assert_eq!(out.len(), img.len());
        }
    }

    #[test]
    fn test_augmenter_disabled_is_identity() {
        let img = ramp_image(8);
        let mut rng = ChaCha8Rng::seed_from_u64(35);
        let aug = Augmenter {
            flip_prob: 0.0,
            rotate: false,
        };

        assert_eq!(aug.apply(&img, 8, &mut rng), img);
    }
}
