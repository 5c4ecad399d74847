//! Regression-to-class threshold mapping
//!
//! The model emits one continuous score per image; fixed cut points at 0.5,
//! 1.5 and 2.5 map it back to the ordinal Mayo grade. Scores exactly on a
//! cut point round up to the higher grade.

use crate::NUM_CLASSES;

/// Decision boundaries between adjacent severity grades
pub const SEVERITY_BOUNDARIES: [f32; NUM_CLASSES - 1] = [0.5, 1.5, 2.5];

/// Map a continuous regression score to a severity class (0-3)
pub fn class_from_score(score: f32) -> usize {
    SEVERITY_BOUNDARIES
        .iter()
        .filter(|&&boundary| score >= boundary)
        .count()
}

/// Map a batch of scores to severity classes
pub fn classes_from_scores(scores: &[f32]) -> Vec<usize> {
    scores.iter().map(|&s| class_from_score(s)).collect()
}

/// Derive the binary remission outcome from a severity class
///
/// Mayo 0 and 1 count as remission (encoded 1); Mayo 2 and 3 as active
/// disease (encoded 0).
pub fn remission_from_class(class: usize) -> usize {
    if class <= 1 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_below_first_boundary() {
        assert_eq!(class_from_score(-1.2), 0);
        assert_eq!(class_from_score(0.0), 0);
        assert_eq!(class_from_score(0.49), 0);
    }

    #[test]
    fn test_class_middle_bands() {
        assert_eq!(class_from_score(0.5), 1);
        assert_eq!(class_from_score(1.0), 1);
        assert_eq!(class_from_score(1.49), 1);
        assert_eq!(class_from_score(1.5), 2);
        assert_eq!(class_from_score(2.0), 2);
        assert_eq!(class_from_score(2.49), 2);
    }

    #[test]
    fn test_class_above_last_boundary() {
        assert_eq!(class_from_score(2.5), 3);
        assert_eq!(class_from_score(3.0), 3);
        assert_eq!(class_from_score(17.0), 3);
    }

    #[test]
    fn test_classes_from_scores() {
        let scores = [0.1, 0.7, 1.9, 3.4];
        assert_eq!(classes_from_scores(&scores), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_remission_thresholding() {
        assert_eq!(remission_from_class(0), 1);
        assert_eq!(remission_from_class(1), 1);
        assert_eq!(remission_from_class(2), 0);
        assert_eq!(remission_from_class(3), 0);
    }
}
