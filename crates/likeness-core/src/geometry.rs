//! Reconciliation of raw detector candidates.

use crate::types::BoundingBox;

/// Remove candidates that are fully contained in another candidate.
///
/// Survivors keep their relative order. Identical boxes contain each other,
/// so only the first occurrence of a duplicate is kept.
pub fn filter_contained(boxes: &[BoundingBox]) -> Vec<BoundingBox> {
    boxes
        .iter()
        .enumerate()
        .filter(|&(i, candidate)| {
            !boxes.iter().enumerate().any(|(j, other)| {
                if i == j {
                    false
                } else if candidate == other {
                    j < i
                } else {
                    candidate.is_inside(other)
                }
            })
        })
        .map(|(_, b)| *b)
        .collect()
}
