use std::collections::HashMap;

use super::types::{RaterId, RatingValue};

/// Per-entity map of each rater's latest non-retracted rating.
///
/// Means are summed from the active values on every call so a retracted
/// rating leaves no rounding residue behind.
#[derive(Debug, Default)]
pub struct ActiveRatings {
    by_rater: HashMap<RaterId, RatingValue>,
}

impl ActiveRatings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the rater's rating.
    pub fn insert(&mut self, rater_id: RaterId, rating: RatingValue) {
        self.by_rater.insert(rater_id, rating);
    }

    /// Drop the rater's rating. Returns false when the rater was not active.
    pub fn retract(&mut self, rater_id: RaterId) -> bool {
        self.by_rater.remove(&rater_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_rater.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rater.is_empty()
    }

    pub fn get(&self, rater_id: RaterId) -> Option<RatingValue> {
        self.by_rater.get(&rater_id).copied()
    }

    /// Arithmetic mean of the active ratings, `None` when nobody is active.
    pub fn mean(&self) -> Option<RatingValue> {
        average(self.by_rater.values().copied())
    }

    /// Mean over everyone except `rater_id`.
    pub fn mean_excluding(&self, rater_id: RaterId) -> Option<RatingValue> {
        average(
            self.by_rater
                .iter()
                .filter(|(rater, _)| **rater != rater_id)
                .map(|(_, rating)| *rating),
        )
    }
}

fn average(ratings: impl Iterator<Item = RatingValue>) -> Option<RatingValue> {
    let (sum, count) = ratings.fold((0.0, 0usize), |(sum, count), rating| {
        (sum + rating, count + 1)
    });
    (count > 0).then(|| sum / count as f64)
}
