use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::MalformedRecord;

pub type RaterId = i64;
pub type EntityId = i64;
pub type RatingValue = f64;
pub type Instant = DateTime<Utc>;

/// What a provider hands the engine: a record, or the reason it could not be built.
pub type Supplied<T> = Result<T, MalformedRecord>;

/// One historical rating contribution. `rating: None` always means retraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRecord {
    pub rater_id: RaterId,
    pub rating: Option<RatingValue>,
    pub effective_time: Instant,
}

impl RatingRecord {
    pub fn new(rater_id: RaterId, rating: Option<RatingValue>, effective_time: Instant) -> Self {
        Self {
            rater_id,
            rating,
            effective_time,
        }
    }
}

/// A rating action whose visible aggregate has to be reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEvent {
    #[serde(rename = "userId")]
    pub rater_id: RaterId,
    #[serde(rename = "movieId")]
    pub entity_id: EntityId,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_seconds")]
    pub occurred_at: Instant,
    #[serde(rename = "rating")]
    pub observed_rating: Option<RatingValue>,
    pub prediction: Option<RatingValue>,
}

/// A target event together with the mean that was visible just before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub event: TargetEvent,
    #[serde(rename = "avg_rating")]
    pub aggregate_before: Option<RatingValue>,
}

/// Which input sequence a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    History,
    Events,
}

impl Stream {
    pub fn as_str(&self) -> &str {
        match self {
            Stream::History => "history",
            Stream::Events => "events",
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub events_annotated: usize,
    pub history_applied: usize,
    pub insertions: usize,
    pub retractions: usize,
    pub skipped_history: usize,
    pub skipped_events: usize,
    pub cursor_advances: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub annotated: Vec<AnnotatedEvent>,
    pub stats: MergeStats,
}
