use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::merge::{AnnotatedEvent, EntityId, RaterId, RatingValue};

/// Flat row of the combined output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: RaterId,
    #[serde(rename = "movieId")]
    pub movie_id: EntityId,
    pub rating: Option<RatingValue>,
    pub prediction: Option<RatingValue>,
    pub avg_rating: Option<RatingValue>,
}

impl From<&AnnotatedEvent> for MergedRow {
    fn from(annotated: &AnnotatedEvent) -> Self {
        let event = &annotated.event;
        Self {
            timestamp: event.occurred_at.timestamp(),
            user_id: event.rater_id,
            movie_id: event.entity_id,
            rating: event.observed_rating,
            prediction: event.prediction,
            avg_rating: annotated.aggregate_before,
        }
    }
}

/// CSV table with a single header row; empty aggregates are written as empty cells.
pub struct CsvTable {
    writer: csv::Writer<std::fs::File>,
    rows: usize,
}

impl CsvTable {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create table: {}", path.display()))?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn append(&mut self, row: &MergedRow) -> Result<()> {
        self.writer
            .serialize(row)
            .context("Failed to write table row")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the number of data rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush table")?;
        Ok(self.rows)
    }
}
