use anyhow::{Context, Result};
use chrono::DateTime;
use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::database::{self, history, setup, DbPool};
use crate::logs::parser::parse_timestamp;
use crate::merge::{EntityId, RaterId, RatingValue};

#[derive(Debug, Deserialize)]
struct HistoryCsvRow {
    #[serde(rename = "userId")]
    user_id: Option<RaterId>,
    #[serde(rename = "movieId")]
    movie_id: EntityId,
    rating: Option<RatingValue>,
    user_tstamp: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Loads a `userId,movieId,rating,user_tstamp` CSV export into the history store.
pub struct ImportService {
    pool: DbPool,
    input_file: PathBuf,
}

impl ImportService {
    pub fn new<P: AsRef<Path>>(pool: DbPool, input_file: P) -> Self {
        Self {
            pool,
            input_file: input_file.as_ref().to_path_buf(),
        }
    }

    pub fn run(&self) -> Result<ImportSummary> {
        info!("=== Importing rating history from {} ===", self.input_file.display());

        let mut conn = database::get_connection(&self.pool)?;
        setup::ensure_schema(&mut conn)?;

        let mut reader = csv::Reader::from_path(&self.input_file)
            .with_context(|| format!("Failed to open {}", self.input_file.display()))?;
        let tx = conn.transaction().context("Failed to start import transaction")?;
        let mut summary = ImportSummary::default();

        for (idx, row) in reader.deserialize::<HistoryCsvRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping history row #{}: {}", idx + 1, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let Some(effective_time) = parse_timestamp(&row.user_tstamp)
                .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
            else {
                warn!("Skipping history row #{}: bad user_tstamp '{}'", idx + 1, row.user_tstamp);
                summary.skipped += 1;
                continue;
            };

            match row.user_id {
                Some(user_id) => {
                    history::insert_rating(&tx, row.movie_id, user_id, row.rating, effective_time)?
                }
                None => {
                    warn!("Skipping history row #{}: missing userId", idx + 1);
                    summary.skipped += 1;
                    continue;
                }
            }
            summary.imported += 1;
        }

        tx.commit().context("Failed to commit imported history")?;
        info!("  → Imported {} ratings ({} skipped)", summary.imported, summary.skipped);
        Ok(summary)
    }
}
