use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::errors::with_write_context;
use crate::logs::FilteredEvent;
use crate::partition::{partition_by_entity, PartitionLayout};
use crate::sink::{read_json_lines, write_json_lines};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub partitions: usize,
    pub events: usize,
    pub unattributed: usize,
    pub unreadable: usize,
}

/// Writes one time-sorted event file per movie.
pub struct SplittingService {
    input_file: PathBuf,
    layout: PartitionLayout,
}

impl SplittingService {
    pub fn new<P: AsRef<Path>>(input_file: P, layout: PartitionLayout) -> Self {
        Self {
            input_file: input_file.as_ref().to_path_buf(),
            layout,
        }
    }

    pub fn run(&self) -> Result<SplitSummary> {
        info!("=== Splitting events by movie ===");

        let mut summary = SplitSummary::default();
        let events = self.load_events(&mut summary)?;

        let (partitions, unattributed) = partition_by_entity(events);
        summary.unattributed = unattributed;
        if unattributed > 0 {
            info!("  Dropped {} events without a movie id", unattributed);
        }

        with_write_context(std::fs::create_dir_all(self.layout.dir()), self.layout.dir())?;
        for (movie_id, events) in &partitions {
            summary.events += write_json_lines(&self.layout.partition_path(*movie_id), events)?;
        }
        summary.partitions = partitions.len();

        info!("  → Split {} events into {} partitions", summary.events, summary.partitions);
        Ok(summary)
    }

    fn load_events(&self, summary: &mut SplitSummary) -> Result<Vec<FilteredEvent>> {
        let mut events = Vec::new();
        for (idx, row) in read_json_lines::<FilteredEvent>(&self.input_file)?.into_iter().enumerate() {
            match row {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Skipping unreadable event #{}: {}", idx, e);
                    summary.unreadable += 1;
                }
            }
        }
        Ok(events)
    }
}
