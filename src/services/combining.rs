use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::merge::AnnotatedEvent;
use crate::partition::PartitionLayout;
use crate::sink::{read_json_lines, CsvTable, MergedRow};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CombineSummary {
    pub files: usize,
    pub rows: usize,
    pub unreadable: usize,
}

/// Concatenates every processed partition into one CSV table.
pub struct CombiningService {
    layout: PartitionLayout,
    output_file: PathBuf,
}

impl CombiningService {
    pub fn new<P: AsRef<Path>>(layout: PartitionLayout, output_file: P) -> Self {
        Self {
            layout,
            output_file: output_file.as_ref().to_path_buf(),
        }
    }

    pub fn run(&self) -> Result<CombineSummary> {
        info!("=== Combining processed partitions ===");

        let processed = self.layout.list_processed()?;
        if processed.is_empty() {
            anyhow::bail!("No processed partitions found in {}", self.layout.dir().display());
        }

        let mut table = CsvTable::create(&self.output_file)?;
        let mut summary = CombineSummary::default();

        for (movie_id, path) in &processed {
            for (idx, row) in read_json_lines::<AnnotatedEvent>(path)?.into_iter().enumerate() {
                match row {
                    Ok(annotated) => table.append(&MergedRow::from(&annotated))?,
                    Err(e) => {
                        warn!("Skipping unreadable row #{} of movie {}: {}", idx, movie_id, e);
                        summary.unreadable += 1;
                    }
                }
            }
            summary.files += 1;
        }

        summary.rows = table.finish()?;
        info!("  → Merged {} rows from {} files into {}", summary.rows, summary.files, self.output_file.display());
        Ok(summary)
    }
}
