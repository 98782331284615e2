use anyhow::Result;
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::{with_read_context, with_write_context};
use crate::logs::{self, LineOutcome};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub files: usize,
    pub lines: usize,
    pub rating_events: usize,
    pub malformed_lines: usize,
}

/// Filters `rating` actions out of a directory of raw action logs.
pub struct ExtractionService {
    log_dir: PathBuf,
    output_file: PathBuf,
}

impl ExtractionService {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(log_dir: P, output_file: Q) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            output_file: output_file.as_ref().to_path_buf(),
        }
    }

    pub fn run(&self) -> Result<ExtractionSummary> {
        info!("=== Extracting rating events ===");
        info!("Logs: {}, Output: {}", self.log_dir.display(), self.output_file.display());

        if let Some(parent) = self.output_file.parent() {
            with_write_context(std::fs::create_dir_all(parent), parent)?;
        }

        let files = logs::list_log_files(&self.log_dir)?;
        let file = with_write_context(File::create(&self.output_file), &self.output_file)?;
        let mut output = BufWriter::new(file);
        let mut summary = ExtractionSummary::default();

        for path in &files {
            self.extract_file(path, &mut output, &mut summary)?;
            summary.files += 1;
        }

        with_write_context(output.flush(), &self.output_file)?;

        if summary.malformed_lines > 0 {
            info!("  Skipped {} malformed lines", summary.malformed_lines);
        }
        info!(
            "  → {} rating events from {} lines in {} files",
            summary.rating_events, summary.lines, summary.files
        );
        Ok(summary)
    }

    fn extract_file<W: Write>(
        &self,
        path: &Path,
        output: &mut W,
        summary: &mut ExtractionSummary,
    ) -> Result<()> {
        info!("  Reading {}", path.display());
        let reader = logs::open_log(path)?;

        for (line_no, line) in reader.lines().enumerate() {
            let line = with_read_context(line, path)?;
            if line.trim().is_empty() {
                continue;
            }
            summary.lines += 1;

            match logs::parse_log_line(&line) {
                LineOutcome::Rating(event) => {
                    with_write_context(serde_json::to_writer(&mut *output, &event), &self.output_file)?;
                    with_write_context(output.write_all(b"\n"), &self.output_file)?;
                    summary.rating_events += 1;
                }
                LineOutcome::OtherEvent => {}
                LineOutcome::Malformed(reason) => {
                    warn!("Skipping {}:{}: {}", path.display(), line_no + 1, reason);
                    summary.malformed_lines += 1;
                }
            }
        }

        Ok(())
    }
}
