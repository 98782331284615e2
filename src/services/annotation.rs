use anyhow::{Context, Result};
use log::{error, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::settings::MergeSettings;
use crate::database::{self, DbPool};
use crate::errors::with_write_context;
use crate::merge::{self, EntityId, MalformedRecord, MergeStats, Stream, Supplied, TargetEvent};
use crate::partition::PartitionLayout;
use crate::sink::{read_json_lines, write_json_lines};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub partitions: usize,
    pub failed_partitions: usize,
    pub events: usize,
    pub skipped_records: usize,
}

/// Runs one merge per movie partition, concurrently, and writes the annotated files.
pub struct AnnotationService {
    settings: MergeSettings,
    pool: DbPool,
    layout: PartitionLayout,
    max_parallel: usize,
    abort_on_failure: bool,
}

struct PartitionJob {
    entity_id: EntityId,
    input: PathBuf,
    output: PathBuf,
}

impl AnnotationService {
    pub fn new(
        settings: MergeSettings,
        pool: DbPool,
        layout: PartitionLayout,
        max_parallel: usize,
        abort_on_failure: bool,
    ) -> Self {
        Self {
            settings,
            pool,
            layout,
            max_parallel: max_parallel.max(1),
            abort_on_failure,
        }
    }

    pub async fn run(&self) -> Result<AnnotationSummary> {
        info!("=== Annotating events with visible average rating ===");
        info!(
            "Offset: {}s, malformed records: {}, parallelism: {}",
            self.settings.visibility_offset.num_seconds(),
            self.settings.malformed_policy.as_str(),
            self.max_parallel
        );

        let jobs = self.collect_jobs()?;
        info!("  → Found {} partitions", jobs.len());

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let permit = semaphore.clone().acquire_owned().await?;
            let settings = self.settings.clone();
            let pool = self.pool.clone();

            tasks.spawn_blocking(move || {
                let result = annotate_partition(&settings, &pool, &job);
                drop(permit);
                (job.entity_id, result)
            });
        }

        let mut summary = AnnotationSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let (entity_id, result) = joined.context("Partition task panicked")?;
            summary.partitions += 1;

            match result {
                Ok(stats) => {
                    summary.events += stats.events_annotated;
                    summary.skipped_records += stats.skipped_history + stats.skipped_events;
                }
                Err(e) if self.abort_on_failure => {
                    return Err(e.context(format!("Aborting: movie {} failed", entity_id)));
                }
                Err(e) => {
                    error!("Movie {} skipped: {:#}", entity_id, e);
                    summary.failed_partitions += 1;
                }
            }
        }

        info!(
            "  → Annotated {} events across {} partitions ({} failed, {} records skipped)",
            summary.events, summary.partitions, summary.failed_partitions, summary.skipped_records
        );
        Ok(summary)
    }

    fn collect_jobs(&self) -> Result<Vec<PartitionJob>> {
        Ok(self
            .layout
            .list_partitions()?
            .into_iter()
            .map(|(entity_id, input)| PartitionJob {
                entity_id,
                input,
                output: self.layout.processed_path(entity_id),
            })
            .collect())
    }
}

fn annotate_partition(
    settings: &MergeSettings,
    pool: &DbPool,
    job: &PartitionJob,
) -> Result<MergeStats> {
    remove_stale_output(&job.output)?;
    let events = load_events(job)?;

    let conn = database::get_connection(pool)?;
    let history = database::history::list_for_entity(&conn, job.entity_id)?;
    drop(conn);

    let outcome = merge::merge(settings, history, events)
        .with_context(|| format!("Merge failed for movie {}", job.entity_id))?;

    write_json_lines(&job.output, &outcome.annotated)?;
    Ok(outcome.stats)
}

fn load_events(job: &PartitionJob) -> Result<Vec<Supplied<TargetEvent>>> {
    Ok(read_json_lines::<TargetEvent>(&job.input)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Ok(event) if event.entity_id == job.entity_id => Ok(event),
            Ok(event) => Err(MalformedRecord::new(
                Stream::Events,
                index,
                format!("movie {} event in partition of movie {}", event.entity_id, job.entity_id),
            )),
            Err(e) => Err(MalformedRecord::new(
                Stream::Events,
                index,
                format!("movie {}: {}", job.entity_id, e),
            )),
        })
        .collect())
}

/// A failed partition must not leave an earlier run's output behind for `combine`.
fn remove_stale_output(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => with_write_context(Err(e), path),
        _ => Ok(()),
    }
}
