use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::with_read_context;
use crate::logs::FilteredEvent;
use crate::merge::EntityId;

/// Group filtered events by movie, each group stably sorted by time.
///
/// Events without a movie id cannot be attributed to a partition; their
/// count is returned next to the groups.
pub fn partition_by_entity(
    events: impl IntoIterator<Item = FilteredEvent>,
) -> (BTreeMap<EntityId, Vec<FilteredEvent>>, usize) {
    let mut partitions: BTreeMap<EntityId, Vec<FilteredEvent>> = BTreeMap::new();
    let mut unattributed = 0;

    for event in events {
        match event.movie_id {
            Some(movie_id) => partitions.entry(movie_id).or_default().push(event),
            None => unattributed += 1,
        }
    }

    for events in partitions.values_mut() {
        events.sort_by_key(|e| e.timestamp);
    }

    (partitions, unattributed)
}

/// File naming inside the `by_movie` directory.
pub struct PartitionLayout {
    dir: PathBuf,
    partition_regex: Regex,
}

impl PartitionLayout {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            partition_regex: Self::compile_regex()?,
        })
    }

    fn compile_regex() -> Result<Regex> {
        Regex::new(r"^movie_(-?\d+)\.jsonl$")
            .context("Failed to compile partition file name regex")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_path(&self, entity_id: EntityId) -> PathBuf {
        self.dir.join(format!("movie_{}.jsonl", entity_id))
    }

    pub fn processed_path(&self, entity_id: EntityId) -> PathBuf {
        self.dir.join(format!("processed_movie_{}.jsonl", entity_id))
    }

    /// Movie id encoded in a partition file name, `None` for any other file.
    pub fn entity_from_file_name(&self, file_name: &str) -> Option<EntityId> {
        self.partition_regex
            .captures(file_name)
            .and_then(|caps| caps[1].parse().ok())
    }

    /// Partition files present on disk, ordered by movie id.
    pub fn list_partitions(&self) -> Result<Vec<(EntityId, PathBuf)>> {
        self.list_matching(|name| self.entity_from_file_name(name))
    }

    /// Processed output files present on disk, ordered by movie id.
    pub fn list_processed(&self) -> Result<Vec<(EntityId, PathBuf)>> {
        self.list_matching(|name| {
            name.strip_prefix("processed_")
                .and_then(|rest| self.entity_from_file_name(rest))
        })
    }

    fn list_matching<F>(&self, entity_of: F) -> Result<Vec<(EntityId, PathBuf)>>
    where
        F: Fn(&str) -> Option<EntityId>,
    {
        let mut found = Vec::new();
        for entry in with_read_context(fs::read_dir(&self.dir), &self.dir)? {
            let entry = with_read_context(entry, &self.dir)?;
            let name = entry.file_name();
            if let Some(entity_id) = name.to_str().and_then(&entity_of) {
                found.push((entity_id, entry.path()));
            }
        }
        found.sort_by_key(|(entity_id, _)| *entity_id);
        Ok(found)
    }
}
