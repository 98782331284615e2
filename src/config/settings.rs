use chrono::Duration;

/// What to do when a single record cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Log the record's identity, count it and keep going.
    SkipAndLog,
    /// Abort the whole partition run.
    FailFast,
}

impl MalformedPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            MalformedPolicy::SkipAndLog => "skip",
            MalformedPolicy::FailFast => "fail-fast",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeSettings {
    /// A history record is visible to an event only when it is older than this.
    pub visibility_offset: Duration,
    /// Rating value that marks a retraction. A missing rating always retracts.
    pub retraction_sentinel: Option<f64>,
    pub malformed_policy: MalformedPolicy,
    /// Leave the acting rater's own active rating out of its event's mean.
    pub exclude_acting_rater: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            visibility_offset: Duration::seconds(5),
            retraction_sentinel: Some(-1.0),
            malformed_policy: MalformedPolicy::SkipAndLog,
            exclude_acting_rater: false,
        }
    }
}

pub struct PipelineSettings {
    pub database_path: String,
    pub partition_dir: &'static str,
    pub filtered_file: &'static str,
    pub merged_file: &'static str,
    pub max_parallel_partitions: usize,
    /// Abort the job on the first failed partition instead of skipping it.
    pub abort_on_partition_failure: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            database_path: std::env::var("HISTORY_DATABASE_PATH")
                .unwrap_or_else(|_| "ratings_history.db".to_string()),
            partition_dir: "by_movie",
            filtered_file: "filtered_rating_events.jsonl",
            merged_file: "merged_data.csv",
            max_parallel_partitions: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            abort_on_partition_failure: false,
        }
    }
}

pub struct AppConfig {
    pub merge: MergeSettings,
    pub pipeline: PipelineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            merge: MergeSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}
