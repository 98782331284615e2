use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AppConfig, MalformedPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reconstructs the average rating visible at each rating event")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Filter rating events out of raw (optionally gzipped) action logs
    Extract {
        /// Directory with action log files
        #[arg(long, default_value = "action_logs")]
        logs: PathBuf,
        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Partition filtered events into one file per movie
    Split {
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Annotate every partition with the average rating visible before each event
    Annotate {
        #[arg(long, default_value = "out")]
        out: PathBuf,
        #[command(flatten)]
        merge: MergeArgs,
    },
    /// Concatenate annotated partitions into a single CSV table
    Combine {
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Extract, split, annotate and combine in one go
    Run {
        #[arg(long, default_value = "action_logs")]
        logs: PathBuf,
        #[arg(long, default_value = "out")]
        out: PathBuf,
        #[command(flatten)]
        merge: MergeArgs,
    },
    /// Load a userId,movieId,rating,user_tstamp CSV into the history database
    ImportHistory {
        /// CSV file to import
        file: PathBuf,
    },
}

const MAX_OFFSET_SECS: i64 = 86_400;

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct MergeArgs {
    /// Seconds a rating must precede an event to be visible to it (default 5, at most one day)
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_OFFSET_SECS))]
    pub offset_secs: Option<i64>,
    /// Rating value that marks a retraction (default -1)
    #[arg(long, allow_negative_numbers = true)]
    pub sentinel: Option<f64>,
    /// Only a missing rating counts as a retraction
    #[arg(long, conflicts_with = "sentinel")]
    pub no_sentinel: bool,
    /// Fail a partition on its first malformed record instead of skipping it
    #[arg(long)]
    pub fail_fast: bool,
    /// Leave the acting user's own rating out of the average
    #[arg(long)]
    pub exclude_acting_rater: bool,
    /// Stop the whole job when one partition fails
    #[arg(long)]
    pub abort_on_partition_failure: bool,
    /// Maximum number of partitions processed at once
    #[arg(long)]
    pub jobs: Option<usize>,
}

impl MergeArgs {
    /// Override configuration defaults with whatever was given on the command line.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(seconds) = self.offset_secs {
            config.merge.visibility_offset = chrono::Duration::seconds(seconds);
        }
        if let Some(sentinel) = self.sentinel {
            config.merge.retraction_sentinel = Some(sentinel);
        }
        if self.no_sentinel {
            config.merge.retraction_sentinel = None;
        }
        if self.fail_fast {
            config.merge.malformed_policy = MalformedPolicy::FailFast;
        }
        if self.exclude_acting_rater {
            config.merge.exclude_acting_rater = true;
        }
        if self.abort_on_partition_failure {
            config.pipeline.abort_on_partition_failure = true;
        }
        if let Some(jobs) = self.jobs {
            config.pipeline.max_parallel_partitions = jobs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_flags_override_defaults() {
        let cli = Cli::parse_from([
            "rating_replay",
            "annotate",
            "--offset-secs",
            "10",
            "--sentinel",
            "-2",
            "--fail-fast",
            "--jobs",
            "3",
        ]);
        let Command::Annotate { out, merge } = cli.command else {
            panic!("expected annotate");
        };

        let mut config = AppConfig::new();
        merge.apply(&mut config);

        assert_eq!(out, PathBuf::from("out"));
        assert_eq!(config.merge.visibility_offset, chrono::Duration::seconds(10));
        assert_eq!(config.merge.retraction_sentinel, Some(-2.0));
        assert_eq!(config.merge.malformed_policy, MalformedPolicy::FailFast);
        assert!(!config.merge.exclude_acting_rater);
        assert_eq!(config.pipeline.max_parallel_partitions, 3);
    }

    #[test]
    fn test_offset_must_be_within_a_day_and_not_negative() {
        for offset in ["-1", "86401"] {
            let result = Cli::try_parse_from(["rating_replay", "annotate", "--offset-secs", offset]);
            assert!(result.is_err(), "offset {offset} should be rejected");
        }

        let cli = Cli::try_parse_from(["rating_replay", "annotate", "--offset-secs", "0"]).unwrap();
        let Command::Annotate { merge, .. } = cli.command else {
            panic!("expected annotate");
        };
        assert_eq!(merge.offset_secs, Some(0));
    }

    #[test]
    fn test_defaults_are_kept_without_flags() {
        let cli = Cli::parse_from(["rating_replay", "run"]);
        let Command::Run { logs, merge, .. } = cli.command else {
            panic!("expected run");
        };

        let mut config = AppConfig::new();
        merge.apply(&mut config);

        assert_eq!(logs, PathBuf::from("action_logs"));
        assert_eq!(config.merge.visibility_offset, chrono::Duration::seconds(5));
        assert_eq!(config.merge.retraction_sentinel, Some(-1.0));
        assert_eq!(config.merge.malformed_policy, MalformedPolicy::SkipAndLog);
    }
}
