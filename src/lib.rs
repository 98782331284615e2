pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod logs;
pub mod merge;
pub mod partition;
pub mod services;
pub mod sink;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use std::path::Path;

use crate::cli::{Command, MergeArgs};
use crate::config::settings::AppConfig;
use crate::partition::PartitionLayout;
use crate::services::{
    AnnotationService, CombiningService, ExtractionService, ImportService, SplittingService,
};

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

pub fn handle_extract(logs: &Path, out: &Path) -> Result<()> {
    let config = AppConfig::new();
    let service = ExtractionService::new(logs, out.join(config.pipeline.filtered_file));
    service.run().map(|_| ())
}

pub fn handle_split(out: &Path) -> Result<()> {
    let config = AppConfig::new();
    let layout = PartitionLayout::new(out.join(config.pipeline.partition_dir))?;
    let service = SplittingService::new(out.join(config.pipeline.filtered_file), layout);
    service.run().map(|_| ())
}

pub fn handle_annotate(out: &Path, merge: &MergeArgs) -> Result<()> {
    let mut config = AppConfig::new();
    merge.apply(&mut config);

    let pool = database::create_read_only_pool(&config.pipeline.database_path)?;
    let layout = PartitionLayout::new(out.join(config.pipeline.partition_dir))?;
    let service = AnnotationService::new(
        config.merge,
        pool,
        layout,
        config.pipeline.max_parallel_partitions,
        config.pipeline.abort_on_partition_failure,
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async { service.run().await.map(|_| ()) })
}

pub fn handle_combine(out: &Path) -> Result<()> {
    let config = AppConfig::new();
    let layout = PartitionLayout::new(out.join(config.pipeline.partition_dir))?;
    let service = CombiningService::new(layout, out.join(config.pipeline.merged_file));
    service.run().map(|_| ())
}

pub fn handle_run(logs: &Path, out: &Path, merge: &MergeArgs) -> Result<()> {
    handle_extract(logs, out)?;
    handle_split(out)?;
    handle_annotate(out, merge)?;
    handle_combine(out)
}

pub fn handle_import_history(file: &Path) -> Result<()> {
    let config = AppConfig::new();
    let pool = database::create_pool(&config.pipeline.database_path)?;
    let service = ImportService::new(pool, file);
    service.run().map(|_| ())
}
