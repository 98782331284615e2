use anyhow::Result;

use rating_replay::cli::Command;
use rating_replay::{
    handle_annotate, handle_combine, handle_extract, handle_import_history, handle_run,
    handle_split, interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Extract { logs, out } => handle_extract(logs, out),
        Command::Split { out } => handle_split(out),
        Command::Annotate { out, merge } => handle_annotate(out, merge),
        Command::Combine { out } => handle_combine(out),
        Command::Run { logs, out, merge } => handle_run(logs, out, merge),
        Command::ImportHistory { file } => handle_import_history(file),
    }
}
