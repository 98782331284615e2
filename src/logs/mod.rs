pub mod parser;
pub mod reader;

pub use parser::{parse_log_line, FilteredEvent, LineOutcome};
pub use reader::{list_log_files, open_log};
