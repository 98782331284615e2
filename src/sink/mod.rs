pub mod jsonl;
pub mod table;

pub use jsonl::{read_json_lines, write_json_lines};
pub use table::{CsvTable, MergedRow};
