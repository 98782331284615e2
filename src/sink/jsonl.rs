use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::{with_read_context, with_write_context};

/// Write one JSON document per line, replacing any existing file.
pub fn write_json_lines<'a, T, I>(path: &Path, items: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = with_write_context(File::create(path), path)?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;

    for item in items {
        with_write_context(serde_json::to_writer(&mut writer, item), path)?;
        with_write_context(writer.write_all(b"\n"), path)?;
        count += 1;
    }

    with_write_context(writer.flush(), path)?;
    Ok(count)
}

/// Read a JSON Lines file, keeping a per-line parse result so one bad line
/// does not hide the rest. Blank lines are ignored.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<serde_json::Result<T>>> {
    let content = with_read_context(fs::read_to_string(path), path)?;

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line))
        .collect())
}
