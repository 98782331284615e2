use anyhow::Result;
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::errors::with_read_context;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Every regular file in `dir`, sorted by name so runs are reproducible.
pub fn list_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in with_read_context(fs::read_dir(dir), dir)? {
        let path = with_read_context(entry, dir)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Open a log file as lines, transparently inflating gzip content.
pub fn open_log(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = with_read_context(File::open(path), path)?;
    let mut reader = BufReader::new(file);

    let is_gzip = with_read_context(reader.fill_buf(), path)?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}
