use anyhow::Context as _;
use std::path::Path;

/// Add context to read errors
pub fn read_context(path: &Path) -> String {
    format!("Failed to read from: {}", path.display())
}

/// Add context to write errors
pub fn write_context(path: &Path) -> String {
    format!("Failed to write to: {}", path.display())
}

/// Wrap result with read context
pub fn with_read_context<T, E>(result: Result<T, E>, path: &Path) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.with_context(|| read_context(path))
}

/// Wrap result with write context
pub fn with_write_context<T, E>(result: Result<T, E>, path: &Path) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.with_context(|| write_context(path))
}
