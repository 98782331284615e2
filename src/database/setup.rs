use anyhow::{Context, Result};

use super::connection::DbConn;

/// Create the history table and its lookup index if they are missing.
pub fn ensure_schema(conn: &mut DbConn) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to create history schema")?;

    log::info!("History schema ready");
    Ok(())
}
