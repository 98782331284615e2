use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

pub fn create_pool(database_path: &str) -> Result<DbPool> {
    build_pool(SqliteConnectionManager::file(database_path), database_path)
}

/// Pool over an existing history database; nothing is created or written.
pub fn create_read_only_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX);
    build_pool(manager, database_path)
}

fn build_pool(manager: SqliteConnectionManager, database_path: &str) -> Result<DbPool> {
    r2d2::Pool::builder()
        .build(manager)
        .with_context(|| format!("Failed to open history database: {}", database_path))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConn> {
    pool.get()
        .context("Failed to get database connection from pool")
}
