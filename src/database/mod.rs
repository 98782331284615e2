pub mod connection;
pub mod history;
pub mod setup;

pub use connection::{create_pool, create_read_only_pool, get_connection, DbConn, DbPool};
