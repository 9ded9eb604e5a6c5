// Tracklab SQLite Infrastructure
// Implements the core JobStore port over sqlx/SQLite

mod connection;
mod job_store;
mod migration;

pub use connection::create_pool;
pub use job_store::SqliteJobStore;
pub use migration::run_migrations;
