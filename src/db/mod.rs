mod models;
mod task_repository;
mod user_repository;

use crate::errors::Error;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::info;

pub use models::*;
pub use task_repository::*;
pub use user_repository::*;

pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    token_hash TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis_tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    task_id TEXT NOT NULL UNIQUE,
    ticker TEXT NOT NULL,
    analysis_date TEXT NOT NULL,
    status TEXT NOT NULL,
    config TEXT,
    completed_at TIMESTAMP,
    processing_time_seconds DOUBLE,
    error TEXT,
    poll_failures INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analysis_tasks_user_created
    ON analysis_tasks (user_id, created_at);

CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL UNIQUE,
    action TEXT NOT NULL,
    confidence DOUBLE NOT NULL,
    position_size INTEGER,
    analysis_report TEXT,
    raw_decision TEXT,
    created_at TIMESTAMP NOT NULL
);
";

/// Per-connection pragmas applied whenever the pool hands out a connection.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Shared handle on the SQLite connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl Database {
    pub fn new(db_path: &str, max_connections: u32) -> Result<Self, Error> {
        let manager = ConnectionManager::<SqliteConnection>::new(db_path);
        let pool = Pool::builder()
            .max_size(max_connections.max(1))
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout_ms: 5_000,
            }))
            .build(manager)?;

        Ok(Database {
            pool: Arc::new(pool),
        })
    }

    pub fn get_conn(&self) -> Result<DbConn, Error> {
        Ok(self.pool.get()?)
    }

    /// Creates the tables and indexes if they do not exist yet.
    pub fn migrate(&self) -> Result<(), Error> {
        let mut conn = self.get_conn()?;
        conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        conn.batch_execute(SCHEMA_SQL)?;
        info!("Database schema is up to date");
        Ok(())
    }
}
