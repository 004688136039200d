//! Connection handle for the embedded SQLite database

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::{Result, StoreError};

const IN_MEMORY: &str = ":memory:";

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file, or `:memory:` for a process-local database
    pub path: String,
    /// How long SQLite waits on a locked database file
    pub busy_timeout: Duration,
    /// Upper bound on any single store operation, lock wait included
    pub op_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "machine_data.db".to_string(),
            busy_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            path: IN_MEMORY.to_string(),
            ..Self::default()
        }
    }

    pub fn from_service(config: &ingest_core::ServiceConfig) -> Self {
        Self {
            path: config.database_path.clone(),
            busy_timeout: config.storage_timeout(),
            op_timeout: config.storage_timeout(),
        }
    }
}

/// Serialized access to a single SQLite connection.
///
/// Every operation runs on the blocking pool and holds the connection for its
/// whole duration, so writes are totally ordered.
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    op_timeout: Duration,
}

impl SqlitePool {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        info!(path = %config.path, "Opening SQLite store");

        let conn = if config.path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(&config.path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
            conn
        };

        conn.busy_timeout(config.busy_timeout)?;

        if config.op_timeout.is_zero() {
            return Err(StoreError::Configuration(
                "operation timeout must be greater than zero".to_string(),
            ));
        }

        debug!("SQLite store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            op_timeout: config.op_timeout,
        })
    }

    /// Run `op` against the connection, failing with [`StoreError::Timeout`]
    /// if the lock or the operation takes longer than the configured bound.
    pub async fn run<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let op_timeout = self.op_timeout;

        let task = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .try_lock_for(op_timeout)
                .ok_or(StoreError::Timeout(op_timeout))?;
            op(&mut *guard)
        });

        match tokio::time::timeout(op_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StoreError::Worker(join_err.to_string())),
            Err(_) => Err(StoreError::Timeout(op_timeout)),
        }
    }

    pub async fn is_healthy(&self) -> bool {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(StoreError::from)
        })
        .await
        .is_ok()
    }
}
