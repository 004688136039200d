//! Ingest Store
//!
//! Append-only persistence for ingested machine data, backed by an embedded
//! SQLite table. Provides filtered pagination, per-machine lookups, aggregate
//! statistics and retention sweeps.

mod error;
mod pool;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use pool::{SqlitePool, StoreConfig};
pub use store::{RecordStore, SqliteRecordStore};
pub use types::*;
