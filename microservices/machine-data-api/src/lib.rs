//! Machine Data API
//!
//! Accepts arbitrary JSON telemetry from heterogeneous devices, derives a
//! machine id, device type and event time from it, and stores every payload
//! for later querying, aggregation and retention.

pub mod api;
pub mod extract;
pub mod ingest;
pub mod metrics;
pub mod middleware;
pub mod retention;
pub mod security;
pub mod service;

pub use api::{create_router, AppState};
pub use service::MachineDataService;
