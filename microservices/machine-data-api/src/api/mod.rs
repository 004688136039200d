//! HTTP surface of the machine data service

pub mod error;
pub mod rest;
mod state;

pub use error::ApiError;
pub use rest::create_router;
pub use state::{ApiLimits, AppState, SERVICE_ID};
