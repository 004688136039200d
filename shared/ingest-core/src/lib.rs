//! Ingest Core - Shared service infrastructure
//!
//! This crate provides:
//! - The error taxonomy every ingest service reports through
//! - Environment-driven configuration
//! - The service lifecycle trait and runtime bootstrap

pub mod config;
pub mod error;
pub mod service;

pub use config::{IngestMode, RateLimitConfig, RetentionConfig, ServiceConfig};
pub use error::{IngestError, Result};
pub use service::{DependencyStatus, HealthStatus, IngestService, ReadinessStatus, ServiceRuntime};
