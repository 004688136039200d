//! Configuration management for ingest services

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Ingestion policy applied to every submitted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Best-effort extraction from any JSON object
    #[default]
    Flexible,
    /// Legacy schema: `machineId`, `timestamp` and an object `data` are required
    Strict,
}

impl FromStr for IngestMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flexible" => Ok(Self::Flexible),
            "strict" => Ok(Self::Strict),
            other => Err(IngestError::Config(format!("Invalid INGEST_MODE: {}", other))),
        }
    }
}

/// Request budget for one limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetentionConfig {
    /// Records older than this are swept; `None` disables the background sweep
    pub retention_days: Option<u32>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_bind: String,
    pub database_path: String,
    pub ingest_mode: IngestMode,
    pub max_payload_bytes: usize,
    pub storage_timeout_ms: u64,
    pub machine_rate_limit: RateLimitConfig,
    pub global_rate_limit: RateLimitConfig,
    pub max_query_limit: u32,
    pub retention: RetentionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "machine-data-api".to_string(),
            http_bind: "0.0.0.0:3000".to_string(),
            database_path: "machine_data.db".to_string(),
            ingest_mode: IngestMode::Flexible,
            max_payload_bytes: 10 * 1024 * 1024,
            storage_timeout_ms: 5_000,
            machine_rate_limit: RateLimitConfig {
                max_requests: 1,
                window_secs: 10,
            },
            global_rate_limit: RateLimitConfig {
                max_requests: 100,
                window_secs: 60,
            },
            max_query_limit: 1_000,
            retention: RetentionConfig {
                retention_days: None,
                sweep_interval_secs: 3_600,
            },
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys fall back to defaults.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let retention_days = match lookup("RETENTION_DAYS") {
            Some(raw) if !raw.trim().is_empty() => match parse_var::<u32>("RETENTION_DAYS", &raw)? {
                0 => {
                    return Err(IngestError::Config(
                        "Invalid RETENTION_DAYS: must be at least 1".to_string(),
                    ))
                }
                days => Some(days),
            },
            _ => None,
        };

        Ok(Self {
            service_name: lookup("SERVICE_NAME").unwrap_or(defaults.service_name),
            http_bind: lookup("HTTP_BIND").unwrap_or(defaults.http_bind),
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            ingest_mode: match lookup("INGEST_MODE") {
                Some(raw) => raw.parse()?,
                None => defaults.ingest_mode,
            },
            max_payload_bytes: parsed_or(&lookup, "MAX_PAYLOAD_BYTES", defaults.max_payload_bytes)?,
            storage_timeout_ms: parsed_or(&lookup, "STORAGE_TIMEOUT_MS", defaults.storage_timeout_ms)?,
            machine_rate_limit: RateLimitConfig {
                max_requests: parsed_or(
                    &lookup,
                    "MACHINE_RATE_LIMIT",
                    defaults.machine_rate_limit.max_requests,
                )?,
                window_secs: parsed_or(
                    &lookup,
                    "MACHINE_RATE_WINDOW_SECS",
                    defaults.machine_rate_limit.window_secs,
                )?,
            },
            global_rate_limit: RateLimitConfig {
                max_requests: parsed_or(
                    &lookup,
                    "GLOBAL_RATE_LIMIT",
                    defaults.global_rate_limit.max_requests,
                )?,
                window_secs: parsed_or(
                    &lookup,
                    "GLOBAL_RATE_WINDOW_SECS",
                    defaults.global_rate_limit.window_secs,
                )?,
            },
            max_query_limit: parsed_or(&lookup, "MAX_QUERY_LIMIT", defaults.max_query_limit)?,
            retention: RetentionConfig {
                retention_days,
                sweep_interval_secs: parsed_or(
                    &lookup,
                    "RETENTION_SWEEP_INTERVAL_SECS",
                    defaults.retention.sweep_interval_secs,
                )?,
            },
        })
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_var(key, &raw),
        None => Ok(default),
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| IngestError::Config(format!("Invalid {}: {}", key, e)))
}
