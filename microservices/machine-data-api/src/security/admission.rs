//! Admission Gate
//!
//! Decides whether a request may proceed before anything touches the store.

use std::time::Instant;

use ingest_core::{IngestError, RateLimitConfig, Result};
use ingest_store::JsonObject;
use ingest_telemetry::Counter;
use regex::Regex;
use tracing::warn;

use super::rate_limiter::{RateLimitResult, RateLimiter};
use crate::extract::{self, MACHINE_ID_KEYS};

const GLOBAL_KEY: &str = "global";

/// Identity a request is throttled under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionKey {
    Machine(String),
    Address(String),
}

impl AdmissionKey {
    fn bucket(&self) -> String {
        match self {
            Self::Machine(id) => format!("machine:{}", id),
            Self::Address(ip) => format!("ip:{}", ip),
        }
    }
}

pub struct AdmissionGate {
    machine_limiter: RateLimiter,
    global_limiter: RateLimiter,
    raw_machine_id: Regex,
    rejected: Counter,
}

impl AdmissionGate {
    pub fn new(machine: &RateLimitConfig, global: &RateLimitConfig) -> Self {
        let keys = MACHINE_ID_KEYS.join("|");
        let pattern = format!(
            r#""({})"\s*:\s*(?:"((?:[^"\\]|\\.)*)"|(-?\d+(?:\.\d+)?))"#,
            keys
        );

        Self {
            machine_limiter: RateLimiter::from_config(machine),
            global_limiter: RateLimiter::from_config(global),
            raw_machine_id: Regex::new(&pattern).expect("valid machine id pattern"),
            rejected: Counter::default(),
        }
    }

    /// Machine id from the parsed payload, else scraped from the raw body,
    /// else the caller's address.
    pub fn resolve_key(
        &self,
        payload: Option<&JsonObject>,
        raw_body: &str,
        client_ip: &str,
    ) -> AdmissionKey {
        let machine_id = match payload {
            Some(payload) => extract::machine_id(payload),
            None => self.scrape_machine_id(raw_body),
        };

        match machine_id {
            Some(id) => AdmissionKey::Machine(id),
            None => AdmissionKey::Address(client_ip.to_string()),
        }
    }

    pub fn admit(&self, key: &AdmissionKey) -> Result<()> {
        self.admit_at(key, Instant::now())
    }

    pub fn admit_at(&self, key: &AdmissionKey, now: Instant) -> Result<()> {
        match self.machine_limiter.check_at(&key.bucket(), now) {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Exceeded { retry_after } => {
                self.rejected.inc();
                warn!(key = ?key, retry_after, "Per-key rate limit exceeded");
                Err(IngestError::RateLimited {
                    scope: "machine".to_string(),
                    retry_after_secs: retry_after,
                })
            }
        }
    }

    pub fn admit_global(&self) -> Result<()> {
        self.admit_global_at(Instant::now())
    }

    pub fn admit_global_at(&self, now: Instant) -> Result<()> {
        match self.global_limiter.check_at(GLOBAL_KEY, now) {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Exceeded { retry_after } => {
                self.rejected.inc();
                warn!(retry_after, "Global rate limit exceeded");
                Err(IngestError::RateLimited {
                    scope: "global".to_string(),
                    retry_after_secs: retry_after,
                })
            }
        }
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.get()
    }

    /// Best match by key priority among `"key": value` pairs in unparsed text
    fn scrape_machine_id(&self, raw_body: &str) -> Option<String> {
        self.raw_machine_id
            .captures_iter(raw_body)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str();
                let rank = MACHINE_ID_KEYS.iter().position(|candidate| *candidate == key)?;
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
                Some((rank, value))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, value)| value)
    }
}
