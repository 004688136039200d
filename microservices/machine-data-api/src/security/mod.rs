//! Security Module

mod admission;
mod rate_limiter;

pub use admission::{AdmissionGate, AdmissionKey};
pub use rate_limiter::{RateLimitResult, RateLimiter};
