//! Request middleware

mod rate_limit;

pub use rate_limit::global_rate_limit;
