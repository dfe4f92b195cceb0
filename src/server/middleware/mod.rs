//! HTTP middleware: authentication and rate limiting.

pub mod auth;
pub mod rate_limit;
