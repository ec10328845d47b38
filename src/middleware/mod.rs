//! Ambient HTTP middleware.
//!
//! Request logging with latency tracking. Authentication and
//! per-API-key rate limiting are external collaborators and are not
//! implemented here.

pub mod logging;

pub use logging::{request_logging, request_logging_simple};
