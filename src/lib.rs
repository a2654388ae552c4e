//! Skygate - rate-limited gateway for the travel booking public API
//!
//! Requests under the public API prefix are counted per client in an
//! in-memory fixed-window limiter. Clients over quota get a structured 429
//! and every guarded response carries `X-RateLimit-*` and CORS headers.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
