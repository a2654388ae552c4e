//! HTTP surface: routes, the rate limit middleware, and the server.

mod middleware;
mod response;
pub mod routes;
mod server;

use std::sync::Arc;

use axum::Router;

pub use middleware::{
    rate_limit, RateLimitGuard, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use response::{
    rate_limit_exceeded, ApiError, ApiReply, ApiResponse, PageMeta, PageQuery, Pagination,
    BAD_REQUEST, FORBIDDEN, NOT_FOUND, RATE_LIMIT_EXCEEDED, UNAUTHORIZED,
};
pub use server::{shutdown_signal, HttpServer};

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::ratelimit::RateLimitBackend;

/// Build the gateway application: the built-in routes wrapped in the rate
/// limit middleware.
pub fn build_app(config: &GatewayConfig, backend: Arc<dyn RateLimitBackend>) -> Result<Router> {
    let guard = RateLimitGuard::from_config(backend, config)?;
    Ok(routes::router().layer(axum::middleware::from_fn_with_state(guard, rate_limit)))
}
