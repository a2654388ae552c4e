//! Request interception: per-client quota, CORS, and rate limit headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, instrument};

use super::response::rate_limit_exceeded;
use crate::config::{CorsConfig, GatewayConfig};
use crate::error::{GatewayError, Result};
use crate::ratelimit::{
    client_key, first_hop, Quota, RateLimitBackend, RateLimitDecision, UNKNOWN_CLIENT,
};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared state for the rate limit middleware.
#[derive(Clone)]
pub struct RateLimitGuard {
    backend: Arc<dyn RateLimitBackend>,
    quota: Quota,
    path_prefix: Arc<str>,
    client_header: Arc<str>,
    cors: Arc<HeaderMap>,
}

impl RateLimitGuard {
    /// Build the guard from gateway configuration.
    pub fn from_config(backend: Arc<dyn RateLimitBackend>, config: &GatewayConfig) -> Result<Self> {
        let quota = config.rate_limiting.quota()?;
        Ok(Self {
            backend,
            quota,
            path_prefix: Arc::from(config.rate_limiting.path_prefix.trim_end_matches('/')),
            client_header: Arc::from(config.rate_limiting.client_ip_header.as_str()),
            cors: Arc::new(cors_headers(&config.cors)?),
        })
    }

    /// Whether `path` falls under the guarded prefix.
    pub fn applies_to(&self, path: &str) -> bool {
        let prefix = &*self.path_prefix;
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    fn decorate(&self, response: &mut Response, decision: &RateLimitDecision) {
        let headers = response.headers_mut();
        for (name, value) in self.cors.iter() {
            headers.insert(name.clone(), value.clone());
        }
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
    }
}

fn cors_headers(cors: &CorsConfig) -> Result<HeaderMap> {
    let value = |field: &str, raw: &str| {
        HeaderValue::from_str(raw)
            .map_err(|e| GatewayError::Config(format!("Invalid cors.{}: {}", field, e)))
    };

    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value("allow_origin", &cors.allow_origin)?);
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value("allow_methods", &cors.allow_methods)?);
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value("allow_headers", &cors.allow_headers)?);
    Ok(headers)
}

/// Middleware enforcing the quota on guarded paths.
///
/// Pre-flight `OPTIONS` requests are answered here without counting against
/// the quota. Denied requests never reach the handler.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn rate_limit(
    State(guard): State<RateLimitGuard>,
    request: Request,
    next: Next,
) -> Response {
    if !guard.applies_to(request.uri().path()) {
        return next.run(request).await;
    }

    if request.method() == Method::OPTIONS {
        let key = first_hop(request.headers(), &guard.client_header)
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
        let decision = guard.backend.peek(&key, &guard.quota).await;
        let mut response = StatusCode::OK.into_response();
        guard.decorate(&mut response, &decision);
        return response;
    }

    let key = client_key(request.headers(), &guard.client_header);
    let decision = guard.backend.check_and_consume(&key, &guard.quota).await;

    if !decision.allowed {
        info!(
            client = %key,
            limit = decision.limit,
            reset_at = decision.reset_at,
            "Rejecting request over rate limit"
        );
        let mut response = rate_limit_exceeded();
        guard.decorate(&mut response, &decision);
        return response;
    }

    debug!(client = %key, remaining = decision.remaining, "Request within rate limit");

    let mut response = next.run(request).await;
    guard.decorate(&mut response, &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::ratelimit::{ManualClock, RateLimiter};
    use axum::body::Body;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts WARN events seen while installed.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        limiter: Arc<RateLimiter<Arc<ManualClock>>>,
        app: Router,
    }

    fn harness(limit: u32, window_ms: u64) -> Harness {
        let mut config = GatewayConfig::default();
        config.rate_limiting.limit = limit;
        config.rate_limiting.window_ms = window_ms;

        let clock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(RateLimiter::with_clock(Arc::clone(&clock)));
        let app = crate::http::build_app(&config, limiter.clone()).unwrap();

        Harness { clock, limiter, app }
    }

    fn request(method: Method, path: &str, client: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(path);
        if let Some(client) = client {
            builder = builder.header("x-forwarded-for", client);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn header(response: &Response, name: &HeaderName) -> String {
        response.headers()[name].to_str().unwrap().to_string()
    }

    #[test]
    fn test_prefix_matching() {
        let config = GatewayConfig::default();
        let limiter = Arc::new(RateLimiter::new());
        let guard = RateLimitGuard::from_config(limiter, &config).unwrap();

        assert!(guard.applies_to("/api/v1"));
        assert!(guard.applies_to("/api/v1/airlines"));
        assert!(guard.applies_to("/api/v1/airports/LHR"));
        assert!(!guard.applies_to("/api/v10"));
        assert!(!guard.applies_to("/api/users"));
        assert!(!guard.applies_to("/health"));
    }

    #[test]
    fn test_invalid_cors_value_is_config_error() {
        let mut config = GatewayConfig::default();
        config.cors.allow_origin = "bad\nvalue".to_string();
        let limiter = Arc::new(RateLimiter::new());

        let result = RateLimitGuard::from_config(limiter, &config);
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_allowed_request_gets_headers() {
        let h = harness(3, 1000);

        let response = h
            .app
            .oneshot(request(Method::GET, "/api/v1/status", Some("203.0.113.1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &X_RATELIMIT_LIMIT), "3");
        assert_eq!(header(&response, &X_RATELIMIT_REMAINING), "2");
        assert_eq!(header(&response, &X_RATELIMIT_RESET), "1000");
        assert_eq!(header(&response, &ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(header(&response, &ACCESS_CONTROL_ALLOW_METHODS), "GET, POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_rejection_after_quota_spent() {
        let h = harness(2, 1000);

        for _ in 0..2 {
            let response = h
                .app
                .clone()
                .oneshot(request(Method::GET, "/api/v1/status", Some("203.0.113.1")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/status", Some("203.0.113.1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, &X_RATELIMIT_REMAINING), "0");
        assert_eq!(header(&response, &X_RATELIMIT_RESET), "1000");
        assert_eq!(header(&response, &ACCESS_CONTROL_ALLOW_ORIGIN), "*");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": { "code": "RATE_LIMIT_EXCEEDED", "message": "Too many requests" }
            })
        );

        assert_eq!(h.limiter.count_for("203.0.113.1"), Some(2));
    }

    #[tokio::test]
    async fn test_window_reset_readmits_client() {
        let h = harness(1, 1000);
        let send = || {
            h.app
                .clone()
                .oneshot(request(Method::GET, "/api/v1/status", Some("198.51.100.9")))
        };

        assert_eq!(send().await.unwrap().status(), StatusCode::OK);
        assert_eq!(send().await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);

        h.clock.set(1000);
        let response = send().await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, &X_RATELIMIT_RESET), "1000");

        h.clock.set(1001);
        let response = send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &X_RATELIMIT_RESET), "2001");
    }

    #[tokio::test]
    async fn test_preflight_never_consumes() {
        let h = harness(3, 1000);

        for _ in 0..10 {
            let response = h
                .app
                .clone()
                .oneshot(request(Method::OPTIONS, "/api/v1/status", Some("203.0.113.1")))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(header(&response, &X_RATELIMIT_REMAINING), "3");
            assert_eq!(header(&response, &ACCESS_CONTROL_ALLOW_HEADERS), "Content-Type, Authorization");
        }
        assert!(h.limiter.is_empty());

        let response = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/status", Some("203.0.113.1")))
            .await
            .unwrap();
        assert_eq!(header(&response, &X_RATELIMIT_REMAINING), "2");
    }

    #[tokio::test]
    async fn test_clients_do_not_share_quota() {
        let h = harness(1, 1000);

        let first = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/status", Some("10.0.0.1")))
            .await
            .unwrap();
        let denied = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/status", Some("10.0.0.1")))
            .await
            .unwrap();
        let other = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/status", Some("10.0.0.2")))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(header(&other, &X_RATELIMIT_REMAINING), "0");
    }

    #[tokio::test]
    async fn test_missing_client_header_shares_unknown_bucket() {
        let h = harness(5, 1000);

        for _ in 0..2 {
            h.app
                .clone()
                .oneshot(request(Method::GET, "/api/v1/status", None))
                .await
                .unwrap();
        }

        assert_eq!(h.limiter.count_for(crate::ratelimit::UNKNOWN_CLIENT), Some(2));
    }

    #[tokio::test]
    async fn test_paths_outside_prefix_are_untouched() {
        let h = harness(1, 1000);

        for _ in 0..5 {
            let response = h
                .app
                .clone()
                .oneshot(request(Method::GET, "/health", Some("203.0.113.1")))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(&X_RATELIMIT_LIMIT).is_none());
            assert!(response.headers().get(&ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        }
        assert!(h.limiter.is_empty());
    }

    #[tokio::test]
    async fn test_preflight_without_client_header_does_not_warn() {
        let h = harness(3, 1000);
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        let _guard = tracing::subscriber::set_default(subscriber);

        for _ in 0..5 {
            let response = h
                .app
                .clone()
                .oneshot(request(Method::OPTIONS, "/api/v1/status", None))
                .await
                .unwrap();
            assert_eq!(header(&response, &X_RATELIMIT_REMAINING), "3");
        }
        assert_eq!(warnings.load(Ordering::SeqCst), 0);

        h.app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/status", None))
            .await
            .unwrap();
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_v1_path_is_counted_and_decorated() {
        let h = harness(3, 1000);

        let response = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/nowhere", Some("203.0.113.5")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&response, &X_RATELIMIT_REMAINING), "2");
        assert_eq!(header(&response, &ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(h.limiter.count_for("203.0.113.5"), Some(1));
    }
}
