//! Routes served by the gateway itself.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::response::{ApiReply, ApiResponse};

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub service: &'static str,
    pub version: &'static str,
}

/// `/health` and the `/api/v1` tree.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", v1_router())
}

/// Unknown paths under `/api/v1` answer with the NOT_FOUND envelope.
fn v1_router() -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .fallback(v1_not_found)
}

async fn v1_not_found() -> ApiReply<()> {
    ApiReply::not_found("Resource not found")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn status_handler() -> Json<ApiResponse<ServiceStatus>> {
    Json(ApiResponse::success(ServiceStatus {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_json(path: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_envelope() {
        let (status, body) = get_json("/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["service"], "skygate");
    }

    #[tokio::test]
    async fn test_unknown_v1_path_gets_envelope() {
        let (status, body) = get_json("/api/v1/airlines/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": { "code": "NOT_FOUND", "message": "Resource not found" }
            })
        );
    }
}
