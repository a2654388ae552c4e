//! JSON response envelope shared by the v1 API.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error code sent with a 429.
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
pub const BAD_REQUEST: &str = "BAD_REQUEST";
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const NOT_FOUND: &str = "NOT_FOUND";

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// The `{ success, data, error, meta }` body used by every v1 route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Machine-readable error carried in a failed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Pagination block for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    /// A successful envelope wrapping `data`.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    /// Attach pagination metadata.
    pub fn with_meta(mut self, meta: PageMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// A failed envelope.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
            meta: None,
        }
    }

    /// Attach extra context to a failed envelope.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// An envelope paired with the status it should be sent with.
pub struct ApiReply<T>(pub StatusCode, pub ApiResponse<T>);

impl<T: Serialize> IntoResponse for ApiReply<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl ApiReply<()> {
    /// A failed envelope with an explicit status and code.
    pub fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self(status, ApiResponse::failure(code, message))
    }

    pub fn bad_request(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        let body = ApiResponse::failure(BAD_REQUEST, message);
        Self(
            StatusCode::BAD_REQUEST,
            match details {
                Some(details) => body.with_details(details),
                None => body,
            },
        )
    }

    pub fn unauthorized() -> Self {
        Self::error(StatusCode::UNAUTHORIZED, UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::error(StatusCode::FORBIDDEN, FORBIDDEN, "Forbidden")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(StatusCode::NOT_FOUND, NOT_FOUND, message)
    }
}

/// The body and status returned when a client has spent its quota.
pub fn rate_limit_exceeded() -> Response {
    ApiReply::error(
        StatusCode::TOO_MANY_REQUESTS,
        RATE_LIMIT_EXCEEDED,
        "Too many requests",
    )
    .into_response()
}

/// Raw `?page=&limit=` query values.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Page position resolved from the query string.
///
/// `page` is at least 1 and `limit` is kept within 1..=100. Missing or
/// unparseable values fall back to page 1 of 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub offset: u64,
}

impl Pagination {
    pub fn from_query(query: &PageQuery) -> Self {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(|v| v.trim().parse::<i64>().ok());

        let page = parse(&query.page).unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;
        let limit = parse(&query.limit)
            .unwrap_or(i64::from(DEFAULT_PAGE_SIZE))
            .clamp(1, i64::from(MAX_PAGE_SIZE)) as u32;

        Self {
            page,
            limit,
            offset: u64::from(page - 1) * u64::from(limit),
        }
    }

    /// Metadata for a listing of `total` rows.
    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta::new(self.page, self.limit, total)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::from_query(&PageQuery::default())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Pagination {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<PageQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        Ok(Self::from_query(&query))
    }
}
