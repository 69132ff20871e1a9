use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use trace_ingester::{IngestError, RejectKind};
use trace_query::QueryError;

/// HTTP-facing error, tagged with the spec.md §7 error kind it maps to.
/// `kind` is the stable machine-readable string; `message` is for humans.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody { kind: self.kind, message: self.message });
        (self.status, body).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::Rejected(RejectKind::RateLimited) => {
                Self { status: StatusCode::TOO_MANY_REQUESTS, kind: "RATE_LIMITED", message: err.to_string() }
            }
            IngestError::Rejected(RejectKind::TraceTooLarge) => {
                Self { status: StatusCode::PAYLOAD_TOO_LARGE, kind: "TRACE_TOO_LARGE", message: err.to_string() }
            }
            IngestError::Rejected(RejectKind::LiveTracesExceeded) => {
                Self { status: StatusCode::TOO_MANY_REQUESTS, kind: "LIVE_TRACES_EXCEEDED", message: err.to_string() }
            }
            IngestError::Rejected(RejectKind::TenantUnknown) => {
                Self { status: StatusCode::BAD_REQUEST, kind: "TENANT_UNKNOWN", message: err.to_string() }
            }
            IngestError::Wal(_) => {
                Self { status: StatusCode::SERVICE_UNAVAILABLE, kind: "STORAGE_UNAVAILABLE", message: err.to_string() }
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match &err {
            QueryError::TooManyRequests { .. } => {
                Self { status: StatusCode::TOO_MANY_REQUESTS, kind: "TOO_MANY_REQUESTS", message: err.to_string() }
            }
            QueryError::BadPredicate(_) => {
                Self { status: StatusCode::BAD_REQUEST, kind: "INVALID_QUERY", message: err.to_string() }
            }
            QueryError::BadRequest(_) => {
                Self { status: StatusCode::BAD_REQUEST, kind: "BAD_TRACE_ID", message: err.to_string() }
            }
            QueryError::Unavailable => {
                Self { status: StatusCode::SERVICE_UNAVAILABLE, kind: "STORAGE_UNAVAILABLE", message: err.to_string() }
            }
            QueryError::ObjectStore(_) => {
                Self { status: StatusCode::SERVICE_UNAVAILABLE, kind: "STORAGE_UNAVAILABLE", message: err.to_string() }
            }
            QueryError::Block(_) => {
                Self { status: StatusCode::UNPROCESSABLE_ENTITY, kind: "BAD_BLOCK", message: err.to_string() }
            }
            QueryError::Meta(_) => {
                Self { status: StatusCode::UNPROCESSABLE_ENTITY, kind: "BAD_BLOCK", message: err.to_string() }
            }
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind: "BAD_TRACE_ID", message: message.into() }
    }

    pub fn request_too_large(message: impl Into<String>) -> Self {
        Self { status: StatusCode::PAYLOAD_TOO_LARGE, kind: "REQUEST_TOO_LARGE", message: message.into() }
    }
}
