use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use trace_types::TraceId;

use crate::dto::TraceByIdQueryParams;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/traces/{hex-trace-id}[?start=&end=]` (spec.md §6). Returns
/// JSON; protocol-buffer encoding of the nested trace type is not
/// implemented (see DESIGN.md) — a client that requires it gets a `406`
/// rather than a silently-wrong body.
pub async fn get_trace_by_id(
    State(state): State<AppState>,
    Path(hex_trace_id): Path<String>,
    Query(params): Query<TraceByIdQueryParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if wants_protobuf(&headers) {
        return Ok((StatusCode::NOT_ACCEPTABLE, "protobuf encoding is not supported; request application/json").into_response());
    }

    let trace_id = TraceId::from_hex(&hex_trace_id).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let tenant = tenant_from_headers(&headers);
    let start = params.start.unwrap_or(0);
    let end = params.end.unwrap_or(u64::MAX);

    match state.coordinator.find_trace_by_id(&tenant, trace_id, start, end).await? {
        Some(trace) => Ok((StatusCode::OK, axum::Json(trace)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

fn wants_protobuf(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/x-protobuf") && !accept.contains("application/json") && !accept.contains("*/*"))
}

/// No auth/tenant-header middleware is in scope (spec.md §1 non-goal); this
/// just reads a plain identifier, defaulting to the single-tenant case.
pub fn tenant_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-scope-orgid")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "default".to_string())
}
