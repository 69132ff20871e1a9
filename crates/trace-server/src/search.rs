use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use trace_query::{Query as PredicateQuery, SearchRequest, SearchResponse};

use crate::dto::SearchQueryParams;
use crate::error::ApiError;
use crate::state::AppState;
use crate::traces::tenant_from_headers;

/// `GET /api/search` (spec.md §6). When the block-targeting parameter set
/// (`blockID`/`startPage`/`totalPages`) is present, this is a worker-offload
/// request: run exactly the one named job and return its fragment
/// `SearchResponse`. Otherwise it's a plain coordinator-side search over the
/// tenant's whole block population.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
    headers: HeaderMap,
) -> Result<Json<SearchResponse>, ApiError> {
    let tenant = tenant_from_headers(&headers);
    let request = to_search_request(&params);

    if let Some(block_id) = &params.block_id {
        let query = parse_query(&request.query)?;
        let start_page = params.start_page.ok_or_else(|| ApiError::bad_request("startPage is required with blockID"))?;
        let total_pages = params.total_pages.ok_or_else(|| ApiError::bad_request("totalPages is required with blockID"))?;
        let limit = if request.limit == 0 { usize::MAX } else { request.limit };

        let result = state
            .coordinator
            .run_worker_job(&tenant, block_id, start_page, total_pages, &query, &request, limit)
            .await?;
        return Ok(Json(SearchResponse { traces: result.matched, metrics: result.metrics }));
    }

    let response = state.coordinator.search(&tenant, request).await?;
    Ok(Json(response))
}

fn parse_query(q: &str) -> Result<PredicateQuery, ApiError> {
    if q.trim().is_empty() {
        Ok(PredicateQuery::default())
    } else {
        trace_query::parse_query(q).map_err(ApiError::from)
    }
}

fn to_search_request(params: &SearchQueryParams) -> SearchRequest {
    SearchRequest {
        query: params.q.clone().unwrap_or_default(),
        start_unix_nano: params.start.unwrap_or(0),
        end_unix_nano: params.end.unwrap_or(u64::MAX),
        min_duration_nanos: params.min_duration,
        max_duration_nanos: params.max_duration,
        limit: params.limit.unwrap_or(20),
        deadline_secs: 30,
    }
}
