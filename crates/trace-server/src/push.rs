use axum::extract::{Path, State};
use axum::Json;
use trace_ingester::IngestSpan;

use crate::dto::{PushAck, PushRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/push/{tenant}` — the typed `Push(tenant, []ResourceSpans)` RPC
/// from spec.md §6, exposed over HTTP for this exercise (no OTLP/Jaeger
/// receiver; see spec.md §1's non-goal). Oversize-body rejection
/// (`REQUEST_TOO_LARGE`) is enforced by the `DefaultBodyLimit` layer this
/// route is wrapped in, not here.
pub async fn push(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushAck>, ApiError> {
    let spans = flatten(request);
    state.accumulator.push(&tenant, spans).await?;
    Ok(Json(PushAck { accepted: true }))
}

fn flatten(request: PushRequest) -> Vec<IngestSpan> {
    let mut out = Vec::new();
    for rs in request.resource_spans {
        for ss in rs.scope_spans {
            for s in ss.spans {
                out.push(IngestSpan {
                    trace_id: s.trace_id,
                    resource: rs.resource.clone(),
                    scope: ss.scope.clone(),
                    span: s.span,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_types::{Resource, Span, SpanId, SpanKind, StatusCode, TraceId};

    fn span(id: u8) -> Span {
        Span {
            span_id: SpanId([id; 8]),
            parent_span_id: SpanId::ZERO,
            name: "/hi".into(),
            kind: SpanKind::Server,
            status: StatusCode::Ok,
            status_message: String::new(),
            start_time_unix_nano: 0,
            end_time_unix_nano: 1,
            trace_state: String::new(),
            http_method: None,
            http_url: None,
            http_status_code: None,
            attrs: Vec::new(),
            events: Vec::new(),
            links: Vec::new(),
            dropped_attributes_count: 0,
            dropped_events_count: 0,
            dropped_links_count: 0,
        }
    }

    #[test]
    fn flattens_nested_resource_scope_spans_into_ingest_spans() {
        let request = PushRequest {
            resource_spans: vec![crate::dto::PushResourceSpans {
                resource: Resource { service_name: Some("api".into()), ..Default::default() },
                scope_spans: vec![crate::dto::PushScopeSpans {
                    scope: Default::default(),
                    spans: vec![
                        crate::dto::PushSpan { trace_id: TraceId([1; 16]), span: span(1) },
                        crate::dto::PushSpan { trace_id: TraceId([1; 16]), span: span(2) },
                    ],
                }],
            }],
        };
        let spans = flatten(request);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].resource.service_name.as_deref(), Some("api"));
        assert_eq!(spans[0].trace_id, TraceId([1; 16]));
    }
}
