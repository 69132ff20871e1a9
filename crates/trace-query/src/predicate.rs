use trace_types::{AttributeValue, Resource, Span, StatusCode};

/// One comparison: `field op value`. `field` is a dotted path resolved
/// against either the resource or the span (spec.md §4.5's "dedicated
/// column" and "long-tail attribute" fields are both addressable this way).
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

/// A parsed search expression: ungrouped predicates may each be satisfied by
/// a different span in the trace; a brace group's predicates must all be
/// satisfied by the *same* span (spec.md §4.5 "brace-group scoping").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub trace_scope: Vec<Predicate>,
    pub span_groups: Vec<Vec<Predicate>>,
}

impl Query {
    /// An empty query matches every trace — used when `q` is absent from a
    /// search request.
    pub fn is_empty(&self) -> bool {
        self.trace_scope.is_empty() && self.span_groups.is_empty()
    }

    /// Whether any (resource, span) pair in `trace`'s spans satisfies `self`.
    pub fn matches(&self, trace: &trace_types::Trace) -> bool {
        let pairs: Vec<(&Resource, &Span)> = trace.iter_spans().collect();

        for predicate in &self.trace_scope {
            if !pairs.iter().any(|(resource, span)| eval(predicate, resource, span)) {
                return false;
            }
        }

        for group in &self.span_groups {
            let satisfied = pairs
                .iter()
                .any(|(resource, span)| group.iter().all(|p| eval(p, resource, span)));
            if !satisfied {
                return false;
            }
        }

        true
    }
}

fn eval(predicate: &Predicate, resource: &Resource, span: &Span) -> bool {
    let Some(actual) = resolve(&predicate.field, resource, span) else {
        return false;
    };
    compare(&actual, predicate.op, &predicate.value)
}

fn resolve(field: &str, resource: &Resource, span: &Span) -> Option<AttributeValue> {
    if let Some(key) = field.strip_prefix("resource.") {
        return resource.get_attr(key);
    }
    if let Some(key) = field.strip_prefix("span.") {
        return span.get_attr(key);
    }
    match field {
        "status" => Some(AttributeValue::String(status_name(span.status).to_string())),
        "name" => Some(AttributeValue::String(span.name.clone())),
        "duration" => Some(AttributeValue::Int(span.duration_nanos() as i64)),
        _ => span.get_attr(field).or_else(|| resource.get_attr(field)),
    }
}

fn status_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::Unset => "unset",
        StatusCode::Ok => "ok",
        StatusCode::Error => "error",
    }
}

fn compare(actual: &AttributeValue, op: Op, target: &Value) -> bool {
    match (actual, target) {
        (AttributeValue::String(s), Value::Str(t)) => match op {
            Op::Eq => s == t,
            Op::Ne => s != t,
            _ => false,
        },
        (AttributeValue::Int(i), Value::Int(t)) => numeric_cmp(*i as f64, op, *t as f64),
        (AttributeValue::Int(i), Value::Float(t)) => numeric_cmp(*i as f64, op, *t),
        (AttributeValue::Double(d), Value::Float(t)) => numeric_cmp(*d, op, *t),
        (AttributeValue::Double(d), Value::Int(t)) => numeric_cmp(*d, op, *t as f64),
        (AttributeValue::Bool(b), Value::Str(t)) => match op {
            Op::Eq => &b.to_string() == t,
            Op::Ne => &b.to_string() != t,
            _ => false,
        },
        _ => false,
    }
}

fn numeric_cmp(actual: f64, op: Op, target: f64) -> bool {
    match op {
        Op::Eq => actual == target,
        Op::Ne => actual != target,
        Op::Gt => actual > target,
        Op::Lt => actual < target,
        Op::Gte => actual >= target,
        Op::Lte => actual <= target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_types::{Resource, ResourceSpans, ScopeSpans, Span, SpanId, SpanKind, Trace, TraceId};

    fn span(status: StatusCode, http_status: Option<i64>) -> Span {
        Span {
            span_id: SpanId([1; 8]),
            parent_span_id: SpanId::ZERO,
            name: "/checkout".into(),
            kind: SpanKind::Server,
            status,
            status_message: String::new(),
            start_time_unix_nano: 0,
            end_time_unix_nano: 5_000_000,
            trace_state: String::new(),
            http_method: Some("GET".into()),
            http_url: None,
            http_status_code: http_status,
            attrs: Vec::new(),
            events: Vec::new(),
            links: Vec::new(),
            dropped_attributes_count: 0,
            dropped_events_count: 0,
            dropped_links_count: 0,
        }
    }

    fn trace(service: &str, status: StatusCode, http_status: Option<i64>) -> Trace {
        let mut t = Trace::new(TraceId([1; 16]));
        t.resource_spans.push(ResourceSpans {
            resource: Resource { service_name: Some(service.into()), ..Default::default() },
            scope_spans: vec![ScopeSpans { scope: Default::default(), spans: vec![span(status, http_status)] }],
        });
        t.recompute_derived_fields();
        t
    }

    #[test]
    fn resource_and_status_predicates_combine_as_and() {
        let query = Query {
            trace_scope: vec![
                Predicate { field: "resource.service.name".into(), op: Op::Eq, value: Value::Str("api".into()) },
                Predicate { field: "status".into(), op: Op::Eq, value: Value::Str("error".into()) },
            ],
            span_groups: vec![],
        };
        assert!(query.matches(&trace("api", StatusCode::Error, None)));
        assert!(!query.matches(&trace("api", StatusCode::Ok, None)));
        assert!(!query.matches(&trace("other", StatusCode::Error, None)));
    }

    #[test]
    fn brace_group_requires_same_span() {
        let query = Query {
            trace_scope: vec![],
            span_groups: vec![vec![
                Predicate { field: "span.http.status_code".into(), op: Op::Gte, value: Value::Int(500) },
                Predicate { field: "name".into(), op: Op::Eq, value: Value::Str("/checkout".into()) },
            ]],
        };
        assert!(query.matches(&trace("api", StatusCode::Error, Some(503))));
        assert!(!query.matches(&trace("api", StatusCode::Error, Some(200))));
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(Query::default().matches(&trace("api", StatusCode::Ok, None)));
    }
}
