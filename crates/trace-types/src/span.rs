use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::dedicated;
use crate::ids::{SpanId, TraceId};

/// OTLP-compatible span kind. Integer values match OTLP's own enumeration so
/// ingested batches map onto this type without translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum SpanKind {
    #[default]
    Unset = 0,
    Internal = 1,
    Server = 2,
    Client = 3,
    Producer = 4,
    Consumer = 5,
}

/// OTLP-compatible status code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum StatusCode {
    #[default]
    Unset = 0,
    Ok = 1,
    Error = 2,
}

/// A timestamped event within a span (a log line, effectively).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub time_unix_nano: u64,
    pub attrs: Vec<(String, AttributeValue)>,
    pub dropped_attributes_count: u32,
}

/// A link from this span to another trace/span.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub trace_state: String,
    pub attrs: Vec<(String, AttributeValue)>,
    pub dropped_attributes_count: u32,
}

/// A single timed operation within a trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Span {
    pub span_id: SpanId,
    /// All-zero means this span is a root.
    pub parent_span_id: SpanId,
    pub name: String,
    pub kind: SpanKind,
    pub status: StatusCode,
    pub status_message: String,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub trace_state: String,

    pub http_method: Option<String>,
    pub http_url: Option<String>,
    pub http_status_code: Option<i64>,

    /// Long-tail attributes not promoted to a dedicated column.
    pub attrs: Vec<(String, AttributeValue)>,

    pub events: Vec<Event>,
    pub links: Vec<Link>,

    pub dropped_attributes_count: u32,
    pub dropped_events_count: u32,
    pub dropped_links_count: u32,
}

impl Span {
    /// Duration in nanoseconds, derived from start/end — "duration (derived)"
    /// per spec.md §3.
    pub fn duration_nanos(&self) -> u64 {
        self.end_time_unix_nano
            .saturating_sub(self.start_time_unix_nano)
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_root()
    }

    /// Inserts `key -> value`, routing HTTP attributes to their dedicated
    /// columns and everything else to the generic group.
    pub fn set_attr(&mut self, key: &str, value: AttributeValue) {
        if !dedicated::is_dedicated_span_attr(key) {
            self.attrs.push((key.to_string(), value));
            return;
        }
        match (key, &value) {
            ("http.method", AttributeValue::String(s)) => self.http_method = Some(s.clone()),
            ("http.url", AttributeValue::String(s)) => self.http_url = Some(s.clone()),
            ("http.status_code", AttributeValue::Int(i)) => self.http_status_code = Some(*i),
            _ => self.attrs.push((key.to_string(), value)),
        }
    }

    pub fn get_attr(&self, key: &str) -> Option<AttributeValue> {
        match key {
            "http.method" => self.http_method.clone().map(AttributeValue::String),
            "http.url" => self.http_url.clone().map(AttributeValue::String),
            "http.status_code" => self.http_status_code.map(AttributeValue::Int),
            _ => self
                .attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_span() -> Span {
        Span {
            span_id: SpanId([1; 8]),
            parent_span_id: SpanId::ZERO,
            name: "/hi".into(),
            kind: SpanKind::Server,
            status: StatusCode::Ok,
            status_message: String::new(),
            start_time_unix_nano: 1_000_000_000,
            end_time_unix_nano: 1_050_000_000,
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
    fn duration_is_derived() {
        let span = base_span();
        assert_eq!(span.duration_nanos(), 50_000_000);
        assert!(span.is_root());
    }

    #[test]
    fn http_status_code_is_dedicated() {
        let mut span = base_span();
        span.set_attr("http.status_code", AttributeValue::Int(200));
        assert_eq!(span.http_status_code, Some(200));
        assert!(span.attrs.is_empty());
    }
}
