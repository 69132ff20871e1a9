use arrow::array::{
    Array, BinaryArray, BooleanArray, Float64Array, Int32Array, Int64Array, ListArray,
    RecordBatch, StringArray, StructArray, UInt32Array, UInt64Array,
};
use trace_types::{
    AttributeValue, Event, InstrumentationScope, Link, Resource, ResourceSpans, ScopeSpans, Span,
    SpanId, SpanKind, StatusCode, Trace, TraceId,
};

use crate::error::BlockError;

/// The trace-level scalar columns alone, decoded without ever touching
/// `ResourceSpans` — what a predicate-free `Search` needs to answer
/// (spec.md §4.5 step 2).
#[derive(Clone, Debug, PartialEq)]
pub struct TraceScalarRow {
    pub trace_id: TraceId,
    pub start_time_unix_nano: u64,
    pub duration_nanos: u64,
    pub root_service_name: String,
    pub root_span_name: String,
}

/// Decodes a batch read with the [`crate::schema::METADATA_ONLY_COLUMNS`]
/// projection applied. The projected batch keeps the original column order
/// minus the skipped leaves, so the five surviving columns land at indices
/// `0..=4` in this order: `TraceID, StartTimeUnixNano, DurationNanos,
/// RootServiceName, RootSpanName`.
pub fn decode_trace_scalars(batch: &RecordBatch) -> Result<Vec<TraceScalarRow>, BlockError> {
    let trace_id_col = binary_col(batch.column(0));
    let start_col = u64_col(batch.column(1));
    let duration_col = u64_col(batch.column(2));
    let root_service_col = string_col(batch.column(3));
    let root_span_col = string_col(batch.column(4));

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let trace_id = TraceId::from_bytes(trace_id_col.value(row))
            .map_err(|e| BlockError::BadBlock { block_id: "unknown".into(), reason: e.to_string() })?;
        rows.push(TraceScalarRow {
            trace_id,
            start_time_unix_nano: start_col.value(row),
            duration_nanos: duration_col.value(row),
            root_service_name: root_service_col.value(row).to_string(),
            root_span_name: root_span_col.value(row).to_string(),
        });
    }
    Ok(rows)
}

/// Inverse of [`crate::encode::encode_traces`]: reconstructs one `Trace` per
/// row of a block's `data.parquet` batch. Used by the compactor's k-way merge
/// and by query workers reading back matched rows.
pub fn decode_traces(batch: &RecordBatch) -> Result<Vec<Trace>, BlockError> {
    let trace_id_col = binary_col(batch.column(0));
    let start_col = u64_col(batch.column(2));
    let end_col = u64_col(batch.column(3));
    let duration_col = u64_col(batch.column(4));
    let root_service_col = string_col(batch.column(5));
    let root_span_col = string_col(batch.column(6));
    let resource_spans_col = list_col(batch.column(7));

    let mut traces = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let trace_id = TraceId::from_bytes(trace_id_col.value(row))
            .map_err(|e| BlockError::BadBlock { block_id: "unknown".into(), reason: e.to_string() })?;

        let rs_array = resource_spans_col.value(row);
        let rs_struct = struct_array(&rs_array);
        let mut resource_spans = Vec::with_capacity(rs_struct.len());
        for i in 0..rs_struct.len() {
            resource_spans.push(decode_resource_spans(rs_struct, i));
        }

        traces.push(Trace {
            trace_id,
            resource_spans,
            start_time_unix_nano: start_col.value(row),
            end_time_unix_nano: end_col.value(row),
            duration_nanos: duration_col.value(row),
            root_service_name: root_service_col.value(row).to_string(),
            root_span_name: root_span_col.value(row).to_string(),
        });
    }
    Ok(traces)
}

fn decode_resource_spans(parent: &StructArray, row: usize) -> ResourceSpans {
    let resource_struct = struct_array(parent.column(0));
    let scope_spans_col = list_col(parent.column(1));

    let resource = decode_resource(resource_struct, row);
    let ss_array = scope_spans_col.value(row);
    let ss_struct = struct_array(&ss_array);
    let scope_spans = (0..ss_struct.len())
        .map(|i| decode_scope_spans(ss_struct, i))
        .collect();

    ResourceSpans { resource, scope_spans }
}

fn decode_resource(s: &StructArray, row: usize) -> Resource {
    Resource {
        service_name: opt_str(s.column(0), row),
        cluster: opt_str(s.column(1), row),
        namespace: opt_str(s.column(2), row),
        pod: opt_str(s.column(3), row),
        container: opt_str(s.column(4), row),
        k8s_cluster_name: opt_str(s.column(5), row),
        k8s_namespace_name: opt_str(s.column(6), row),
        k8s_pod_name: opt_str(s.column(7), row),
        k8s_container_name: opt_str(s.column(8), row),
        attrs: decode_attrs(list_col(s.column(9)), row),
        dropped_attributes_count: u32_col(s.column(10)).value(row),
    }
}

fn decode_scope_spans(parent: &StructArray, row: usize) -> ScopeSpans {
    let scope_struct = struct_array(parent.column(0));
    let spans_col = list_col(parent.column(1));

    let scope = decode_scope(scope_struct, row);
    let span_array = spans_col.value(row);
    let span_struct = struct_array(&span_array);
    let spans = (0..span_struct.len()).map(|i| decode_span(span_struct, i)).collect();

    ScopeSpans { scope, spans }
}

fn decode_scope(s: &StructArray, row: usize) -> InstrumentationScope {
    InstrumentationScope {
        name: opt_str(s.column(0), row).unwrap_or_default(),
        version: opt_str(s.column(1), row).unwrap_or_default(),
        attrs: decode_attrs(list_col(s.column(2)), row),
        dropped_attributes_count: u32_col(s.column(3)).value(row),
    }
}

fn decode_span(s: &StructArray, row: usize) -> Span {
    let span_id = SpanId::from_bytes(binary_col(s.column(0)).value(row)).unwrap_or(SpanId::ZERO);
    let parent_span_id = SpanId::from_bytes(binary_col(s.column(1)).value(row)).unwrap_or(SpanId::ZERO);
    let kind = span_kind_from_i32(i32_col(s.column(3)).value(row));
    let status = status_code_from_i32(i32_col(s.column(4)).value(row));
    let http_status_code = {
        let col = i64_col(s.column(11));
        if col.is_null(row) {
            None
        } else {
            Some(col.value(row))
        }
    };

    Span {
        span_id,
        parent_span_id,
        name: string_col(s.column(2)).value(row).to_string(),
        kind,
        status,
        status_message: string_col(s.column(5)).value(row).to_string(),
        start_time_unix_nano: u64_col(s.column(6)).value(row),
        end_time_unix_nano: u64_col(s.column(7)).value(row),
        trace_state: string_col(s.column(8)).value(row).to_string(),
        http_method: opt_str(s.column(9), row),
        http_url: opt_str(s.column(10), row),
        http_status_code,
        attrs: decode_attrs(list_col(s.column(12)), row),
        events: {
            let arr = list_col(s.column(13)).value(row);
            let events_struct = struct_array(&arr);
            (0..events_struct.len()).map(|i| decode_event(events_struct, i)).collect()
        },
        links: {
            let arr = list_col(s.column(14)).value(row);
            let links_struct = struct_array(&arr);
            (0..links_struct.len()).map(|i| decode_link(links_struct, i)).collect()
        },
        dropped_attributes_count: u32_col(s.column(15)).value(row),
        dropped_events_count: u32_col(s.column(16)).value(row),
        dropped_links_count: u32_col(s.column(17)).value(row),
    }
}

fn decode_event(s: &StructArray, row: usize) -> Event {
    Event {
        name: string_col(s.column(0)).value(row).to_string(),
        time_unix_nano: u64_col(s.column(1)).value(row),
        attrs: decode_attrs(list_col(s.column(2)), row),
        dropped_attributes_count: u32_col(s.column(3)).value(row),
    }
}

fn decode_link(s: &StructArray, row: usize) -> Link {
    let trace_id_col = binary_col(s.column(0));
    let span_id_col = binary_col(s.column(1));
    Link {
        trace_id: if trace_id_col.is_null(row) {
            None
        } else {
            TraceId::from_bytes(trace_id_col.value(row)).ok()
        },
        span_id: if span_id_col.is_null(row) {
            None
        } else {
            SpanId::from_bytes(span_id_col.value(row)).ok()
        },
        trace_state: string_col(s.column(2)).value(row).to_string(),
        attrs: decode_attrs(list_col(s.column(3)), row),
        dropped_attributes_count: u32_col(s.column(4)).value(row),
    }
}

fn decode_attrs(list: &ListArray, row: usize) -> Vec<(String, AttributeValue)> {
    let arr = list.value(row);
    let s = struct_array(&arr);
    let key_col = string_col(s.column(0));
    let kind_col = i32_col(s.column(1));
    let str_col = string_col(s.column(2));
    let int_col = i64_col(s.column(3));
    let double_col = f64_col(s.column(4));
    let bool_col = bool_col(s.column(5));
    let array_col = binary_col(s.column(6));
    let kvlist_col = binary_col(s.column(7));

    (0..s.len())
        .map(|i| {
            let key = key_col.value(i).to_string();
            let value = match kind_col.value(i) {
                0 => AttributeValue::String(str_col.value(i).to_string()),
                1 => AttributeValue::Int(int_col.value(i)),
                2 => AttributeValue::Double(double_col.value(i)),
                3 => AttributeValue::Bool(bool_col.value(i)),
                4 => serde_json::from_slice(array_col.value(i)).unwrap_or(AttributeValue::Array(Vec::new())),
                _ => serde_json::from_slice(kvlist_col.value(i)).unwrap_or(AttributeValue::KeyValueList(Vec::new())),
            };
            (key, value)
        })
        .collect()
}

fn span_kind_from_i32(v: i32) -> SpanKind {
    match v {
        1 => SpanKind::Internal,
        2 => SpanKind::Server,
        3 => SpanKind::Client,
        4 => SpanKind::Producer,
        5 => SpanKind::Consumer,
        _ => SpanKind::Unset,
    }
}

fn status_code_from_i32(v: i32) -> StatusCode {
    match v {
        1 => StatusCode::Ok,
        2 => StatusCode::Error,
        _ => StatusCode::Unset,
    }
}

fn opt_str(col: &arrow::array::ArrayRef, row: usize) -> Option<String> {
    let col = string_col(col);
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row).to_string())
    }
}

fn binary_col(col: &arrow::array::ArrayRef) -> &BinaryArray {
    col.as_any().downcast_ref::<BinaryArray>().expect("Binary column")
}

fn string_col(col: &arrow::array::ArrayRef) -> &StringArray {
    col.as_any().downcast_ref::<StringArray>().expect("Utf8 column")
}

fn u64_col(col: &arrow::array::ArrayRef) -> &UInt64Array {
    col.as_any().downcast_ref::<UInt64Array>().expect("UInt64 column")
}

fn u32_col(col: &arrow::array::ArrayRef) -> &UInt32Array {
    col.as_any().downcast_ref::<UInt32Array>().expect("UInt32 column")
}

fn i32_col(col: &arrow::array::ArrayRef) -> &Int32Array {
    col.as_any().downcast_ref::<Int32Array>().expect("Int32 column")
}

fn i64_col(col: &arrow::array::ArrayRef) -> &Int64Array {
    col.as_any().downcast_ref::<Int64Array>().expect("Int64 column")
}

fn f64_col(col: &arrow::array::ArrayRef) -> &Float64Array {
    col.as_any().downcast_ref::<Float64Array>().expect("Float64 column")
}

fn bool_col(col: &arrow::array::ArrayRef) -> &BooleanArray {
    col.as_any().downcast_ref::<BooleanArray>().expect("Boolean column")
}

fn list_col(col: &arrow::array::ArrayRef) -> &ListArray {
    col.as_any().downcast_ref::<ListArray>().expect("List column")
}

fn struct_array(col: &arrow::array::ArrayRef) -> &StructArray {
    col.as_any().downcast_ref::<StructArray>().expect("Struct column")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_traces;
    use crate::schema::block_schema;

    fn attr_bearing_trace() -> Trace {
        let span = Span {
            span_id: SpanId([1; 8]),
            parent_span_id: SpanId::ZERO,
            name: "/checkout".into(),
            kind: SpanKind::Server,
            status: StatusCode::Error,
            status_message: "boom".into(),
            start_time_unix_nano: 10_000,
            end_time_unix_nano: 25_000,
            trace_state: "vendor=1".into(),
            http_method: Some("POST".into()),
            http_url: Some("/checkout".into()),
            http_status_code: Some(500),
            attrs: vec![
                ("retry".to_string(), AttributeValue::Bool(true)),
                ("attempt".to_string(), AttributeValue::Int(3)),
                ("latency_ms".to_string(), AttributeValue::Double(12.5)),
                (
                    "tags".to_string(),
                    AttributeValue::Array(vec![AttributeValue::String("a".into())]),
                ),
                (
                    "meta".to_string(),
                    AttributeValue::KeyValueList(vec![("k".into(), AttributeValue::Int(1))]),
                ),
            ],
            events: vec![Event {
                name: "retrying".into(),
                time_unix_nano: 12_000,
                attrs: vec![("n".to_string(), AttributeValue::Int(1))],
                dropped_attributes_count: 0,
            }],
            links: vec![
                Link {
                    trace_id: Some(TraceId([9; 16])),
                    span_id: Some(SpanId([9; 8])),
                    trace_state: String::new(),
                    attrs: Vec::new(),
                    dropped_attributes_count: 0,
                },
                Link::default(),
            ],
            dropped_attributes_count: 1,
            dropped_events_count: 0,
            dropped_links_count: 0,
        };

        let mut trace = Trace::new(TraceId([7; 16]));
        trace.resource_spans.push(ResourceSpans {
            resource: Resource {
                service_name: Some("checkout".into()),
                attrs: vec![("region".to_string(), AttributeValue::String("us-east-1".into()))],
                ..Default::default()
            },
            scope_spans: vec![ScopeSpans {
                scope: InstrumentationScope {
                    name: "otel-sdk".into(),
                    version: "1.2.3".into(),
                    ..Default::default()
                },
                spans: vec![span],
            }],
        });
        trace.recompute_derived_fields();
        trace
    }

    #[test]
    fn round_trips_a_trace_with_every_attribute_kind_and_an_unset_link() {
        let schema = block_schema();
        let original = attr_bearing_trace();
        let batch = encode_traces(schema, std::slice::from_ref(&original)).unwrap();
        let decoded = decode_traces(&batch).unwrap();

        assert_eq!(decoded.len(), 1);
        let back = &decoded[0];
        assert_eq!(back.trace_id, original.trace_id);
        assert_eq!(back.root_service_name, "checkout");
        assert_eq!(back.resource_spans[0].resource.attrs, original.resource_spans[0].resource.attrs);

        let span = &back.resource_spans[0].scope_spans[0].spans[0];
        let orig_span = &original.resource_spans[0].scope_spans[0].spans[0];
        assert_eq!(span.attrs, orig_span.attrs);
        assert_eq!(span.links[0].trace_id, orig_span.links[0].trace_id);
        assert_eq!(span.links[1].trace_id, None);
        assert_eq!(span.events[0].name, "retrying");
        assert_eq!(span.http_status_code, Some(500));
    }
}
