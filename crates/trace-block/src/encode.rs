use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Float64Builder, Int32Builder, Int64Builder, ListBuilder,
    RecordBatch, StringBuilder, StructBuilder, UInt32Builder, UInt64Builder,
};
use arrow::datatypes::{DataType, Fields, SchemaRef};
use trace_types::{AttributeKind, AttributeValue, Event, Link, Resource, ResourceSpans, ScopeSpans, Span, Trace};

use crate::error::BlockError;

fn struct_fields(data_type: &DataType) -> Fields {
    match data_type {
        DataType::Struct(fields) => fields.clone(),
        other => unreachable!("expected struct field, got {other:?}"),
    }
}

fn list_item_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::List(item) => item.data_type().clone(),
        other => unreachable!("expected list field, got {other:?}"),
    }
}

/// Encodes a batch of sealed traces into one Arrow `RecordBatch` matching
/// [`crate::schema::block_schema`] — one row per trace (spec.md §4.3: "A
/// row-group holds up to R traces").
pub fn encode_traces(schema: SchemaRef, traces: &[Trace]) -> Result<RecordBatch, BlockError> {
    let mut trace_id = BinaryBuilder::new();
    let mut trace_id_text = StringBuilder::new();
    let mut start = UInt64Builder::new();
    let mut end = UInt64Builder::new();
    let mut duration = UInt64Builder::new();
    let mut root_service = StringBuilder::new();
    let mut root_span = StringBuilder::new();

    let resource_spans_field = schema.field_with_name("ResourceSpans")?;
    let resource_spans_item = list_item_type(resource_spans_field.data_type());
    let mut resource_spans_builder = ListBuilder::new(StructBuilder::from_fields(
        struct_fields(&resource_spans_item),
        traces.len(),
    ));

    for trace in traces {
        trace_id.append_value(trace.trace_id.0);
        trace_id_text.append_value(hex::encode(trace.trace_id.0));
        start.append_value(trace.start_time_unix_nano);
        end.append_value(trace.end_time_unix_nano);
        duration.append_value(trace.duration_nanos);
        root_service.append_value(&trace.root_service_name);
        root_span.append_value(&trace.root_span_name);

        for rs in &trace.resource_spans {
            append_resource_spans(resource_spans_builder.values(), rs);
        }
        resource_spans_builder.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(trace_id.finish()),
        Arc::new(trace_id_text.finish()),
        Arc::new(start.finish()),
        Arc::new(end.finish()),
        Arc::new(duration.finish()),
        Arc::new(root_service.finish()),
        Arc::new(root_span.finish()),
        Arc::new(resource_spans_builder.finish()),
    ];

    RecordBatch::try_new(schema, columns).map_err(BlockError::from)
}

fn append_resource_spans(b: &mut StructBuilder, rs: &ResourceSpans) {
    append_resource(b.field_builder::<StructBuilder>(0).expect("Resource"), &rs.resource);
    let scope_spans_builder = b
        .field_builder::<ListBuilder<StructBuilder>>(1)
        .expect("ScopeSpans");
    for ss in &rs.scope_spans {
        append_scope_spans(scope_spans_builder.values(), ss);
    }
    scope_spans_builder.append(true);
    b.append(true);
}

fn append_resource(b: &mut StructBuilder, resource: &Resource) {
    append_opt_str(b, 0, resource.service_name.as_deref());
    append_opt_str(b, 1, resource.cluster.as_deref());
    append_opt_str(b, 2, resource.namespace.as_deref());
    append_opt_str(b, 3, resource.pod.as_deref());
    append_opt_str(b, 4, resource.container.as_deref());
    append_opt_str(b, 5, resource.k8s_cluster_name.as_deref());
    append_opt_str(b, 6, resource.k8s_namespace_name.as_deref());
    append_opt_str(b, 7, resource.k8s_pod_name.as_deref());
    append_opt_str(b, 8, resource.k8s_container_name.as_deref());
    let attrs_builder = b.field_builder::<ListBuilder<StructBuilder>>(9).expect("Attrs");
    append_attrs(attrs_builder, &resource.attrs);
    b.field_builder::<UInt32Builder>(10)
        .expect("DroppedAttributesCount")
        .append_value(resource.dropped_attributes_count);
    b.append(true);
}

fn append_scope_spans(b: &mut StructBuilder, ss: &ScopeSpans) {
    let scope_builder = b.field_builder::<StructBuilder>(0).expect("Scope");
    append_opt_str(scope_builder, 0, Some(ss.scope.name.as_str()).filter(|s| !s.is_empty()));
    append_opt_str(scope_builder, 1, Some(ss.scope.version.as_str()).filter(|s| !s.is_empty()));
    append_attrs(
        scope_builder.field_builder::<ListBuilder<StructBuilder>>(2).expect("Attrs"),
        &ss.scope.attrs,
    );
    scope_builder
        .field_builder::<UInt32Builder>(3)
        .expect("DroppedAttributesCount")
        .append_value(ss.scope.dropped_attributes_count);
    scope_builder.append(true);

    let spans_builder = b.field_builder::<ListBuilder<StructBuilder>>(1).expect("Spans");
    for span in &ss.spans {
        append_span(spans_builder.values(), span);
    }
    spans_builder.append(true);
    b.append(true);
}

fn append_span(b: &mut StructBuilder, span: &Span) {
    b.field_builder::<BinaryBuilder>(0).expect("SpanID").append_value(span.span_id.0);
    b.field_builder::<BinaryBuilder>(1)
        .expect("ParentSpanID")
        .append_value(span.parent_span_id.0);
    b.field_builder::<StringBuilder>(2).expect("Name").append_value(&span.name);
    b.field_builder::<Int32Builder>(3).expect("Kind").append_value(span.kind as i32);
    b.field_builder::<Int32Builder>(4)
        .expect("StatusCode")
        .append_value(span.status as i32);
    b.field_builder::<StringBuilder>(5)
        .expect("StatusMessage")
        .append_value(&span.status_message);
    b.field_builder::<UInt64Builder>(6)
        .expect("StartTimeUnixNano")
        .append_value(span.start_time_unix_nano);
    b.field_builder::<UInt64Builder>(7)
        .expect("EndTimeUnixNano")
        .append_value(span.end_time_unix_nano);
    b.field_builder::<StringBuilder>(8)
        .expect("TraceState")
        .append_value(&span.trace_state);
    append_opt_str(b, 9, span.http_method.as_deref());
    append_opt_str(b, 10, span.http_url.as_deref());
    match span.http_status_code {
        Some(v) => b.field_builder::<Int64Builder>(11).expect("HttpStatusCode").append_value(v),
        None => b.field_builder::<Int64Builder>(11).expect("HttpStatusCode").append_null(),
    }
    append_attrs(
        b.field_builder::<ListBuilder<StructBuilder>>(12).expect("Attrs"),
        &span.attrs,
    );
    let events_builder = b.field_builder::<ListBuilder<StructBuilder>>(13).expect("Events");
    for event in &span.events {
        append_event(events_builder.values(), event);
    }
    events_builder.append(true);
    let links_builder = b.field_builder::<ListBuilder<StructBuilder>>(14).expect("Links");
    for link in &span.links {
        append_link(links_builder.values(), link);
    }
    links_builder.append(true);
    b.field_builder::<UInt32Builder>(15)
        .expect("DroppedAttributesCount")
        .append_value(span.dropped_attributes_count);
    b.field_builder::<UInt32Builder>(16)
        .expect("DroppedEventsCount")
        .append_value(span.dropped_events_count);
    b.field_builder::<UInt32Builder>(17)
        .expect("DroppedLinksCount")
        .append_value(span.dropped_links_count);
    b.append(true);
}

fn append_event(b: &mut StructBuilder, event: &Event) {
    b.field_builder::<StringBuilder>(0).expect("Name").append_value(&event.name);
    b.field_builder::<UInt64Builder>(1)
        .expect("TimeUnixNano")
        .append_value(event.time_unix_nano);
    append_attrs(
        b.field_builder::<ListBuilder<StructBuilder>>(2).expect("Attrs"),
        &event.attrs,
    );
    b.field_builder::<UInt32Builder>(3)
        .expect("DroppedAttributesCount")
        .append_value(event.dropped_attributes_count);
    b.append(true);
}

fn append_link(b: &mut StructBuilder, link: &Link) {
    match link.trace_id {
        Some(id) => b.field_builder::<BinaryBuilder>(0).expect("TraceID").append_value(id.0),
        None => b.field_builder::<BinaryBuilder>(0).expect("TraceID").append_null(),
    }
    match link.span_id {
        Some(id) => b.field_builder::<BinaryBuilder>(1).expect("SpanID").append_value(id.0),
        None => b.field_builder::<BinaryBuilder>(1).expect("SpanID").append_null(),
    }
    b.field_builder::<StringBuilder>(2)
        .expect("TraceState")
        .append_value(&link.trace_state);
    append_attrs(
        b.field_builder::<ListBuilder<StructBuilder>>(3).expect("Attrs"),
        &link.attrs,
    );
    b.field_builder::<UInt32Builder>(4)
        .expect("DroppedAttributesCount")
        .append_value(link.dropped_attributes_count);
    b.append(true);
}

fn append_attrs(list_builder: &mut ListBuilder<StructBuilder>, attrs: &[(String, AttributeValue)]) {
    let struct_builder = list_builder.values();
    for (key, value) in attrs {
        append_attr(struct_builder, key, value);
    }
    list_builder.append(true);
}

fn append_attr(b: &mut StructBuilder, key: &str, value: &AttributeValue) {
    b.field_builder::<StringBuilder>(0).expect("Key").append_value(key);
    b.field_builder::<Int32Builder>(1).expect("Kind").append_value(value.kind() as i32);

    let int_col = matches!(value, AttributeValue::Int(_));
    let double_col = matches!(value, AttributeValue::Double(_));
    let bool_col = matches!(value, AttributeValue::Bool(_));
    let array_col = matches!(value, AttributeValue::Array(_));
    let kvlist_col = matches!(value, AttributeValue::KeyValueList(_));

    match value {
        AttributeValue::String(s) => b.field_builder::<StringBuilder>(2).expect("Value").append_value(s),
        _ => b.field_builder::<StringBuilder>(2).expect("Value").append_null(),
    }
    if int_col {
        let AttributeValue::Int(v) = value else { unreachable!() };
        b.field_builder::<Int64Builder>(3).expect("ValueInt").append_value(*v);
    } else {
        b.field_builder::<Int64Builder>(3).expect("ValueInt").append_null();
    }
    if double_col {
        let AttributeValue::Double(v) = value else { unreachable!() };
        b.field_builder::<Float64Builder>(4).expect("ValueDouble").append_value(*v);
    } else {
        b.field_builder::<Float64Builder>(4).expect("ValueDouble").append_null();
    }
    if bool_col {
        let AttributeValue::Bool(v) = value else { unreachable!() };
        b.field_builder::<BooleanBuilder>(5).expect("ValueBool").append_value(*v);
    } else {
        b.field_builder::<BooleanBuilder>(5).expect("ValueBool").append_null();
    }
    if array_col {
        let bytes = serde_json::to_vec(value).expect("attribute value is serializable");
        b.field_builder::<BinaryBuilder>(6).expect("ValueArray").append_value(bytes);
    } else {
        b.field_builder::<BinaryBuilder>(6).expect("ValueArray").append_null();
    }
    if kvlist_col {
        let bytes = serde_json::to_vec(value).expect("attribute value is serializable");
        b.field_builder::<BinaryBuilder>(7).expect("ValueKVList").append_value(bytes);
    } else {
        b.field_builder::<BinaryBuilder>(7).expect("ValueKVList").append_null();
    }
    b.append(true);
}

fn append_opt_str(b: &mut StructBuilder, idx: usize, value: Option<&str>) {
    let builder = b.field_builder::<StringBuilder>(idx).expect("string field");
    match value {
        Some(v) => builder.append_value(v),
        None => builder.append_null(),
    }
}

/// Maps `AttributeKind` to the `Kind` tag column — declared here rather than
/// on the type itself, since the numeric encoding is a block-format detail.
pub fn attribute_kind_tag(kind: AttributeKind) -> i32 {
    kind as i32
}
