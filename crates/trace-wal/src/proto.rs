//! Generated protobuf types plus the conversions to/from `trace-types`.
//!
//! Mirrors the `RustType`-conversion pattern in the teacher's
//! `mz-persist-types::arrow` (`into_proto`/`from_proto` pairs kept next to
//! the generated message), minus the generic trait machinery — one push
//! message type doesn't need it.

#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/trace_wal.rs"));

use trace_types::{
    AttributeValue, Event as TEvent, InstrumentationScope as TScope, Link as TLink,
    Resource as TResource, ResourceSpans as TResourceSpans, ScopeSpans as TScopeSpans,
    Span as TSpan, SpanId, SpanKind, StatusCode, TraceId, TypesError,
};

impl From<&AttributeValue> for AnyValue {
    fn from(v: &AttributeValue) -> Self {
        use any_value::Value;
        let value = match v {
            AttributeValue::String(s) => Value::StringValue(s.clone()),
            AttributeValue::Int(i) => Value::IntValue(*i),
            AttributeValue::Double(d) => Value::DoubleValue(*d),
            AttributeValue::Bool(b) => Value::BoolValue(*b),
            AttributeValue::Array(items) => Value::ArrayValue(ArrayValue {
                values: items.iter().map(AnyValue::from).collect(),
            }),
            AttributeValue::KeyValueList(kvs) => Value::KvlistValue(KeyValueList {
                values: kvs
                    .iter()
                    .map(|(k, v)| KeyValue {
                        key: k.clone(),
                        value: Some(AnyValue::from(v)),
                    })
                    .collect(),
            }),
        };
        AnyValue { value: Some(value) }
    }
}

impl TryFrom<AnyValue> for AttributeValue {
    type Error = TypesError;

    fn try_from(v: AnyValue) -> Result<Self, Self::Error> {
        use any_value::Value;
        let value = v.value.ok_or(TypesError::UnknownAttributeTag(0))?;
        Ok(match value {
            Value::StringValue(s) => AttributeValue::String(s),
            Value::IntValue(i) => AttributeValue::Int(i),
            Value::DoubleValue(d) => AttributeValue::Double(d),
            Value::BoolValue(b) => AttributeValue::Bool(b),
            Value::ArrayValue(a) => AttributeValue::Array(
                a.values
                    .into_iter()
                    .map(AttributeValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::KvlistValue(kv) => AttributeValue::KeyValueList(
                kv.values
                    .into_iter()
                    .map(|KeyValue { key, value }| {
                        let value = value.ok_or(TypesError::UnknownAttributeTag(0))?;
                        Ok::<_, TypesError>((key, AttributeValue::try_from(value)?))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn attrs_to_proto(attrs: &[(String, AttributeValue)]) -> Vec<KeyValue> {
    attrs
        .iter()
        .map(|(k, v)| KeyValue {
            key: k.clone(),
            value: Some(AnyValue::from(v)),
        })
        .collect()
}

fn attrs_from_proto(attrs: Vec<KeyValue>) -> Result<Vec<(String, AttributeValue)>, TypesError> {
    attrs
        .into_iter()
        .map(|KeyValue { key, value }| {
            let value = value.ok_or(TypesError::UnknownAttributeTag(0))?;
            Ok((key, AttributeValue::try_from(value)?))
        })
        .collect()
}

impl From<&TEvent> for Event {
    fn from(e: &TEvent) -> Self {
        Event {
            name: e.name.clone(),
            time_unix_nano: e.time_unix_nano,
            attrs: attrs_to_proto(&e.attrs),
            dropped_attributes_count: e.dropped_attributes_count,
        }
    }
}

impl TryFrom<Event> for TEvent {
    type Error = TypesError;
    fn try_from(e: Event) -> Result<Self, Self::Error> {
        Ok(TEvent {
            name: e.name,
            time_unix_nano: e.time_unix_nano,
            attrs: attrs_from_proto(e.attrs)?,
            dropped_attributes_count: e.dropped_attributes_count,
        })
    }
}

impl From<&TLink> for Link {
    fn from(l: &TLink) -> Self {
        Link {
            trace_id: l.trace_id.map(|id| id.0.to_vec()).unwrap_or_default(),
            span_id: l.span_id.map(|id| id.0.to_vec()).unwrap_or_default(),
            trace_state: l.trace_state.clone(),
            attrs: attrs_to_proto(&l.attrs),
            dropped_attributes_count: l.dropped_attributes_count,
        }
    }
}

impl TryFrom<Link> for TLink {
    type Error = TypesError;
    fn try_from(l: Link) -> Result<Self, Self::Error> {
        Ok(TLink {
            trace_id: if l.trace_id.is_empty() {
                None
            } else {
                Some(TraceId::from_bytes(&l.trace_id)?)
            },
            span_id: if l.span_id.is_empty() {
                None
            } else {
                Some(SpanId::from_bytes(&l.span_id)?)
            },
            trace_state: l.trace_state,
            attrs: attrs_from_proto(l.attrs)?,
            dropped_attributes_count: l.dropped_attributes_count,
        })
    }
}

impl From<&TSpan> for Span {
    fn from(s: &TSpan) -> Self {
        let mut attrs = attrs_to_proto(&s.attrs);
        if let Some(m) = &s.http_method {
            attrs.push(KeyValue {
                key: "http.method".into(),
                value: Some(AnyValue::from(&AttributeValue::String(m.clone()))),
            });
        }
        if let Some(u) = &s.http_url {
            attrs.push(KeyValue {
                key: "http.url".into(),
                value: Some(AnyValue::from(&AttributeValue::String(u.clone()))),
            });
        }
        if let Some(c) = s.http_status_code {
            attrs.push(KeyValue {
                key: "http.status_code".into(),
                value: Some(AnyValue::from(&AttributeValue::Int(c))),
            });
        }
        Span {
            span_id: s.span_id.0.to_vec(),
            parent_span_id: s.parent_span_id.0.to_vec(),
            name: s.name.clone(),
            kind: s.kind as i32,
            status: s.status as i32,
            status_message: s.status_message.clone(),
            start_time_unix_nano: s.start_time_unix_nano,
            end_time_unix_nano: s.end_time_unix_nano,
            trace_state: s.trace_state.clone(),
            attrs,
            events: s.events.iter().map(Event::from).collect(),
            links: s.links.iter().map(Link::from).collect(),
            dropped_attributes_count: s.dropped_attributes_count,
            dropped_events_count: s.dropped_events_count,
            dropped_links_count: s.dropped_links_count,
        }
    }
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

fn status_from_i32(v: i32) -> StatusCode {
    match v {
        1 => StatusCode::Ok,
        2 => StatusCode::Error,
        _ => StatusCode::Unset,
    }
}

impl TryFrom<Span> for TSpan {
    type Error = TypesError;
    fn try_from(s: Span) -> Result<Self, Self::Error> {
        let mut span = TSpan {
            span_id: SpanId::from_bytes(&s.span_id)?,
            parent_span_id: if s.parent_span_id.is_empty() {
                SpanId::ZERO
            } else {
                SpanId::from_bytes(&s.parent_span_id)?
            },
            name: s.name,
            kind: span_kind_from_i32(s.kind),
            status: status_from_i32(s.status),
            status_message: s.status_message,
            start_time_unix_nano: s.start_time_unix_nano,
            end_time_unix_nano: s.end_time_unix_nano,
            trace_state: s.trace_state,
            http_method: None,
            http_url: None,
            http_status_code: None,
            attrs: Vec::new(),
            events: s
                .events
                .into_iter()
                .map(TEvent::try_from)
                .collect::<Result<_, _>>()?,
            links: s
                .links
                .into_iter()
                .map(TLink::try_from)
                .collect::<Result<_, _>>()?,
            dropped_attributes_count: s.dropped_attributes_count,
            dropped_events_count: s.dropped_events_count,
            dropped_links_count: s.dropped_links_count,
        };
        for kv in attrs_from_proto(s.attrs)? {
            span.set_attr(&kv.0, kv.1);
        }
        Ok(span)
    }
}

impl From<&TResource> for Resource {
    fn from(r: &TResource) -> Self {
        let mut attrs = attrs_to_proto(&r.attrs);
        for (key, value) in [
            ("service.name", &r.service_name),
            ("cluster", &r.cluster),
            ("namespace", &r.namespace),
            ("pod", &r.pod),
            ("container", &r.container),
            ("k8s.cluster.name", &r.k8s_cluster_name),
            ("k8s.namespace.name", &r.k8s_namespace_name),
            ("k8s.pod.name", &r.k8s_pod_name),
            ("k8s.container.name", &r.k8s_container_name),
        ] {
            if let Some(v) = value {
                attrs.push(KeyValue {
                    key: key.into(),
                    value: Some(AnyValue::from(&AttributeValue::String(v.clone()))),
                });
            }
        }
        Resource {
            attrs,
            dropped_attributes_count: r.dropped_attributes_count,
        }
    }
}

impl TryFrom<Resource> for TResource {
    type Error = TypesError;
    fn try_from(r: Resource) -> Result<Self, Self::Error> {
        let mut resource = TResource {
            dropped_attributes_count: r.dropped_attributes_count,
            ..Default::default()
        };
        for (key, value) in attrs_from_proto(r.attrs)? {
            resource.set_attr(&key, value);
        }
        Ok(resource)
    }
}

impl From<&TScope> for InstrumentationScope {
    fn from(s: &TScope) -> Self {
        InstrumentationScope {
            name: s.name.clone(),
            version: s.version.clone(),
            attrs: attrs_to_proto(&s.attrs),
            dropped_attributes_count: s.dropped_attributes_count,
        }
    }
}

impl TryFrom<InstrumentationScope> for TScope {
    type Error = TypesError;
    fn try_from(s: InstrumentationScope) -> Result<Self, Self::Error> {
        Ok(TScope {
            name: s.name,
            version: s.version,
            attrs: attrs_from_proto(s.attrs)?,
            dropped_attributes_count: s.dropped_attributes_count,
        })
    }
}

impl From<&TScopeSpans> for ScopeSpans {
    fn from(s: &TScopeSpans) -> Self {
        ScopeSpans {
            scope: Some(InstrumentationScope::from(&s.scope)),
            spans: s.spans.iter().map(Span::from).collect(),
        }
    }
}

impl TryFrom<ScopeSpans> for TScopeSpans {
    type Error = TypesError;
    fn try_from(s: ScopeSpans) -> Result<Self, Self::Error> {
        Ok(TScopeSpans {
            scope: s.scope.map(TScope::try_from).transpose()?.unwrap_or_default(),
            spans: s
                .spans
                .into_iter()
                .map(TSpan::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<&TResourceSpans> for ResourceSpans {
    fn from(rs: &TResourceSpans) -> Self {
        ResourceSpans {
            resource: Some(Resource::from(&rs.resource)),
            scope_spans: rs.scope_spans.iter().map(ScopeSpans::from).collect(),
        }
    }
}

impl TryFrom<ResourceSpans> for TResourceSpans {
    type Error = TypesError;
    fn try_from(rs: ResourceSpans) -> Result<Self, Self::Error> {
        Ok(TResourceSpans {
            resource: rs
                .resource
                .map(TResource::try_from)
                .transpose()?
                .unwrap_or_default(),
            scope_spans: rs
                .scope_spans
                .into_iter()
                .map(TScopeSpans::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_value_array_round_trips() {
        let v = AttributeValue::Array(vec![AttributeValue::Int(1), AttributeValue::Int(2)]);
        let proto = AnyValue::from(&v);
        let back = AttributeValue::try_from(proto).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn any_value_kvlist_round_trips() {
        let v = AttributeValue::KeyValueList(vec![("a".into(), AttributeValue::Bool(true))]);
        let proto = AnyValue::from(&v);
        let back = AttributeValue::try_from(proto).unwrap();
        assert_eq!(v, back);
    }
}
