use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;

/// The process-level attribute set shared by a contiguous group of spans.
///
/// "Resource-level attributes are stored once per resource group, never
/// duplicated into each span" (spec.md §3 invariant) — that sharing is a
/// storage-layer property, not something this struct enforces itself; the
/// invariant lives in the block writer, which emits one `Resource` row per
/// `ResourceSpans` group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub service_name: Option<String>,
    pub cluster: Option<String>,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
    pub k8s_cluster_name: Option<String>,
    pub k8s_namespace_name: Option<String>,
    pub k8s_pod_name: Option<String>,
    pub k8s_container_name: Option<String>,
    /// Long-tail attributes not promoted to a dedicated column above.
    pub attrs: Vec<(String, AttributeValue)>,
    pub dropped_attributes_count: u32,
}

impl Resource {
    /// Inserts `key -> value`, routing to the dedicated column if one
    /// exists. Enforces "if `service.name` lives in the dedicated column, it
    /// is *not* also stored in the generic columns" (spec.md §3).
    pub fn set_attr(&mut self, key: &str, value: AttributeValue) {
        let AttributeValue::String(s) = &value else {
            // Dedicated resource columns are all strings; a non-string
            // value for a dedicated key falls back to the generic group
            // rather than being silently dropped.
            self.attrs.push((key.to_string(), value));
            return;
        };
        match key {
            "service.name" => self.service_name = Some(s.clone()),
            "cluster" => self.cluster = Some(s.clone()),
            "namespace" => self.namespace = Some(s.clone()),
            "pod" => self.pod = Some(s.clone()),
            "container" => self.container = Some(s.clone()),
            "k8s.cluster.name" => self.k8s_cluster_name = Some(s.clone()),
            "k8s.namespace.name" => self.k8s_namespace_name = Some(s.clone()),
            "k8s.pod.name" => self.k8s_pod_name = Some(s.clone()),
            "k8s.container.name" => self.k8s_container_name = Some(s.clone()),
            _ => self.attrs.push((key.to_string(), value)),
        }
    }

    pub fn get_attr(&self, key: &str) -> Option<AttributeValue> {
        match key {
            "service.name" => self.service_name.clone().map(AttributeValue::String),
            "cluster" => self.cluster.clone().map(AttributeValue::String),
            "namespace" => self.namespace.clone().map(AttributeValue::String),
            "pod" => self.pod.clone().map(AttributeValue::String),
            "container" => self.container.clone().map(AttributeValue::String),
            "k8s.cluster.name" => self.k8s_cluster_name.clone().map(AttributeValue::String),
            "k8s.namespace.name" => self.k8s_namespace_name.clone().map(AttributeValue::String),
            "k8s.pod.name" => self.k8s_pod_name.clone().map(AttributeValue::String),
            "k8s.container.name" => self.k8s_container_name.clone().map(AttributeValue::String),
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

    #[test]
    fn dedicated_attr_does_not_duplicate_into_generic_group() {
        let mut r = Resource::default();
        r.set_attr("service.name", AttributeValue::String("api".into()));
        assert_eq!(r.service_name.as_deref(), Some("api"));
        assert!(r.attrs.is_empty());
        assert_eq!(
            r.get_attr("service.name"),
            Some(AttributeValue::String("api".into()))
        );
    }

    #[test]
    fn non_dedicated_attr_goes_to_generic_group() {
        let mut r = Resource::default();
        r.set_attr("region", AttributeValue::String("us-east-1".into()));
        assert_eq!(r.attrs.len(), 1);
        assert!(r.service_name.is_none());
    }
}
