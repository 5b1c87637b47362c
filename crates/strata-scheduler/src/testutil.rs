//! Shared builders for scheduler tests.

use k8s_openapi::api::core::v1::{
    Container, Node, NodeCondition, NodeStatus, Pod, PodSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

pub fn quantity_map(entries: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
        .collect()
}

pub fn node_with_allocatable(name: &str, ready: bool, allocatable: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            allocatable: if allocatable.is_empty() {
                None
            } else {
                Some(quantity_map(allocatable))
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn test_pod(
    name: &str,
    namespace: &str,
    queue: Option<&str>,
    requests: &[(&str, &str)],
) -> Pod {
    let annotations = queue.map(|q| {
        let mut map = BTreeMap::new();
        map.insert(strata_core::QUEUE_ANNOTATION.to_string(), q.to_string());
        map
    });

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations,
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                resources: Some(ResourceRequirements {
                    requests: if requests.is_empty() {
                        None
                    } else {
                        Some(quantity_map(requests))
                    },
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}
