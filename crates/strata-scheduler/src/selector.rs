use crate::error::{Result, SchedulerError};
use k8s_openapi::api::core::v1::Node;
use strata_core::ResourceList;
use tracing::debug;

/// True when the node carries a `Ready` condition with status `"True"`.
pub fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// The node's allocatable resources in milli-units.
pub fn node_allocatable(node: &Node) -> ResourceList {
    node.status
        .as_ref()
        .and_then(|s| s.allocatable.as_ref())
        .map(ResourceList::from_quantity_map)
        .unwrap_or_default()
}

/// True when every requested resource the node advertises is covered by its
/// allocatable. Resources the node does not advertise are not checked.
fn fits(allocatable: &ResourceList, requests: &ResourceList) -> bool {
    requests
        .iter()
        .all(|(resource, requested)| allocatable.get(resource).is_none_or(|a| requested <= a))
}

/// Pick a node for a pod: the first node in list order that is Ready and
/// whose allocatable covers the pod's requests.
///
/// With empty requests this is exactly "first Ready node". Anything smarter
/// (spreading, scoring, committed-resource tracking) plugs in here.
pub fn select_node(nodes: &[Node], requests: &ResourceList) -> Result<String> {
    if nodes.is_empty() {
        return Err(SchedulerError::NoNodesAvailable);
    }

    let mut saw_ready = false;
    for node in nodes {
        let name = node.metadata.name.as_deref().unwrap_or("");
        debug!("Checking node: {}", name);

        if !is_ready(node) {
            continue;
        }
        saw_ready = true;

        if fits(&node_allocatable(node), requests) {
            return Ok(name.to_string());
        }
    }

    if saw_ready {
        Err(SchedulerError::no_ready_nodes(
            "no ready node has enough allocatable resources",
        ))
    } else {
        Err(SchedulerError::no_ready_nodes("no node is Ready"))
    }
}
