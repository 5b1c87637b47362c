use crate::client::ClusterClient;
use crate::error::Result;
use strata_core::ResourceList;

/// Total allocatable resources across every node in the cluster.
///
/// Computed fresh for each admission decision; nothing is cached, so a node
/// joining or leaving shows up on the next poll. Nodes without an
/// allocatable map contribute nothing.
pub async fn cluster_total_resources(client: &dyn ClusterClient) -> Result<ResourceList> {
    let nodes = client.list_nodes().await?;

    let mut total = ResourceList::new();
    for node in &nodes {
        if let Some(allocatable) = node.status.as_ref().and_then(|s| s.allocatable.as_ref()) {
            total.add(&ResourceList::from_quantity_map(allocatable));
        }
    }
    Ok(total)
}
