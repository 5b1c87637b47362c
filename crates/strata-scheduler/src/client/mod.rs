pub mod http;
pub mod mock;

pub use http::HttpClusterClient;
pub use mock::MockClusterClient;

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use strata_core::{PodRef, QueueStatus, QueueWatchEvent};
use tokio::sync::mpsc;

/// The narrow capability set the scheduler needs from the cluster API.
///
/// Production wires [`HttpClusterClient`] against a real API server; tests
/// wire [`MockClusterClient`]. This is the only seam where the scheduler is
/// polymorphic over its environment.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List pods owned by this scheduler that have no node assigned yet.
    async fn list_unscheduled_pods(&self) -> Result<Vec<Pod>>;

    /// List all nodes known to the cluster.
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Persist the decision "pod runs on node" via the binding subresource.
    async fn bind_pod(&self, pod: &PodRef, node_name: &str) -> Result<()>;

    /// Merge-patch the status subresource of a queue definition.
    async fn patch_queue_status(&self, queue_name: &str, status: &QueueStatus) -> Result<()>;

    /// Open a watch on the queue-definition collection. The returned channel
    /// closes when the underlying watch ends; callers resubscribe.
    async fn watch_queue_definitions(&self) -> Result<mpsc::Receiver<QueueWatchEvent>>;
}
