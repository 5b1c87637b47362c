use super::ClusterClient;
use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use std::sync::Arc;
use strata_core::{PodRef, QueueStatus, QueueWatchEvent};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// A recorded binding: namespace, pod name, node name.
pub type RecordedBinding = (String, String, String);

#[derive(Default)]
struct MockState {
    pods: Vec<Pod>,
    nodes: Vec<Node>,
    bindings: Vec<RecordedBinding>,
    status_patches: Vec<(String, QueueStatus)>,
    pod_list_error: Option<String>,
    node_list_error: Option<String>,
    bind_error: Option<String>,
    watch_rx: Option<mpsc::Receiver<QueueWatchEvent>>,
}

/// In-memory cluster client for tests.
///
/// Holds scriptable pod and node lists, records bindings and status patches,
/// and hands out a pre-seeded watch channel. Failures are injected per
/// operation.
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<RwLock<MockState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_pods(&self, pods: Vec<Pod>) {
        self.state.write().await.pods = pods;
    }

    pub async fn set_nodes(&self, nodes: Vec<Node>) {
        self.state.write().await.nodes = nodes;
    }

    pub async fn set_pod_list_error(&self, message: impl Into<String>) {
        self.state.write().await.pod_list_error = Some(message.into());
    }

    pub async fn set_node_list_error(&self, message: impl Into<String>) {
        self.state.write().await.node_list_error = Some(message.into());
    }

    pub async fn set_bind_error(&self, message: impl Into<String>) {
        self.state.write().await.bind_error = Some(message.into());
    }

    pub async fn clear_bind_error(&self) {
        self.state.write().await.bind_error = None;
    }

    /// Install the receiving half handed out by the next
    /// `watch_queue_definitions` call; the test keeps the sender.
    pub async fn set_watch(&self, rx: mpsc::Receiver<QueueWatchEvent>) {
        self.state.write().await.watch_rx = Some(rx);
    }

    pub async fn bindings(&self) -> Vec<RecordedBinding> {
        self.state.read().await.bindings.clone()
    }

    pub async fn status_patches(&self) -> Vec<(String, QueueStatus)> {
        self.state.read().await.status_patches.clone()
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn list_unscheduled_pods(&self) -> Result<Vec<Pod>> {
        let state = self.state.read().await;
        if let Some(message) = &state.pod_list_error {
            return Err(SchedulerError::upstream_unavailable("pod list", message));
        }
        Ok(state.pods.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        if let Some(message) = &state.node_list_error {
            return Err(SchedulerError::upstream_unavailable("node list", message));
        }
        Ok(state.nodes.clone())
    }

    async fn bind_pod(&self, pod: &PodRef, node_name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(message) = &state.bind_error {
            return Err(SchedulerError::bind_failed(
                format!("{}/{}", pod.namespace, pod.name),
                node_name,
                message.clone(),
            ));
        }
        debug!("Mock: bound {}/{} to {}", pod.namespace, pod.name, node_name);
        state.bindings.push((
            pod.namespace.clone(),
            pod.name.clone(),
            node_name.to_string(),
        ));
        Ok(())
    }

    async fn patch_queue_status(&self, queue_name: &str, status: &QueueStatus) -> Result<()> {
        self.state
            .write()
            .await
            .status_patches
            .push((queue_name.to_string(), status.clone()));
        Ok(())
    }

    async fn watch_queue_definitions(&self) -> Result<mpsc::Receiver<QueueWatchEvent>> {
        let mut state = self.state.write().await;
        match state.watch_rx.take() {
            Some(rx) => Ok(rx),
            None => {
                // No scripted watch: hand back a channel that closes at once.
                let (_tx, rx) = mpsc::channel(1);
                Ok(rx)
            }
        }
    }
}
