use crate::client::ClusterClient;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{QueuePolicy, QueueTree, QueueWatchEvent, WatchEventType};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Configuration for the queue reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay before reopening the watch after it closes or fails to open
    pub resubscribe_backoff: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            resubscribe_backoff: Duration::from_secs(5),
        }
    }
}

/// Mirrors queue-definition objects from the cluster into the in-memory
/// queue tree. Shares the tree with the scheduling loop; the two only ever
/// communicate through it.
pub struct QueueReconciler {
    tree: Arc<RwLock<QueueTree>>,
    client: Arc<dyn ClusterClient>,
    config: ReconcilerConfig,
}

impl QueueReconciler {
    pub fn new(
        tree: Arc<RwLock<QueueTree>>,
        client: Arc<dyn ClusterClient>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            tree,
            client,
            config,
        }
    }

    /// Consume the queue-definition watch until cancelled, reopening it with
    /// a fixed backoff whenever it closes.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!("Starting queue reconciler");

        loop {
            let mut rx = match self.client.watch_queue_definitions().await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!("Failed to open queue definition watch: {}", e);
                    if self.backoff(&token).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            info!("Watching queue definitions");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Queue reconciler shutting down");
                        return Ok(());
                    }
                    event = rx.recv() => match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            warn!(
                                "Queue definition watch closed, resubscribing in {:?}",
                                self.config.resubscribe_backoff
                            );
                            break;
                        }
                    }
                }
            }

            if self.backoff(&token).await {
                return Ok(());
            }
        }
    }

    /// Sleep out the resubscribe backoff; true when cancelled meanwhile.
    async fn backoff(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => true,
            _ = tokio::time::sleep(self.config.resubscribe_backoff) => false,
        }
    }

    pub async fn handle_event(&self, event: QueueWatchEvent) {
        match event.event_type {
            WatchEventType::Added | WatchEventType::Modified => {
                if QueuePolicy::parse(&event.object.spec.policy).is_none() {
                    warn!(
                        "Queue {} declares unknown policy {:?}, falling back to fifo",
                        event.object.resolved_path(),
                        event.object.spec.policy
                    );
                }

                let mut tree = self.tree.write().await;
                match tree.apply_definition(&event.object) {
                    Ok(id) => info!("Queue config applied: {}", tree.node(id).path),
                    Err(e) => warn!("Rejected queue definition: {}", e),
                }
            }
            WatchEventType::Deleted => {
                let mut tree = self.tree.write().await;
                match tree.remove_definition(&event.object) {
                    Some(removed) => {
                        if removed.abandoned_pods > 0 {
                            warn!(
                                "Queue {} deleted with {} pending pods abandoned",
                                removed.path, removed.abandoned_pods
                            );
                        } else {
                            info!("Queue deleted: {}", removed.path);
                        }
                    }
                    None => warn!(
                        "Delete event for unknown queue {}",
                        event.object.resolved_path()
                    ),
                }
            }
            WatchEventType::Error => {
                warn!("Queue definition watch reported an error event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterClient;
    use strata_core::{QueueDefinition, QueueDefinitionSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use tokio::sync::mpsc;

    fn definition(name: &str, path: Option<&str>, capacity: i64) -> QueueDefinition {
        QueueDefinition {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: QueueDefinitionSpec {
                path: path.map(String::from),
                capacity,
                max_capacity: 100,
                policy: "fifo".to_string(),
            },
        }
    }

    fn event(event_type: WatchEventType, object: QueueDefinition) -> QueueWatchEvent {
        QueueWatchEvent { event_type, object }
    }

    fn reconciler(tree: Arc<RwLock<QueueTree>>, client: MockClusterClient) -> QueueReconciler {
        QueueReconciler::new(tree, Arc::new(client), ReconcilerConfig::default())
    }

    #[tokio::test]
    async fn test_added_and_modified_upsert() {
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let reconciler = reconciler(tree.clone(), MockClusterClient::new());

        reconciler
            .handle_event(event(
                WatchEventType::Added,
                definition("team-a", Some("root.team-a"), 30),
            ))
            .await;
        reconciler
            .handle_event(event(
                WatchEventType::Modified,
                definition("team-a", Some("root.team-a"), 60),
            ))
            .await;

        let tree = tree.read().await;
        let id = tree.get("root.team-a").unwrap();
        assert_eq!(tree.node(id).config.capacity, 60);
    }

    #[tokio::test]
    async fn test_deleted_removes_queue() {
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let reconciler = reconciler(tree.clone(), MockClusterClient::new());

        let def = definition("team-a", Some("root.team-a"), 30);
        reconciler
            .handle_event(event(WatchEventType::Added, def.clone()))
            .await;
        reconciler
            .handle_event(event(WatchEventType::Deleted, def))
            .await;

        assert!(tree.read().await.get("root.team-a").is_none());
    }

    #[tokio::test]
    async fn test_run_drains_watch_until_cancelled() {
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let client = MockClusterClient::new();

        let (tx, rx) = mpsc::channel(8);
        client.set_watch(rx).await;

        let reconciler = Arc::new(reconciler(tree.clone(), client));
        let token = CancellationToken::new();

        let task = tokio::spawn({
            let reconciler = reconciler.clone();
            let token = token.clone();
            async move { reconciler.run(token).await }
        });

        tx.send(event(
            WatchEventType::Added,
            definition("team-a", Some("root.team-a"), 30),
        ))
        .await
        .unwrap();

        // Wait until the event has been applied to the shared tree
        for _ in 0..50 {
            if tree.read().await.get("root.team-a").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(tree.read().await.get("root.team-a").is_some());

        token.cancel();
        task.await.unwrap().unwrap();
    }
}
