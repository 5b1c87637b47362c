use crate::client::ClusterClient;
use crate::error::{Result, SchedulerError};
use crate::probe::cluster_total_resources;
use crate::selector::select_node;
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{PodRef, QueueStatus, QueueTree, ResourceList};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the scheduler
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Interval between poll cycles
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// The scheduling loop: discovers unscheduled pods, runs them through queue
/// admission, and binds admitted pods to nodes.
pub struct Scheduler {
    tree: Arc<RwLock<QueueTree>>,
    client: Arc<dyn ClusterClient>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        tree: Arc<RwLock<QueueTree>>,
        client: Arc<dyn ClusterClient>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            tree,
            client,
            config,
        }
    }

    /// Run the poll loop until cancelled.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting scheduler (poll interval: {:?})",
            self.config.poll_interval
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!("Scheduling cycle failed: {}", e);
                    }
                }
            }
        }
    }

    /// One poll cycle: list unscheduled pods and try each in list order.
    /// A failure on one pod never aborts the cycle.
    pub async fn poll_once(&self) -> Result<()> {
        let pods = self.client.list_unscheduled_pods().await?;

        if pods.is_empty() {
            debug!("No unscheduled pods found");
            return Ok(());
        }

        for pod in &pods {
            let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
            let name = pod.metadata.name.as_deref().unwrap_or("");
            info!("Found pod to schedule: {}/{}", namespace, name);

            match self.admit_and_bind(pod).await {
                Ok(node) => info!("Bound pod {}/{} to node {}", namespace, name, node),
                Err(e @ SchedulerError::AdmissionRejected { .. }) => info!("{}", e),
                Err(e) => warn!("Failed to schedule pod {}/{}: {}", namespace, name, e),
            }
        }

        Ok(())
    }

    /// Enqueue a pod, test its queue's projected usage against the queue's
    /// effective share of the cluster, and bind it if admitted.
    ///
    /// A rejected pod stays at the head of its queue for the next cycle. A
    /// pod whose node selection or binding fails is put back at the head so
    /// it is not lost.
    pub async fn admit_and_bind(&self, pod: &Pod) -> Result<String> {
        let pod_ref = PodRef::from_pod(pod);
        let queue_path = pod_ref.target_queue_path();
        let pod_req = pod_ref.requests.clone();

        {
            let mut tree = self.tree.write().await;
            tree.enqueue(pod_ref)?;
        }

        let cluster_total = cluster_total_resources(self.client.as_ref()).await?;

        {
            let tree = self.tree.read().await;
            let id = tree.get(&queue_path).ok_or_else(|| {
                SchedulerError::internal_error(format!(
                    "queue {} vanished after enqueue",
                    queue_path
                ))
            })?;
            let effective_percent = tree.effective_capacity_percent(id);
            let future_usage = tree.node(id).usage.plus(&pod_req);
            check_admission(&queue_path, &future_usage, &cluster_total, effective_percent)?;
        }

        let selected = self.tree.write().await.dequeue(&queue_path).ok_or_else(|| {
            SchedulerError::internal_error(format!("queue {} drained before dequeue", queue_path))
        })?;

        let nodes = match self.client.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                self.requeue(&queue_path, selected).await;
                return Err(e);
            }
        };

        let node_name = match select_node(&nodes, &selected.requests) {
            Ok(name) => name,
            Err(e) => {
                self.requeue(&queue_path, selected).await;
                return Err(e);
            }
        };

        if let Err(e) = self.client.bind_pod(&selected, &node_name).await {
            self.requeue(&queue_path, selected).await;
            return Err(e);
        }

        // Account usage and push the queue's utilization upstream. A status
        // patch failure does not undo the bind.
        let patch = {
            let mut tree = self.tree.write().await;
            match tree.get(&queue_path) {
                Some(id) => {
                    tree.add_usage(id, &pod_req);
                    let node = tree.node(id);
                    Some((node.name.clone(), usage_status(&node.usage, &cluster_total)))
                }
                None => {
                    warn!(
                        "Queue {} removed while binding; usage not recorded",
                        queue_path
                    );
                    None
                }
            }
        };

        if let Some((queue_name, status)) = patch {
            if let Err(e) = self.client.patch_queue_status(&queue_name, &status).await {
                warn!("Failed to update status for queue {}: {}", queue_name, e);
            }
        }

        Ok(node_name)
    }

    async fn requeue(&self, queue_path: &str, pod: PodRef) {
        let pod_id = format!("{}/{}", pod.namespace, pod.name);
        if !self.tree.write().await.requeue_front(queue_path, pod) {
            warn!("Queue {} disappeared; dropping pod {}", queue_path, pod_id);
        }
    }
}

/// The admission test: for every resource the cluster advertises, the
/// queue's projected usage must stay within its effective share. Resources
/// the cluster does not advertise are ignored.
fn check_admission(
    queue_path: &str,
    future_usage: &ResourceList,
    cluster_total: &ResourceList,
    effective_percent: i64,
) -> Result<()> {
    for (resource, total_milli) in cluster_total.iter() {
        let capacity_milli = total_milli * effective_percent / 100;
        if let Some(requested_milli) = future_usage.get(resource) {
            debug!(
                "Checking {}: usage={}, capacity={}",
                resource, requested_milli, capacity_milli
            );
            if requested_milli > capacity_milli {
                return Err(SchedulerError::admission_rejected(
                    queue_path,
                    resource,
                    requested_milli,
                    capacity_milli,
                ));
            }
        }
    }
    Ok(())
}

/// CPU and memory utilization percentages relative to cluster totals.
fn usage_status(usage: &ResourceList, cluster_total: &ResourceList) -> QueueStatus {
    let percent = |resource: &str| -> i64 {
        let total = cluster_total.get(resource).unwrap_or(0);
        if total == 0 {
            return 0;
        }
        usage.get(resource).unwrap_or(0) * 100 / total
    };

    QueueStatus {
        cpu_usage: percent("cpu"),
        memory_usage: percent("memory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterClient;
    use crate::testutil::{node_with_allocatable, test_pod};
    use strata_core::{QueueConfig, QueuePolicy};

    const GIB: i64 = 1024 * 1024 * 1024;

    fn capacity(percent: i64) -> QueueConfig {
        QueueConfig {
            capacity: percent,
            max_capacity: 100,
            policy: QueuePolicy::Fifo,
        }
    }

    /// A tree with root.teamA at 50% and root.teamA.subteam1 at 20%, so
    /// subteam1 holds an effective 10% of the cluster.
    fn subteam_tree() -> Arc<RwLock<QueueTree>> {
        let mut tree = QueueTree::new();
        tree.create_queue("root.teamA", capacity(50)).unwrap();
        tree.create_queue("root.teamA.subteam1", capacity(20)).unwrap();
        Arc::new(RwLock::new(tree))
    }

    /// One ready node advertising 1000m CPU and 2Gi memory.
    async fn reference_cluster() -> MockClusterClient {
        let client = MockClusterClient::new();
        client
            .set_nodes(vec![node_with_allocatable(
                "node1",
                true,
                &[("cpu", "1000m"), ("memory", "2Gi")],
            )])
            .await;
        client
    }

    fn scheduler(tree: Arc<RwLock<QueueTree>>, client: &MockClusterClient) -> Scheduler {
        Scheduler::new(tree, Arc::new(client.clone()), SchedulerConfig::default())
    }

    #[tokio::test]
    async fn test_admitted_pod_is_bound_and_accounted() {
        let tree = subteam_tree();
        let client = reference_cluster().await;
        let scheduler = scheduler(tree.clone(), &client);

        let pod = test_pod(
            "fit-pod",
            "ns1",
            Some("root.teamA.subteam1"),
            &[("cpu", "50m"), ("memory", "128Mi")],
        );

        let node = scheduler.admit_and_bind(&pod).await.unwrap();
        assert_eq!(node, "node1");
        assert_eq!(
            client.bindings().await,
            vec![("ns1".to_string(), "fit-pod".to_string(), "node1".to_string())]
        );

        let tree = tree.read().await;
        let id = tree.get("root.teamA.subteam1").unwrap();
        assert!(tree.node(id).pending.is_empty());
        assert_eq!(tree.node(id).usage.get("cpu"), Some(50));
        assert_eq!(tree.node(id).usage.get("memory"), Some(128 * 1024 * 1024 * 1000));

        // Status patch targets the queue's leaf name with cluster-relative
        // percentages: 50m of 1000m CPU, 128Mi of 2Gi memory.
        let patches = client.status_patches().await;
        assert_eq!(
            patches,
            vec![(
                "subteam1".to_string(),
                QueueStatus {
                    cpu_usage: 5,
                    memory_usage: 6,
                }
            )]
        );
    }

    #[tokio::test]
    async fn test_cpu_over_effective_capacity_is_rejected() {
        let tree = subteam_tree();
        let client = reference_cluster().await;
        let scheduler = scheduler(tree.clone(), &client);

        // 200m > 10% of 1000m
        let pod = test_pod(
            "big-cpu",
            "ns1",
            Some("root.teamA.subteam1"),
            &[("cpu", "200m"), ("memory", "256Mi")],
        );

        let result = scheduler.admit_and_bind(&pod).await;
        assert!(matches!(
            result,
            Err(SchedulerError::AdmissionRejected { .. })
        ));
        assert!(client.bindings().await.is_empty());

        // The rejected pod stays at the head for the next cycle
        let tree = tree.read().await;
        let id = tree.get("root.teamA.subteam1").unwrap();
        assert_eq!(tree.node(id).pending.len(), 1);
        assert_eq!(tree.node(id).pending[0].name, "big-cpu");
        assert!(tree.node(id).usage.is_empty());
    }

    #[tokio::test]
    async fn test_memory_over_effective_capacity_is_rejected() {
        let tree = subteam_tree();
        let client = reference_cluster().await;
        let scheduler = scheduler(tree.clone(), &client);

        // 512Mi > 10% of 2Gi (~204Mi)
        let pod = test_pod(
            "big-mem",
            "ns1",
            Some("root.teamA.subteam1"),
            &[("cpu", "50m"), ("memory", "512Mi")],
        );

        let result = scheduler.admit_and_bind(&pod).await;
        match result {
            Err(SchedulerError::AdmissionRejected { resource, .. }) => {
                assert_eq!(resource, "memory")
            }
            other => panic!("expected admission rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_no_nodes_requeues_the_pod() {
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let client = MockClusterClient::new();
        let scheduler = scheduler(tree.clone(), &client);

        let pod = test_pod("orphan", "ns1", None, &[]);
        let result = scheduler.admit_and_bind(&pod).await;
        assert!(matches!(result, Err(SchedulerError::NoNodesAvailable)));

        // Dequeued for binding, then put back at the head
        let tree = tree.read().await;
        let id = tree.get("root.ns1").unwrap();
        assert_eq!(tree.node(id).pending.len(), 1);
        assert_eq!(tree.node(id).pending[0].name, "orphan");
    }

    #[tokio::test]
    async fn test_bind_failure_requeues_the_pod() {
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let client = reference_cluster().await;
        client.set_bind_error("webhook denied").await;
        let scheduler = scheduler(tree.clone(), &client);

        let pod = test_pod("unlucky", "ns1", None, &[]);
        let result = scheduler.admit_and_bind(&pod).await;
        assert!(matches!(result, Err(SchedulerError::BindFailed { .. })));
        assert!(client.status_patches().await.is_empty());

        {
            let tree = tree.read().await;
            let id = tree.get("root.ns1").unwrap();
            assert_eq!(tree.node(id).pending.len(), 1);
            assert!(tree.node(id).usage.is_empty());
        }

        // The retry goes through once the upstream recovers
        client.clear_bind_error().await;
        let node = scheduler.admit_and_bind(&pod).await.unwrap();
        assert_eq!(node, "node1");
    }

    #[tokio::test]
    async fn test_annotation_routes_and_namespace_defaults() {
        let tree = subteam_tree();
        let client = reference_cluster().await;
        let scheduler = scheduler(tree.clone(), &client);

        let annotated = test_pod("pod-custom", "ns-custom", Some("root.teamA.subteam1"), &[]);
        let plain = test_pod("pod-default", "ns-default", None, &[]);

        scheduler.admit_and_bind(&annotated).await.unwrap();
        scheduler.admit_and_bind(&plain).await.unwrap();

        let tree = tree.read().await;
        // Both were dequeued on success, but the namespace queue was lazily
        // created and remains visible.
        let default = tree.get("root.ns-default").unwrap();
        assert_eq!(tree.node(default).config, QueueConfig::default());
        assert_eq!(client.bindings().await.len(), 2);
    }

    #[tokio::test]
    async fn test_lazy_queue_rejects_any_request() {
        // A lazily-created namespace queue has zero capacity, so a pod that
        // requests anything is rejected until a definition claims the path.
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let client = reference_cluster().await;
        let scheduler = scheduler(tree.clone(), &client);

        let pod = test_pod("wants-cpu", "ns1", None, &[("cpu", "1m")]);
        let result = scheduler.admit_and_bind(&pod).await;
        assert!(matches!(
            result,
            Err(SchedulerError::AdmissionRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_poll_continues_past_failing_pod() {
        let tree = subteam_tree();
        let client = reference_cluster().await;
        client
            .set_pods(vec![
                test_pod("rejected", "ns1", None, &[("cpu", "500m")]),
                test_pod("bindable", "ns1", Some("root.teamA"), &[("cpu", "100m")]),
            ])
            .await;
        let scheduler = scheduler(tree.clone(), &client);

        scheduler.poll_once().await.unwrap();

        let bindings = client.bindings().await;
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].1, "bindable");
    }

    #[tokio::test]
    async fn test_pod_list_failure_aborts_cycle() {
        let tree = Arc::new(RwLock::new(QueueTree::new()));
        let client = MockClusterClient::new();
        client.set_pod_list_error("connection refused").await;
        let scheduler = scheduler(tree, &client);

        assert!(scheduler.poll_once().await.is_err());
    }

    #[test]
    fn test_admission_is_monotone_in_requests() {
        let mut total = ResourceList::new();
        total.insert("cpu", 1000);
        total.insert("memory", 2 * GIB * 1000);

        let mut smaller = ResourceList::new();
        smaller.insert("cpu", 150);

        let mut larger = smaller.clone();
        larger.insert("cpu", 175);
        larger.insert("memory", GIB);

        // 10% effective capacity: 100m CPU cap
        assert!(check_admission("root.q", &smaller, &total, 10).is_err());
        assert!(check_admission("root.q", &larger, &total, 10).is_err());
        assert!(check_admission("root.q", &smaller, &total, 20).is_ok());
    }

    #[test]
    fn test_admission_ignores_resources_missing_from_totals() {
        let mut total = ResourceList::new();
        total.insert("cpu", 1000);

        let mut usage = ResourceList::new();
        usage.insert("cpu", 100);
        usage.insert("nvidia.com/gpu", 4000);

        assert!(check_admission("root.q", &usage, &total, 50).is_ok());
    }

    #[test]
    fn test_usage_status_percentages() {
        let mut total = ResourceList::new();
        total.insert("cpu", 1000);
        total.insert("memory", 2 * GIB * 1000);

        let mut usage = ResourceList::new();
        usage.insert("cpu", 250);
        usage.insert("memory", GIB * 1000);

        let status = usage_status(&usage, &total);
        assert_eq!(status.cpu_usage, 25);
        assert_eq!(status.memory_usage, 50);

        // Zero totals never divide
        let status = usage_status(&usage, &ResourceList::new());
        assert_eq!(status.cpu_usage, 0);
        assert_eq!(status.memory_usage, 0);
    }
}
