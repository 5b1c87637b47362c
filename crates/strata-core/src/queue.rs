use crate::definition::QueueDefinition;
use crate::error::{Result, StrataError};
use crate::resources::{pod_resource_requests, ResourceList};
use k8s_openapi::api::core::v1::Pod;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Pod annotation naming the target queue path
pub const QUEUE_ANNOTATION: &str = "scheduler.kubernetes.io/queue";
/// Path of the root queue
pub const ROOT_PATH: &str = "root";

/// Scheduling policy of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    Fifo,
}

impl QueuePolicy {
    /// Parse a policy name; returns `None` for unknown policies.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fifo" => Some(Self::Fifo),
            _ => None,
        }
    }
}

impl fmt::Display for QueuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "fifo"),
        }
    }
}

/// Capacity configuration of a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Percentage share of the parent queue's capacity (0..=100)
    pub capacity: i64,
    /// Hard ceiling for elastic growth (0..=100); carried in the tree but
    /// not consulted by admission
    pub max_capacity: i64,
    pub policy: QueuePolicy,
}

impl Default for QueueConfig {
    /// Config used when a queue is lazily created for a pod that targets a
    /// path no definition has claimed: no capacity of its own.
    fn default() -> Self {
        Self {
            capacity: 0,
            max_capacity: 100,
            policy: QueuePolicy::Fifo,
        }
    }
}

impl QueueConfig {
    /// The fixed configuration of the root queue.
    pub fn root() -> Self {
        Self {
            capacity: 100,
            max_capacity: 100,
            policy: QueuePolicy::Fifo,
        }
    }
}

/// A reference to an externally-owned pod: identity, queue annotation, and
/// the summed resource requests of its containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
    /// Value of the queue annotation, when present and non-empty
    pub queue_path: Option<String>,
    pub requests: ResourceList,
}

impl PodRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            queue_path: None,
            requests: ResourceList::new(),
        }
    }

    /// Build a handle from a full pod object.
    pub fn from_pod(pod: &Pod) -> Self {
        let queue_path = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(QUEUE_ANNOTATION))
            .filter(|p| !p.is_empty())
            .cloned();

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            queue_path,
            requests: pod_resource_requests(pod),
        }
    }

    /// The queue path this pod targets: the annotation when set, otherwise
    /// the namespace default `root.<namespace>`.
    pub fn target_queue_path(&self) -> String {
        match &self.queue_path {
            Some(path) => path.clone(),
            None => format!("root.{}", self.namespace),
        }
    }
}

/// Index of a queue in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(usize);

/// A single queue in the capacity-share tree
#[derive(Debug)]
pub struct QueueNode {
    pub name: String,
    pub path: String,
    pub parent: Option<QueueId>,
    pub children: HashMap<String, QueueId>,
    pub config: QueueConfig,
    /// Pending pods in arrival order; the head is next to schedule
    pub pending: VecDeque<PodRef>,
    /// Sum of requests of pods bound through this queue. Never decremented:
    /// release on pod termination is outside this tree's contract.
    pub usage: ResourceList,
}

/// Result of removing a queue definition
#[derive(Debug, PartialEq, Eq)]
pub struct RemovedQueue {
    pub path: String,
    /// Pending pods abandoned across the removed subtree
    pub abandoned_pods: usize,
}

/// The hierarchical queue registry.
///
/// Nodes live in an arena; parent and child links are indices into it, and a
/// flat path index accelerates lookup. Slot 0 is the root queue for the
/// tree's lifetime. Removal detaches a subtree and drops its index entries;
/// arena slots are not reclaimed.
#[derive(Debug)]
pub struct QueueTree {
    nodes: Vec<QueueNode>,
    index: HashMap<String, QueueId>,
}

impl Default for QueueTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueTree {
    pub fn new() -> Self {
        let root = QueueNode {
            name: ROOT_PATH.to_string(),
            path: ROOT_PATH.to_string(),
            parent: None,
            children: HashMap::new(),
            config: QueueConfig::root(),
            pending: VecDeque::new(),
            usage: ResourceList::new(),
        };
        let mut index = HashMap::new();
        index.insert(ROOT_PATH.to_string(), QueueId(0));
        Self {
            nodes: vec![root],
            index,
        }
    }

    pub fn root(&self) -> QueueId {
        QueueId(0)
    }

    pub fn node(&self, id: QueueId) -> &QueueNode {
        &self.nodes[id.0]
    }

    /// Split a path into segments, rejecting anything that is empty, does
    /// not start at `root`, or contains an empty segment.
    fn segments(path: &str) -> Result<Vec<&str>> {
        if path.is_empty() || path == ROOT_PATH {
            return Err(StrataError::invalid_queue_path(path));
        }
        let parts: Vec<&str> = path.split('.').collect();
        if parts[0] != ROOT_PATH || parts.iter().any(|p| p.is_empty()) {
            return Err(StrataError::invalid_queue_path(path));
        }
        Ok(parts)
    }

    /// Create the queue at `path`, creating missing intermediate queues with
    /// the supplied config. Existing queues along the way are never touched,
    /// so the call is idempotent.
    pub fn create_queue(&mut self, path: &str, config: QueueConfig) -> Result<QueueId> {
        let parts = Self::segments(path)?;

        let mut current = self.root();
        for i in 1..parts.len() {
            let segment = parts[i];
            current = match self.nodes[current.0].children.get(segment) {
                Some(child) => *child,
                None => {
                    let child_path = parts[..=i].join(".");
                    let id = QueueId(self.nodes.len());
                    self.nodes.push(QueueNode {
                        name: segment.to_string(),
                        path: child_path.clone(),
                        parent: Some(current),
                        children: HashMap::new(),
                        config: config.clone(),
                        pending: VecDeque::new(),
                        usage: ResourceList::new(),
                    });
                    self.nodes[current.0]
                        .children
                        .insert(segment.to_string(), id);
                    self.index.insert(child_path, id);
                    id
                }
            };
        }

        Ok(current)
    }

    /// Look up a queue by path. Empty or `root` resolves to the root queue;
    /// the flat index is tried first, then a walk from the root.
    pub fn get(&self, path: &str) -> Option<QueueId> {
        if path.is_empty() || path == ROOT_PATH {
            return Some(self.root());
        }
        if let Some(id) = self.index.get(path) {
            return Some(*id);
        }

        let mut segments = path.split('.');
        if segments.next() != Some(ROOT_PATH) {
            return None;
        }
        let mut current = self.root();
        for segment in segments {
            current = *self.nodes[current.0].children.get(segment)?;
        }
        Some(current)
    }

    /// Upsert a queue from an external definition. An existing queue keeps
    /// its pending pods and usage; only the config is replaced.
    pub fn apply_definition(&mut self, def: &QueueDefinition) -> Result<QueueId> {
        let path = def.resolved_path();
        if path == ROOT_PATH {
            return Err(StrataError::invalid_queue_path(path));
        }

        match self.get(&path) {
            Some(id) => {
                self.nodes[id.0].config = def.queue_config();
                Ok(id)
            }
            None => self.create_queue(&path, def.queue_config()),
        }
    }

    /// Remove the queue a definition points at, detaching its subtree from
    /// the parent and dropping every descendant from the path index. Pending
    /// pods of the subtree are abandoned; the count is reported back.
    pub fn remove_definition(&mut self, def: &QueueDefinition) -> Option<RemovedQueue> {
        let path = def.resolved_path();
        if path == ROOT_PATH {
            return None;
        }
        let id = self.index.get(&path).copied()?;

        if let Some(parent) = self.nodes[id.0].parent {
            let name = self.nodes[id.0].name.clone();
            self.nodes[parent.0].children.remove(&name);
        }

        let mut abandoned = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            abandoned += self.nodes[current.0].pending.len();
            self.index.remove(&self.nodes[current.0].path);
            stack.extend(self.nodes[current.0].children.values().copied());
        }

        Some(RemovedQueue {
            path,
            abandoned_pods: abandoned,
        })
    }

    /// Append a pod to its target queue, lazily creating the queue with the
    /// default (zero-capacity) config when no definition has claimed it.
    pub fn enqueue(&mut self, pod: PodRef) -> Result<QueueId> {
        let path = pod.target_queue_path();
        let id = match self.get(&path) {
            Some(id) => id,
            None => self.create_queue(&path, QueueConfig::default())?,
        };
        self.nodes[id.0].pending.push_back(pod);
        Ok(id)
    }

    /// Remove and return the next pod of the queue at `path` under its
    /// policy. Absent or empty queues yield `None`.
    pub fn dequeue(&mut self, path: &str) -> Option<PodRef> {
        let id = self.get(path)?;
        let node = &mut self.nodes[id.0];
        match node.config.policy {
            QueuePolicy::Fifo => node.pending.pop_front(),
        }
    }

    /// Put a dequeued pod back at the head of its queue, preserving FIFO
    /// order. Returns false when the queue no longer exists.
    pub fn requeue_front(&mut self, path: &str, pod: PodRef) -> bool {
        match self.get(path) {
            Some(id) => {
                self.nodes[id.0].pending.push_front(pod);
                true
            }
            None => false,
        }
    }

    /// Effective share of total cluster resources, as a percentage: the
    /// product of capacity percentages along the chain from the root down to
    /// this queue, with integer division by 100 at each step.
    pub fn effective_capacity_percent(&self, id: QueueId) -> i64 {
        let mut percent = self.nodes[id.0].config.capacity;
        let mut parent = self.nodes[id.0].parent;
        while let Some(p) = parent {
            percent = percent * self.nodes[p.0].config.capacity / 100;
            parent = self.nodes[p.0].parent;
        }
        percent
    }

    /// Account a bound pod's requests against the queue's running usage.
    pub fn add_usage(&mut self, id: QueueId, requests: &ResourceList) {
        self.nodes[id.0].usage.add(requests);
    }
}
