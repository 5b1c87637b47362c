use crate::queue::{QueueConfig, QueuePolicy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// API group of the queue-definition custom resource
pub const QUEUE_GROUP: &str = "kubescheduler.example.com";
/// API version of the queue-definition custom resource
pub const QUEUE_VERSION: &str = "v1";
/// Plural resource name of the queue-definition custom resource
pub const QUEUE_RESOURCE: &str = "queues";

/// A cluster-scoped queue-definition object, mirrored from the
/// `kubescheduler.example.com/v1` `Queue` custom resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueDefinition {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: QueueDefinitionSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueDefinitionSpec {
    /// Dot-separated queue path; when absent the queue lives at `root.<name>`
    pub path: Option<String>,
    /// Percentage share of the parent queue's capacity
    pub capacity: i64,
    /// Hard ceiling for elastic growth (carried, not enforced by admission)
    pub max_capacity: i64,
    /// Scheduling policy name; unknown values fall back to FIFO
    pub policy: String,
}

impl QueueDefinition {
    /// Object name from metadata, empty string when unset.
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    /// The queue path this definition targets: `spec.path` when non-empty,
    /// otherwise `root.<metadata.name>`.
    pub fn resolved_path(&self) -> String {
        match self.spec.path.as_deref() {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => format!("root.{}", self.name()),
        }
    }

    /// Translate the object's spec into a tree-level queue config.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.spec.capacity,
            max_capacity: self.spec.max_capacity,
            policy: QueuePolicy::parse(&self.spec.policy).unwrap_or(QueuePolicy::Fifo),
        }
    }
}

/// Usage percentages pushed back to the queue definition's status
/// sub-resource after a successful bind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub cpu_usage: i64,
    pub memory_usage: i64,
}

/// Watch event type on the queue-definition collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Error,
}

/// A single event from the queue-definition watch stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueWatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: QueueDefinition,
}
