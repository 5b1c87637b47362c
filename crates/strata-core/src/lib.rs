//! Strata Core - Fundamental types for the Strata hierarchical scheduler
//!
//! This crate provides:
//! - The hierarchical queue tree with pending-pod FIFOs and usage counters
//! - Milli-unit resource quantity parsing and arithmetic
//! - Queue-definition custom-resource mirror types
//! - Error types with miette diagnostics

pub mod definition;
pub mod error;
pub mod queue;
pub mod resources;

// Re-export commonly used types
pub use definition::{
    QueueDefinition, QueueDefinitionSpec, QueueStatus, QueueWatchEvent, WatchEventType,
    QUEUE_GROUP, QUEUE_RESOURCE, QUEUE_VERSION,
};
pub use error::{Result, StrataError};
pub use queue::{
    PodRef, QueueConfig, QueueId, QueueNode, QueuePolicy, QueueTree, RemovedQueue,
    QUEUE_ANNOTATION, ROOT_PATH,
};
pub use resources::{pod_resource_requests, ResourceList};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
