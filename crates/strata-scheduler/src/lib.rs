//! Strata Scheduler - queue admission, node selection, and binding
//!
//! This crate provides:
//! - The cluster-client capability trait with HTTP and mock implementations
//! - Kubeconfig loading for the HTTP client
//! - The cluster resource probe (allocatable totals across nodes)
//! - Node selection and the central admit-and-bind algorithm
//! - The queue-definition reconciler

pub mod client;
pub mod error;
pub mod kubeconfig;
pub mod probe;
pub mod reconciler;
pub mod scheduler;
pub mod selector;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use client::{ClusterClient, HttpClusterClient, MockClusterClient};
pub use error::{Result, SchedulerError};
pub use kubeconfig::{ClusterCredentials, Kubeconfig};
pub use probe::cluster_total_resources;
pub use reconciler::{QueueReconciler, ReconcilerConfig};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use selector::select_node;
