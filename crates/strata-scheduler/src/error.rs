use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// The cluster API could not serve a request
    #[error("Upstream unavailable during {operation}: {message}")]
    #[diagnostic(
        code(scheduler::upstream_unavailable),
        help("Check connectivity to the cluster API server and the credentials in the kubeconfig")
    )]
    UpstreamUnavailable { operation: String, message: String },

    /// The node list was empty
    #[error("no nodes available")]
    #[diagnostic(
        code(scheduler::no_nodes_available),
        help("Register at least one worker node with the cluster")
    )]
    NoNodesAvailable,

    /// Nodes exist but none can take the pod
    #[error("no ready nodes: {reason}")]
    #[diagnostic(
        code(scheduler::no_ready_nodes),
        help("Check node Ready conditions and allocatable resources")
    )]
    NoReadyNodes { reason: String },

    /// The queue's projected usage exceeds its effective capacity share
    #[error("queue {queue_path} exceeds capacity for {resource}: {requested_milli} > {capacity_milli} (milli-units)")]
    #[diagnostic(
        code(scheduler::admission_rejected),
        help("The pod stays pending; raise the queue's capacity share or wait for cluster growth")
    )]
    AdmissionRejected {
        queue_path: String,
        resource: String,
        requested_milli: i64,
        capacity_milli: i64,
    },

    /// The binding call was rejected by the cluster API
    #[error("binding pod {pod} to node {node} failed: {message}")]
    #[diagnostic(
        code(scheduler::bind_failed),
        help("The pod has been requeued at the head of its queue and will be retried")
    )]
    BindFailed {
        pod: String,
        node: String,
        message: String,
    },

    /// The kubeconfig could not be loaded or understood
    #[error("Kubeconfig error: {message}")]
    #[diagnostic(
        code(scheduler::kubeconfig_error),
        help("Point --kubeconfig at a valid config, or place one at ~/.kube/config")
    )]
    KubeconfigError { message: String },

    /// Core error
    #[error("Core error: {0}")]
    #[diagnostic(code(scheduler::core_error))]
    CoreError(#[from] strata_core::StrataError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError { message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an UpstreamUnavailable error
    pub fn upstream_unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a NoReadyNodes error
    pub fn no_ready_nodes(reason: impl Into<String>) -> Self {
        Self::NoReadyNodes {
            reason: reason.into(),
        }
    }

    /// Create an AdmissionRejected error
    pub fn admission_rejected(
        queue_path: impl Into<String>,
        resource: impl Into<String>,
        requested_milli: i64,
        capacity_milli: i64,
    ) -> Self {
        Self::AdmissionRejected {
            queue_path: queue_path.into(),
            resource: resource.into(),
            requested_milli,
            capacity_milli,
        }
    }

    /// Create a BindFailed error
    pub fn bind_failed(
        pod: impl Into<String>,
        node: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BindFailed {
            pod: pod.into(),
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a KubeconfigError
    pub fn kubeconfig(message: impl Into<String>) -> Self {
        Self::KubeconfigError {
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
