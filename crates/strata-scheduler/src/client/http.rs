use crate::error::{Result, SchedulerError};
use crate::kubeconfig::ClusterCredentials;
use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;
use strata_core::{
    PodRef, QueueStatus, QueueWatchEvent, QUEUE_GROUP, QUEUE_RESOURCE, QUEUE_VERSION,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ClusterClient;

/// Cluster client backed by the real Kubernetes API server.
pub struct HttpClusterClient {
    base_url: String,
    client: Client,
    scheduler_name: String,
    token: Option<String>,
    basic_auth: Option<(String, String)>,
}

impl HttpClusterClient {
    pub fn new(credentials: &ClusterCredentials, scheduler_name: &str) -> Result<Self> {
        let mut builder = Client::builder();
        if credentials.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(|e| {
            SchedulerError::upstream_unavailable("client setup", e.to_string())
        })?;

        Ok(Self {
            base_url: credentials.server.trim_end_matches('/').to_string(),
            client,
            scheduler_name: scheduler_name.to_string(),
            token: credentials.token.clone(),
            basic_auth: credentials.basic_auth.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some((user, password)) = &self.basic_auth {
            req = req.basic_auth(user, Some(password));
        }
        req
    }

    /// Send a request, surfacing transport failures and non-2xx statuses as
    /// `UpstreamUnavailable` tagged with the failing operation.
    async fn send(&self, operation: &str, req: RequestBuilder) -> Result<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| SchedulerError::upstream_unavailable(operation, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::upstream_unavailable(
                operation,
                format!("status {}: {}", status, body),
            ));
        }

        Ok(resp)
    }

    /// Parse the `items` array of a Kubernetes list response, skipping
    /// entries that fail to deserialize.
    fn parse_items<T: serde::de::DeserializeOwned>(body: &serde_json::Value, kind: &str) -> Vec<T> {
        let mut items = Vec::new();
        for item in body["items"].as_array().cloned().unwrap_or_default() {
            match serde_json::from_value(item) {
                Ok(parsed) => items.push(parsed),
                Err(e) => warn!("Failed to parse {} from list: {}", kind, e),
            }
        }
        items
    }

    fn queues_url(&self) -> String {
        format!(
            "{}/apis/{}/{}/{}",
            self.base_url, QUEUE_GROUP, QUEUE_VERSION, QUEUE_RESOURCE
        )
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn list_unscheduled_pods(&self) -> Result<Vec<Pod>> {
        let url = format!("{}/api/v1/pods", self.base_url);
        let selector = format!(
            "spec.schedulerName={},spec.nodeName=",
            self.scheduler_name
        );
        debug!("GET {} fieldSelector={}", url, selector);

        let resp = self
            .send(
                "pod list",
                self.request(Method::GET, url)
                    .query(&[("fieldSelector", selector.as_str())]),
            )
            .await?;

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            SchedulerError::upstream_unavailable("pod list", e.to_string())
        })?;
        Ok(Self::parse_items(&body, "pod"))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let url = format!("{}/api/v1/nodes", self.base_url);
        debug!("GET {}", url);

        let resp = self.send("node list", self.request(Method::GET, url)).await?;

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            SchedulerError::upstream_unavailable("node list", e.to_string())
        })?;
        Ok(Self::parse_items(&body, "node"))
    }

    async fn bind_pod(&self, pod: &PodRef, node_name: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}/binding",
            self.base_url, pod.namespace, pod.name
        );
        debug!("POST {}", url);

        let binding = json!({
            "apiVersion": "v1",
            "kind": "Binding",
            "metadata": { "name": pod.name, "namespace": pod.namespace },
            "target": { "kind": "Node", "name": node_name },
        });

        self.send("bind", self.request(Method::POST, url).json(&binding))
            .await
            .map_err(|e| {
                SchedulerError::bind_failed(
                    format!("{}/{}", pod.namespace, pod.name),
                    node_name,
                    e.to_string(),
                )
            })?;
        Ok(())
    }

    async fn patch_queue_status(&self, queue_name: &str, status: &QueueStatus) -> Result<()> {
        let url = format!("{}/{}/status", self.queues_url(), queue_name);
        debug!("PATCH {}", url);

        let patch = serde_json::to_vec(&json!({ "status": status })).map_err(|e| {
            SchedulerError::internal_error(format!("Failed to encode status patch: {}", e))
        })?;

        self.send(
            "queue status patch",
            self.request(Method::PATCH, url)
                .header(CONTENT_TYPE, "application/merge-patch+json")
                .body(patch),
        )
        .await?;
        Ok(())
    }

    async fn watch_queue_definitions(&self) -> Result<mpsc::Receiver<QueueWatchEvent>> {
        let url = self.queues_url();
        debug!("GET {} watch=true", url);

        let resp = self
            .send(
                "queue watch",
                self.request(Method::GET, url).query(&[("watch", "true")]),
            )
            .await?;

        let (tx, rx) = mpsc::channel(16);

        // Forward newline-delimited JSON events until the stream ends or the
        // receiver goes away. The channel closing is the resubscribe signal.
        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Queue watch stream error: {}", e);
                        break;
                    }
                };
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = &line[..line.len() - 1];
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<QueueWatchEvent>(line) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Failed to parse queue watch event: {}", e),
                    }
                }
            }
        });

        Ok(rx)
    }
}
