use crate::error::{Result, SchedulerError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Minimal kubeconfig model: just enough to resolve the API server address
/// and credentials for the current context. Client-certificate auth and
/// exec plugins are not supported.
#[derive(Debug, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "current-context", default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
pub struct ClusterEntry {
    pub server: String,
    #[serde(rename = "insecure-skip-tls-verify", default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Resolved connection parameters for the cluster API server.
#[derive(Debug, Clone)]
pub struct ClusterCredentials {
    pub server: String,
    pub token: Option<String>,
    pub basic_auth: Option<(String, String)>,
    pub insecure_skip_tls_verify: bool,
}

impl Kubeconfig {
    /// Load a kubeconfig from an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::kubeconfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            SchedulerError::kubeconfig(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load from the standard location, `~/.kube/config`.
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SchedulerError::kubeconfig("cannot determine home directory"))?;
        Ok(home.join(".kube").join("config"))
    }

    /// Resolve the current context into server address and credentials.
    ///
    /// Without a `current-context`, the first cluster (and its first-match
    /// user, when a context names one) is used.
    pub fn credentials(&self) -> Result<ClusterCredentials> {
        let context = match &self.current_context {
            Some(name) => Some(
                self.contexts
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| &c.context)
                    .ok_or_else(|| {
                        SchedulerError::kubeconfig(format!("current-context {:?} not found", name))
                    })?,
            ),
            None => self.contexts.first().map(|c| &c.context),
        };

        let cluster = match context {
            Some(ctx) => &self
                .clusters
                .iter()
                .find(|c| c.name == ctx.cluster)
                .ok_or_else(|| {
                    SchedulerError::kubeconfig(format!("cluster {:?} not found", ctx.cluster))
                })?
                .cluster,
            None => {
                &self
                    .clusters
                    .first()
                    .ok_or_else(|| SchedulerError::kubeconfig("no clusters defined"))?
                    .cluster
            }
        };

        let user = context
            .and_then(|ctx| ctx.user.as_ref())
            .and_then(|name| self.users.iter().find(|u| &u.name == name))
            .map(|u| &u.user);

        let token = user.and_then(|u| u.token.clone());
        let basic_auth = user.and_then(|u| match (&u.username, &u.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        });

        Ok(ClusterCredentials {
            server: cluster.server.clone(),
            token,
            basic_auth,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
        })
    }
}
