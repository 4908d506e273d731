//!
//! # Cluster collaborators
//!
//! The engine never talks to the platform directly. Access goes through
//! [`ClusterClient`] for object CRUD and [`MetricsClient`] for resource usage.
//! Implementations are injected by the caller.
//!
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use k8_types::{InputK8Obj, K8Obj, LabelSelector, Spec};

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    #[error("api error {code}: {message}")]
    Api { code: u16, message: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// CRUD over cluster objects of any kind.
///
/// Cluster scoped kinds are addressed with an empty namespace.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// fetch single object, [`ClientError::NotFound`] if absent
    async fn get<S: Spec>(&self, namespace: &str, name: &str) -> Result<K8Obj<S>, ClientError>;

    /// list objects in namespace, optionally narrowed by selector
    async fn list<S: Spec>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<K8Obj<S>>, ClientError>;

    async fn create<S: Spec>(&self, input: InputK8Obj<S>) -> Result<K8Obj<S>, ClientError>;

    async fn update<S: Spec>(&self, object: K8Obj<S>) -> Result<K8Obj<S>, ClientError>;

    /// delete single object, [`ClientError::NotFound`] if absent
    async fn delete<S: Spec>(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// delete every object matching selector, returns number of deleted objects
    async fn delete_collection<S: Spec>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<usize, ClientError>;
}

/// Usage sample of one resource of a container
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Usage {
    pub unit: String,
    pub usage: f64,
}

/// Usage of every container of a pod, keyed by container then resource
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodMetrics {
    pub name: String,
    pub containers: BTreeMap<String, BTreeMap<String, Usage>>,
}

impl PodMetrics {
    pub fn usage(&self, container: &str, resource: &str) -> Option<&Usage> {
        self.containers
            .get(container)
            .and_then(|resources| resources.get(resource))
    }
}

#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn list(&self, namespace: &str) -> Result<Vec<PodMetrics>, ClientError>;
}
