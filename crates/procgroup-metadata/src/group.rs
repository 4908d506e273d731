//!
//! # Process group configuration
//!
//! Declarative description of a group of processes that are deployed and
//! lifecycle-managed together.
//!
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use k8_types::core::pod::ImagePullPolicy;
use k8_types::core::service::LoadBalancerType;

use crate::labels::{Labels, LABEL_GROUP};
use crate::port::Port;
use crate::resource::ResourceLimit;

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessGroupConfig {
    pub namespace: String,
    pub group_name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    pub allow_update: bool,
    /// secret read by named env references that name no source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<ConfigMount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub storage: Vec<StorageSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub process: Vec<ProcessConfig>,
}

impl ProcessGroupConfig {
    pub fn new(namespace: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            group_name: group_name.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml(input: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(input)
    }

    /// unset or zero replicas means one
    pub fn replicas(&self) -> u32 {
        self.replicas.filter(|replicas| *replicas > 0).unwrap_or(1)
    }

    /// Copy of the configuration with the group label injected when missing or empty
    pub fn prepared(&self) -> Self {
        let mut prepared = self.clone();
        let group = prepared.labels.entry(LABEL_GROUP.to_owned()).or_default();
        if group.is_empty() {
            group.clone_from(&self.group_name);
        }
        prepared
    }

    /// group name recorded in labels, falling back to the configured name
    pub fn group(&self) -> &str {
        self.labels
            .get(LABEL_GROUP)
            .map(String::as_str)
            .filter(|group| !group.is_empty())
            .unwrap_or(&self.group_name)
    }

    pub fn find_config(&self, name: &str) -> Option<&ConfigMount> {
        self.config.iter().find(|config| config.name == name)
    }

    pub fn find_storage(&self, name: &str) -> Option<&StorageSpec> {
        self.storage.iter().find(|storage| storage.name == name)
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl From<PullPolicy> for ImagePullPolicy {
    fn from(policy: PullPolicy) -> Self {
        match policy {
            PullPolicy::Always => Self::Always,
            PullPolicy::IfNotPresent => Self::IfNotPresent,
            PullPolicy::Never => Self::Never,
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::IfNotPresent => write!(f, "IfNotPresent"),
            Self::Never => write!(f, "Never"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl From<ServiceType> for LoadBalancerType {
    fn from(service_type: ServiceType) -> Self {
        match service_type {
            ServiceType::ClusterIP => Self::ClusterIP,
            ServiceType::NodePort => Self::NodePort,
            ServiceType::LoadBalancer => Self::LoadBalancer,
        }
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    /// container image
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<PullPolicy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<ResourceLimit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvSource>,
    /// names of config or storage entries to mount
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<MountRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<Probe>,
}

impl ProcessConfig {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// true if the process needs a service resource: a service name and a usable port
    pub fn is_exposed(&self) -> bool {
        self.service
            .as_ref()
            .is_some_and(|service| !service.is_empty())
            && self.ports.iter().any(|port| port.format().is_some())
    }

    /// Named references are passed through, anonymous bags are flattened into one map.
    /// Later bags win on duplicated keys.
    pub fn split_env(&self) -> (Vec<&EnvRef>, BTreeMap<String, String>) {
        let mut named = vec![];
        let mut values = BTreeMap::new();
        for source in &self.env {
            match source {
                EnvSource::Named(reference) => named.push(reference),
                EnvSource::Values(bag) => {
                    values.extend(bag.iter().map(|(k, v)| (k.clone(), v.clone())))
                }
            }
        }
        (named, values)
    }
}

/// One environment entry
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvSource {
    Named(EnvRef),
    Values(BTreeMap<String, String>),
}

/// Variable `name` read from a config map or secret.
/// The entry read is `key`, defaulting to `name`. Without a source the group secret is used.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Reference from a process to a config or storage entry of its group
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountRef {
    pub name: String,
    pub mount_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    pub read_only: bool,
}

impl MountRef {
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            ..Default::default()
        }
    }
}

/// Config map made available to processes of the group
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigMount {
    pub name: String,
    /// config map backing the mount, defaults to `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl EnvRef {
    /// entry of the source holding the value
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }
}

impl ConfigMount {
    pub fn config_map(&self) -> &str {
        self.config_map.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum AccessMode {
    #[default]
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
}

/// Persistent storage of a group: one volume plus its claim
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSpec {
    pub name: String,
    /// requested capacity such as `1Gi`
    pub capacity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<AccessMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// node local path backing the volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
}

impl StorageSpec {
    pub fn new(name: impl Into<String>, capacity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.into(),
            ..Default::default()
        }
    }
}

/// Liveness check of a process: a command when `exec` is set, a tcp connect otherwise
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Probe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exec: Vec<String>,
    pub initial_delay_seconds: u32,
    pub period_seconds: u32,
}

#[cfg(test)]
mod test {

    use super::*;

    const GROUP_YAML: &str = r#"
namespace: shop
groupName: g1
replicas: 0
allowUpdate: true
config:
  - name: settings
storage:
  - name: data
    capacity: 1Gi
process:
  - name: web
    service: svc1
    source: nginx:1.25
    ports:
      - name: http
        port: 80
    env:
      - name: DB_URL
        secret: db
        key: url
      - LOG_LEVEL: info
        MODE: prod
    mounts:
      - name: data
        mountPath: /var/lib/data
"#;

    #[test]
    fn test_from_yaml() {
        let config = ProcessGroupConfig::from_yaml(GROUP_YAML).expect("parse");
        assert_eq!(config.group_name, "g1");
        assert_eq!(config.replicas(), 1);
        assert!(config.allow_update);
        assert_eq!(config.storage[0].capacity, "1Gi");

        let web = &config.process[0];
        assert!(web.is_exposed());
        assert_eq!(web.ports[0].port, Some(80));

        let (named, values) = web.split_env();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].secret.as_deref(), Some("db"));
        assert_eq!(values.get("MODE").map(String::as_str), Some("prod"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_prepared_injects_group() {
        let config = ProcessGroupConfig::new("shop", "g1");
        assert!(config.labels.is_empty());

        let prepared = config.prepared();
        assert_eq!(prepared.labels.get(LABEL_GROUP).map(String::as_str), Some("g1"));
        assert!(config.labels.is_empty());

        let mut custom = ProcessGroupConfig::new("shop", "g1");
        custom.labels.insert(LABEL_GROUP.to_owned(), "other".to_owned());
        assert_eq!(custom.prepared().group(), "other");
    }

    #[test]
    fn test_prepared_replaces_empty_group() {
        let mut config = ProcessGroupConfig::new("shop", "g1");
        config.labels.insert(LABEL_GROUP.to_owned(), String::new());

        let prepared = config.prepared();
        assert_eq!(prepared.labels.get(LABEL_GROUP).map(String::as_str), Some("g1"));
        assert_eq!(config.labels.get(LABEL_GROUP).map(String::as_str), Some(""));
    }

    #[test]
    fn test_env_ref_key_defaults_to_name() {
        let reference = EnvRef {
            name: "DB_URL".to_owned(),
            ..Default::default()
        };
        assert_eq!(reference.key(), "DB_URL");
    }

    #[test]
    fn test_not_exposed_without_ports() {
        let mut process = ProcessConfig::new("worker", "busybox");
        process.service = Some("svc".to_owned());
        assert!(!process.is_exposed());

        process.ports.push(Port::new(80));
        assert!(process.is_exposed());

        process.service = None;
        assert!(!process.is_exposed());
    }

    #[test]
    fn test_not_exposed_with_only_empty_ports() {
        let mut process = ProcessConfig::new("worker", "busybox");
        process.service = Some("svc".to_owned());
        process.ports.push(Port::default());
        process.ports.push(Port {
            name: Some("admin".to_owned()),
            ..Default::default()
        });
        assert!(!process.is_exposed());
    }
}
