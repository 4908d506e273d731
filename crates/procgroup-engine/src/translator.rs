//!
//! # Translator
//!
//! Convert a process group configuration into the cluster objects that run it.
//! Translation is pure; nothing here talks to the cluster.
//!
use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::namespace::NamespaceSpec;
use k8_types::core::pod::{
    ConfigMapVolumeSource, ContainerSpec, ExecAction, KeyToPath, PodSpec,
    Probe as LivenessCheck, ResourceRequirements, TcpSocketAction, VolumeMount, VolumeSpec,
};
use k8_types::core::service::ServiceSpec;
use k8_types::{Env, EnvVarSource, KeySelector, TemplateMeta, TemplateSpec};

use procgroup_metadata::group::{EnvRef, MountRef, ProcessConfig, ProcessGroupConfig, Probe};
use procgroup_metadata::k8::{
    claim_volume_source, HostPathSource, ObjectReference, PersistentVolumeClaimSpec,
    PersistentVolumeSpec, HOSTNAME_LABEL,
};
use procgroup_metadata::labels::{Model, LABEL_PROCESS};
use procgroup_metadata::port::{FormattedPort, Port, Protocol};
use procgroup_metadata::quantity::Quantity;
use procgroup_metadata::resource::{ResourceLimit, ResourceType};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::resources::Managed;

const RECLAIM_RETAIN: &str = "Retain";

/// Volumes and claims of a group, in configuration order
#[derive(Debug, Default, Clone)]
pub struct GroupStorage {
    pub resources: Vec<Managed<PersistentVolumeSpec>>,
    pub claims: Vec<Managed<PersistentVolumeClaimSpec>>,
}

impl GroupStorage {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.claims.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Translator {
    config: EngineConfig,
}

impl Translator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn model(config: &ProcessGroupConfig, name: &str) -> Model {
        Model::from_labels(&config.namespace, name, &config.labels)
            .with_allow_update(config.allow_update)
    }

    pub fn to_namespace(&self, config: &ProcessGroupConfig) -> Managed<NamespaceSpec> {
        let config = config.prepared();
        Managed::new(
            Self::model(&config, &config.namespace),
            NamespaceSpec::default(),
        )
    }

    /// Workload running every process of the group, `None` if there is nothing to run
    pub fn to_pod(&self, config: &ProcessGroupConfig) -> EngineResult<Option<Managed<DeploymentSpec>>> {
        let config = config.prepared();
        if config.process.is_empty() {
            debug!(group = %config.group(), "no process, no workload");
            return Ok(None);
        }

        let model = Self::model(&config, config.group());
        let replicas = i32::try_from(config.replicas()).map_err(|_| {
            EngineError::InvalidConfig(format!("{} replicas is out of range", config.replicas()))
        })?;

        let mut volumes = Volumes::default();
        let mut containers = Vec::with_capacity(config.process.len());
        for process in &config.process {
            containers.push(self.container(&config, process, &mut volumes)?);
        }

        let node_selector = config
            .running_node
            .as_ref()
            .filter(|node| !node.is_empty())
            .map(|node| HashMap::from([(HOSTNAME_LABEL.to_owned(), node.clone())]));

        let spec = DeploymentSpec {
            replicas: Some(replicas),
            selector: model.selector(),
            template: TemplateSpec {
                metadata: Some(TemplateMeta {
                    labels: model.labels().into_iter().collect(),
                    ..Default::default()
                }),
                spec: PodSpec {
                    containers,
                    volumes: volumes.declared,
                    node_selector,
                    ..Default::default()
                },
            },
            ..Default::default()
        };
        Ok(Some(Managed::new(model, spec)))
    }

    /// One service per process exposing at least one port.
    /// Two processes can not share a service name.
    pub fn to_services(
        &self,
        config: &ProcessGroupConfig,
    ) -> EngineResult<Vec<Managed<ServiceSpec>>> {
        let config = config.prepared();
        let selector = Self::model(&config, config.group()).selector();

        let mut names = BTreeSet::new();
        let mut services = vec![];
        for process in config.process.iter().filter(|process| process.is_exposed()) {
            let Some(name) = process.service.as_deref() else {
                continue;
            };
            if !names.insert(name) {
                return Err(EngineError::InvalidConfig(format!(
                    "service {name} is declared by more than one process"
                )));
            }

            let mut model = Self::model(&config, name);
            model
                .labels
                .insert(LABEL_PROCESS.to_owned(), process.name.clone());

            let ports: Vec<FormattedPort> = process.ports.iter().filter_map(Port::format).collect();
            for port in ports.iter().filter(|port| port.protocol != Protocol::Tcp) {
                warn!(
                    service = name,
                    port = %port.name,
                    protocol = %port.protocol,
                    "service port is exposed as TCP"
                );
            }

            let spec = ServiceSpec {
                r#type: Some(
                    process
                        .service_type
                        .unwrap_or(self.config.default_service_type)
                        .into(),
                ),
                selector: Some(selector.match_labels.clone()),
                ports: ports.iter().map(FormattedPort::service_port).collect(),
                ..Default::default()
            };
            services.push(Managed::new(model, spec));
        }
        Ok(services)
    }

    /// A volume and a claim bound to it for every storage entry
    pub fn to_storage(&self, config: &ProcessGroupConfig) -> GroupStorage {
        let config = config.prepared();
        let mut storage = GroupStorage::default();

        for item in &config.storage {
            let volume_name = format!("{}-{}", config.namespace, item.name);
            let access_mode = item.access_mode.unwrap_or(self.config.default_access_mode);
            let storage_class = item
                .storage_class
                .clone()
                .or_else(|| self.config.storage_class.clone());

            let mut resource = PersistentVolumeSpec {
                access_modes: vec![access_mode],
                storage_class_name: storage_class.clone(),
                persistent_volume_reclaim_policy: Some(RECLAIM_RETAIN.to_owned()),
                host_path: item
                    .host_path
                    .clone()
                    .map(|path| HostPathSource { path }),
                claim_ref: Some(ObjectReference {
                    namespace: config.namespace.clone(),
                    name: item.name.clone(),
                }),
                ..Default::default()
            };
            resource.set_capacity(&item.capacity);
            storage.resources.push(Managed::new(
                Self::model(&config, &volume_name).with_scope(&config.namespace),
                resource,
            ));

            let mut claim = PersistentVolumeClaimSpec {
                access_modes: vec![access_mode],
                storage_class_name: storage_class,
                volume_name: Some(volume_name),
                ..Default::default()
            };
            claim.set_capacity(&item.capacity);
            storage
                .claims
                .push(Managed::new(Self::model(&config, &item.name), claim));
        }
        storage
    }

    fn container(
        &self,
        config: &ProcessGroupConfig,
        process: &ProcessConfig,
        volumes: &mut Volumes,
    ) -> EngineResult<ContainerSpec> {
        let ports: Vec<FormattedPort> = process.ports.iter().filter_map(Port::format).collect();

        let mut volume_mounts = vec![];
        for mount in &process.mounts {
            if let Some(volume_mount) = volumes.mount(config, &process.name, mount)? {
                volume_mounts.push(volume_mount);
            }
        }

        Ok(ContainerSpec {
            name: process.name.clone(),
            image: Some(process.source.clone()),
            image_pull_policy: Some(
                process
                    .pull_policy
                    .unwrap_or(self.config.default_pull_policy)
                    .into(),
            ),
            command: process.command.clone(),
            args: process.args.clone(),
            liveness_probe: process
                .probe
                .as_ref()
                .and_then(|probe| liveness(probe, &ports)),
            ports: ports.iter().map(FormattedPort::container_port).collect(),
            env: environment(process, config.secret.as_deref())?,
            resources: Some(self.resources(process)?),
            volume_mounts,
            ..Default::default()
        })
    }

    /// platform defaults overridden by the process own limits
    fn resources(&self, process: &ProcessConfig) -> EngineResult<ResourceRequirements> {
        let mut cpu = self.config.default_cpu.clone();
        let mut memory = self.config.default_memory.clone();
        for limit in &process.resource {
            match limit.kind {
                ResourceType::Cpu => cpu.update(limit),
                ResourceType::Memory => memory.update(limit),
            }
        }

        let mut requests = Map::new();
        let mut limits = Map::new();
        for limit in [&cpu, &memory] {
            insert_quantity(&mut requests, limit, limit.request()?);
            insert_quantity(&mut limits, limit, limit.limit()?);
        }
        Ok(ResourceRequirements {
            requests: Value::Object(requests),
            limits: Value::Object(limits),
        })
    }
}

fn insert_quantity(
    target: &mut Map<String, Value>,
    limit: &ResourceLimit,
    quantity: Option<Quantity>,
) {
    if let Some(quantity) = quantity {
        target.insert(limit.kind.key().to_owned(), Value::String(quantity.to_string()));
    }
}

/// Plain values become variables, named references read one key of their source
fn environment(process: &ProcessConfig, group_secret: Option<&str>) -> EngineResult<Vec<Env>> {
    let (named, values) = process.split_env();
    let mut env: Vec<Env> = values
        .into_iter()
        .map(|(name, value)| Env::key_value(name, value))
        .collect();

    for reference in named {
        env.push(Env {
            name: reference.name.clone(),
            value: None,
            value_from: Some(reference_source(reference, group_secret)?),
        });
    }
    Ok(env)
}

/// a reference naming no source reads the group secret
fn reference_source(
    reference: &EnvRef,
    group_secret: Option<&str>,
) -> EngineResult<EnvVarSource> {
    let selector = |source: &str| KeySelector {
        key: reference.key().to_owned(),
        name: source.to_owned(),
        optional: false,
    };

    match (reference.config_map.as_deref(), reference.secret.as_deref()) {
        (Some(config_map), None) => Ok(EnvVarSource::ConfigMapKeyRef(selector(config_map))),
        (None, Some(secret)) => Ok(EnvVarSource::SecretKeyRef(selector(secret))),
        (None, None) => group_secret
            .filter(|secret| !secret.is_empty())
            .map(|secret| EnvVarSource::SecretKeyRef(selector(secret)))
            .ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "env {} names no config map or secret and the group has no secret",
                    reference.name
                ))
            }),
        (Some(_), Some(_)) => Err(EngineError::InvalidConfig(format!(
            "env {} names both a config map and a secret",
            reference.name
        ))),
    }
}

/// Command check when one is given, tcp connect otherwise.
/// The tcp port defaults to the first container port.
fn liveness(probe: &Probe, ports: &[FormattedPort]) -> Option<LivenessCheck> {
    let mut check = LivenessCheck {
        initial_delay_seconds: Some(probe.initial_delay_seconds).filter(|delay| *delay > 0),
        period_seconds: Some(probe.period_seconds).filter(|period| *period > 0),
        ..Default::default()
    };

    if !probe.exec.is_empty() {
        check.exec = Some(ExecAction {
            command: probe.exec.clone(),
        });
    } else {
        let port = probe
            .port
            .or_else(|| ports.first().map(|port| port.target_port))?;
        check.tcp_socket = Some(TcpSocketAction {
            port,
            ..Default::default()
        });
    }
    Some(check)
}

/// Volumes referenced by the processes of a pod, each declared once
#[derive(Default)]
struct Volumes {
    names: BTreeSet<String>,
    declared: Vec<VolumeSpec>,
}

impl Volumes {
    /// Resolve a mount against config entries first, then storage entries
    fn mount(
        &mut self,
        config: &ProcessGroupConfig,
        process: &str,
        mount: &MountRef,
    ) -> EngineResult<Option<VolumeMount>> {
        let volume = if let Some(entry) = config.find_config(&mount.name) {
            let items: Vec<KeyToPath> = entry
                .items
                .iter()
                .map(|item| KeyToPath {
                    key: item.clone(),
                    path: item.clone(),
                    mode: None,
                })
                .collect();
            VolumeSpec {
                name: entry.name.clone(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some(entry.config_map().to_owned()),
                    items: (!items.is_empty()).then_some(items),
                    ..Default::default()
                }),
                ..Default::default()
            }
        } else if let Some(entry) = config.find_storage(&mount.name) {
            let claim = claim_volume_source(&entry.name).map_err(|err| {
                EngineError::InvalidConfig(format!("storage {}: {err}", entry.name))
            })?;
            VolumeSpec {
                name: entry.name.clone(),
                persistent_volume_claim: Some(claim),
                ..Default::default()
            }
        } else {
            warn!(process, mount = %mount.name, "no config or storage entry, skipping mount");
            return Ok(None);
        };

        if self.names.insert(volume.name.clone()) {
            self.declared.push(volume);
        }

        Ok(Some(VolumeMount {
            name: mount.name.clone(),
            mount_path: mount.mount_path.clone(),
            sub_path: mount.sub_path.clone(),
            read_only: mount.read_only.then_some(true),
            mount_propagation: None,
        }))
    }
}
