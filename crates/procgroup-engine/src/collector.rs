//!
//! # Progress collector
//!
//! Observe the services, pods and resource usage of process groups and merge them
//! into one [`Progress`] record per process. Services and metrics are best effort;
//! without pods there is nothing to report and the collection fails.
//!
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join3;
use serde_json::json;
use tracing::{debug, instrument, warn};

use k8_types::core::pod::PodSpec;
use k8_types::core::service::ServiceSpec;
use k8_types::{K8Obj, Spec};

use procgroup_metadata::health::Health;
use procgroup_metadata::k8::{container_health, node_health, service_health};
use procgroup_metadata::labels::{Model, LABEL_PROCESS};
use procgroup_metadata::progress::{
    Progress, DETAIL_HOST_IP, DETAIL_NODE, DETAIL_POD, DETAIL_POD_IP, DETAIL_PORTS,
    DETAIL_RESTARTS, DETAIL_SERVICE, INDICATOR_CPU, INDICATOR_GROUP, INDICATOR_MEMORY,
    INDICATOR_SERVICE,
};

use crate::client::{ClusterClient, MetricsClient, PodMetrics};
use crate::context::OpContext;
use crate::error::{EngineError, EngineResult};
use crate::resources::{object_labels, PodAdapter, ServiceAdapter};

const METRICS_KIND: &str = "PodMetrics";

pub struct ProgressCollector<C> {
    services: ServiceAdapter<C>,
    pods: PodAdapter<C>,
    metrics: Option<Arc<dyn MetricsClient>>,
}

impl<C> ProgressCollector<C>
where
    C: ClusterClient,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            services: ServiceAdapter::new(client.clone()),
            pods: PodAdapter::new(client),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsClient>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// progress of every process in the namespace
    pub async fn list(&self, ctx: &OpContext, namespace: &str) -> EngineResult<Vec<Progress>> {
        self.collect(ctx, namespace, &[]).await
    }

    /// aggregate health of a single group
    #[instrument(skip(self, ctx))]
    pub async fn group_health(
        &self,
        ctx: &OpContext,
        namespace: &str,
        group: &str,
    ) -> EngineResult<Health> {
        let progress = self.collect(ctx, namespace, &[group.to_owned()]).await?;
        Ok(Health::aggregate(progress.iter().map(|record| record.status)))
    }

    /// Aggregate health of the cluster nodes, each judged by the containers it runs
    #[instrument(skip(self, ctx))]
    pub async fn node_health(&self, ctx: &OpContext) -> EngineResult<Health> {
        let nodes = self.pods.list_nodes(ctx).await?;
        let pods = self.pods.list_pods(ctx, "", &[]).await?;

        let mut per_node: BTreeMap<&str, Vec<Health>> = BTreeMap::new();
        for pod in &pods {
            let Some(node) = pod.spec.node_name.as_deref() else {
                continue;
            };
            let states = container_names(pod)
                .into_iter()
                .map(|name| container_health(&pod.status, &name));
            per_node.entry(node).or_default().extend(states);
        }

        let health = Health::aggregate(nodes.iter().map(|node| {
            let containers = per_node
                .remove(node.metadata.name.as_str())
                .unwrap_or_default();
            let health = node_health(&node.status, containers);
            debug!(node = %node.metadata.name, %health, "node");
            health
        }));
        Ok(health)
    }

    #[instrument(skip(self, ctx))]
    async fn collect(
        &self,
        ctx: &OpContext,
        namespace: &str,
        groups: &[String],
    ) -> EngineResult<Vec<Progress>> {
        let (services, pods, metrics) = join3(
            self.services.list(ctx, namespace, groups),
            self.pods.list_pods(ctx, namespace, groups),
            self.pod_metrics(ctx, namespace),
        )
        .await;

        let pods = pods?;
        let services = services.unwrap_or_else(|err| partial(ServiceSpec::label(), err));
        let metrics = metrics.unwrap_or_else(|err| partial(METRICS_KIND, err));
        debug!(
            pods = pods.len(),
            services = services.len(),
            metrics = metrics.len(),
            "observed"
        );

        Ok(Observation::new(namespace, &pods, &services, &metrics).progress())
    }

    async fn pod_metrics(&self, ctx: &OpContext, namespace: &str) -> EngineResult<Vec<PodMetrics>> {
        let Some(metrics) = &self.metrics else {
            return Ok(vec![]);
        };
        ctx.race(metrics.list(namespace))
            .await?
            .map_err(|source| EngineError::remote("list", METRICS_KIND, namespace, source))
    }
}

/// containers declared by the pod, or reported by it when the spec lists none
fn container_names(pod: &K8Obj<PodSpec>) -> Vec<String> {
    if pod.spec.containers.is_empty() {
        pod.status
            .container_statuses
            .iter()
            .map(|status| status.name.clone())
            .collect()
    } else {
        pod.spec
            .containers
            .iter()
            .map(|container| container.name.clone())
            .collect()
    }
}

fn partial<T>(source_kind: &'static str, err: EngineError) -> Vec<T> {
    let err = EngineError::PartialCollection {
        source_kind,
        source: Box::new(err),
    };
    warn!(%err, "continuing without");
    vec![]
}

/// Pod of a group, with the health of each of its containers
struct PodView<'a> {
    pod: &'a K8Obj<PodSpec>,
    model: Model,
    containers: Vec<(String, Health)>,
}

/// Service exposing a process
struct ServiceView {
    name: String,
    group: String,
    process: String,
    health: Health,
}

/// Snapshot of one collection cycle
struct Observation<'a> {
    namespace: &'a str,
    pods: Vec<PodView<'a>>,
    services: Vec<ServiceView>,
    metrics: BTreeMap<&'a str, &'a PodMetrics>,
    groups: BTreeMap<String, Health>,
}

impl<'a> Observation<'a> {
    fn new(
        namespace: &'a str,
        pods: &'a [K8Obj<PodSpec>],
        services: &'a [K8Obj<ServiceSpec>],
        metrics: &'a [PodMetrics],
    ) -> Self {
        let pods: Vec<PodView> = pods
            .iter()
            .map(|pod| {
                let model = Model::from_labels(namespace, &pod.metadata.name, &object_labels(pod));
                let containers = container_names(pod)
                    .into_iter()
                    .map(|name| {
                        let health = container_health(&pod.status, &name);
                        (name, health)
                    })
                    .collect();
                PodView {
                    pod,
                    model,
                    containers,
                }
            })
            .collect();

        let mut per_group: BTreeMap<String, Vec<Health>> = BTreeMap::new();
        for view in &pods {
            per_group
                .entry(view.model.group().to_owned())
                .or_default()
                .extend(view.containers.iter().map(|(_, health)| *health));
        }
        let groups = per_group
            .into_iter()
            .map(|(group, states)| (group, Health::aggregate(states)))
            .collect();

        let services = services
            .iter()
            .map(|service| {
                let model =
                    Model::from_labels(namespace, &service.metadata.name, &object_labels(service));
                ServiceView {
                    name: service.metadata.name.clone(),
                    group: model.group().to_owned(),
                    process: model.labels.get(LABEL_PROCESS).cloned().unwrap_or_default(),
                    health: service_health(&service.spec, &service.status),
                }
            })
            .collect();

        let metrics = metrics
            .iter()
            .map(|sample| (sample.name.as_str(), sample))
            .collect();

        Self {
            namespace,
            pods,
            services,
            metrics,
            groups,
        }
    }

    fn service(&self, group: &str, process: &str) -> Option<&ServiceView> {
        self.services
            .iter()
            .find(|service| service.group == group && service.process == process)
    }

    fn progress(&self) -> Vec<Progress> {
        let time = Utc::now();
        let mut records = vec![];

        for view in &self.pods {
            let pod = view.pod;
            let group = view.model.group();
            let group_health = self.groups.get(group).copied().unwrap_or_default();
            let sample = self.metrics.get(pod.metadata.name.as_str());

            for (name, health) in &view.containers {
                let mut record = Progress::new(self.namespace, group, name, *health)
                    .with_labels(view.model.labels())
                    .with_time(time)
                    .with_indicator(INDICATOR_GROUP, group_health.as_str())
                    .with_detail(DETAIL_POD, pod.metadata.name.as_str());

                for (indicator, resource) in [(INDICATOR_CPU, "cpu"), (INDICATOR_MEMORY, "memory")] {
                    if let Some(usage) = sample.and_then(|sample| sample.usage(name, resource)) {
                        record = record.with_indicator(
                            indicator,
                            json!({ "unit": usage.unit, "usage": usage.usage }),
                        );
                    }
                }

                if let Some(service) = self.service(group, name) {
                    record = record
                        .with_indicator(INDICATOR_SERVICE, service.health.as_str())
                        .with_detail(DETAIL_SERVICE, service.name.as_str());
                }

                if let Some(node) = &pod.spec.node_name {
                    record = record.with_detail(DETAIL_NODE, node.as_str());
                }
                if !pod.status.host_ip.is_empty() {
                    record = record.with_detail(DETAIL_HOST_IP, pod.status.host_ip.as_str());
                }
                if let Some(pod_ip) = &pod.status.pod_ip {
                    record = record.with_detail(DETAIL_POD_IP, pod_ip.as_str());
                }
                if let Some(container) = pod.spec.containers.iter().find(|c| &c.name == name) {
                    if !container.ports.is_empty() {
                        record = record.with_detail(
                            DETAIL_PORTS,
                            serde_json::to_value(&container.ports).unwrap_or_default(),
                        );
                    }
                }
                if let Some(status) = pod
                    .status
                    .container_statuses
                    .iter()
                    .find(|status| &status.name == name)
                {
                    record = record.with_detail(DETAIL_RESTARTS, status.restart_count);
                }

                records.push(record);
            }
        }
        records
    }
}
