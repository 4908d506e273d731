//!
//! # Orchestration engine
//!
//! Reconcile a process group onto the cluster and tear it down again. Every step
//! re-reads the cluster before acting; the first failing step aborts the operation
//! and nothing already applied is rolled back.
//!
use std::sync::Arc;

use tracing::{debug, info, instrument};

use procgroup_metadata::group::ProcessGroupConfig;
use procgroup_metadata::health::Health;

use crate::client::{ClusterClient, MetricsClient};
use crate::collector::ProgressCollector;
use crate::config::EngineConfig;
use crate::context::OpContext;
use crate::error::{EngineError, EngineResult};
use crate::resources::{
    NamespaceAdapter, PodAdapter, ServiceAdapter, StorageAdapter, StorageResourceAdapter,
};
use crate::translator::{GroupStorage, Translator};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DestroyOptions {
    /// also delete the persistent volumes backing the claims
    pub remove_storage_resource: bool,
}

pub struct ProcessGroupEngine<C> {
    client: Arc<C>,
    translator: Translator,
    metrics: Option<Arc<dyn MetricsClient>>,
    namespaces: NamespaceAdapter<C>,
    services: ServiceAdapter<C>,
    pods: PodAdapter<C>,
    claims: StorageAdapter<C>,
    volumes: StorageResourceAdapter<C>,
}

impl<C> ProcessGroupEngine<C>
where
    C: ClusterClient,
{
    pub fn new(client: Arc<C>, config: EngineConfig) -> Self {
        Self {
            translator: Translator::new(config),
            metrics: None,
            namespaces: NamespaceAdapter::new(client.clone()),
            services: ServiceAdapter::new(client.clone()),
            pods: PodAdapter::new(client.clone()),
            claims: StorageAdapter::new(client.clone()),
            volumes: StorageResourceAdapter::new(client.clone()),
            client,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsClient>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// destroy options following the configured defaults
    pub fn destroy_options(&self) -> DestroyOptions {
        DestroyOptions {
            remove_storage_resource: self.translator.config().remove_storage_resource,
        }
    }

    pub fn collector(&self) -> ProgressCollector<C> {
        let collector = ProgressCollector::new(self.client.clone());
        match &self.metrics {
            Some(metrics) => collector.with_metrics(metrics.clone()),
            None => collector,
        }
    }

    /// Bring the whole group up: namespace, services, storage, then the workload
    #[instrument(skip(self, ctx, config), fields(namespace = %config.namespace, group = %config.group_name))]
    pub async fn running(&self, ctx: &OpContext, config: &ProcessGroupConfig) -> EngineResult<()> {
        let namespace = self.translator.to_namespace(config);
        let services = self.translator.to_services(config)?;
        let storage = self.translator.to_storage(config);
        let pod = self.translator.to_pod(config)?;

        self.namespaces.ensure(ctx, &namespace).await?;

        for service in &services {
            if service.model.allow_update {
                self.services.apply(ctx, service).await?;
            } else {
                self.services.ensure(ctx, service).await?;
            }
        }

        self.ensure_storage(ctx, &storage).await?;

        if let Some(pod) = pod {
            self.pods.apply(ctx, &pod).await?;
        }
        info!("group running");
        Ok(())
    }

    /// Start the workload of a group, creating missing storage first
    #[instrument(skip(self, ctx, config), fields(namespace = %config.namespace, group = %config.group_name))]
    pub async fn start(&self, ctx: &OpContext, config: &ProcessGroupConfig) -> EngineResult<()> {
        let Some(pod) = self.translator.to_pod(config)? else {
            debug!("nothing to start");
            return Ok(());
        };

        let storage = self.translator.to_storage(config);
        self.ensure_storage(ctx, &storage).await?;
        self.pods.apply(ctx, &pod).await?;
        info!("group started");
        Ok(())
    }

    /// Delete the workloads of the groups, leaving services and storage in place
    #[instrument(skip(self, ctx))]
    pub async fn stop(&self, ctx: &OpContext, namespace: &str, groups: &[String]) -> EngineResult<()> {
        if groups.is_empty() {
            return Err(EngineError::MissingArgument("groups"));
        }

        for group in groups {
            self.pods.delete_by_group(ctx, namespace, group).await?;
        }
        info!("groups stopped");
        Ok(())
    }

    /// Delete everything owned by the groups: services, workloads, claims and,
    /// when asked, the volumes backing them
    #[instrument(skip(self, ctx))]
    pub async fn destroy(
        &self,
        ctx: &OpContext,
        namespace: &str,
        groups: &[String],
        options: DestroyOptions,
    ) -> EngineResult<()> {
        if groups.is_empty() {
            return Err(EngineError::MissingArgument("groups"));
        }

        for group in groups {
            self.services.delete_by_group(ctx, namespace, group).await?;
            self.pods.delete_by_group(ctx, namespace, group).await?;
            self.claims.delete_by_group(ctx, namespace, group).await?;
            if options.remove_storage_resource {
                self.volumes.delete_by_group(ctx, namespace, group).await?;
            }
        }
        info!("groups destroyed");
        Ok(())
    }

    /// aggregate health of a group
    pub async fn status(&self, ctx: &OpContext, namespace: &str, group: &str) -> EngineResult<Health> {
        self.collector().group_health(ctx, namespace, group).await
    }

    /// Apply the volumes and claims of a group, once per kind and only for kinds
    /// with at least one missing object
    async fn ensure_storage(&self, ctx: &OpContext, storage: &GroupStorage) -> EngineResult<()> {
        if storage.is_empty() {
            return Ok(());
        }

        let mut resource_missing = false;
        for resource in &storage.resources {
            if !self
                .volumes
                .exists(ctx, &resource.model.namespace, resource.name())
                .await?
            {
                resource_missing = true;
            }
        }

        let mut claim_missing = false;
        for claim in &storage.claims {
            if !self
                .claims
                .exists(ctx, &claim.model.namespace, claim.name())
                .await?
            {
                claim_missing = true;
            }
        }

        debug!(resource_missing, claim_missing, "storage checked");
        if resource_missing {
            self.volumes.apply_all(ctx, &storage.resources).await?;
        }
        if claim_missing {
            self.claims.apply_all(ctx, &storage.claims).await?;
        }
        Ok(())
    }
}
