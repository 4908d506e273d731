//!
//! # Resource adapters
//!
//! One adapter per managed kind. They share the same contract (exists, apply, ensure,
//! delete, delete by group, list); kind specific behavior is described by [`ManagedSpec`].
//!
mod namespace;
mod storage;
mod service;
mod pod;

pub use namespace::NamespaceAdapter;
pub use storage::{StorageAdapter, StorageResourceAdapter};
pub use service::ServiceAdapter;
pub use pod::PodAdapter;

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace};

use k8_types::{InputK8Obj, InputObjectMeta, K8Obj, LabelSelector, Spec};

use procgroup_metadata::labels::{Labels, Model, SelectorExt};

use crate::client::ClusterClient;
use crate::context::OpContext;
use crate::error::{EngineError, EngineResult};

/// Kind specific behavior of a managed resource
pub trait ManagedSpec: Spec {
    /// whether an update replaces the labels of the current object
    const REPLACE_LABELS: bool = true;

    /// spec to write back when `desired` is applied over `current`
    fn merge(current: &Self, desired: &Self) -> Self;

    /// true when writing `merged` would not change `current`
    fn unchanged(current: &Self, merged: &Self) -> bool;

    /// selector matching every object of `group` owned by `namespace`
    fn group_selector(_namespace: &str, group: &str) -> LabelSelector {
        LabelSelector::group(group)
    }
}

/// Desired object: ownership model plus spec
#[derive(Debug, Clone)]
pub struct Managed<S> {
    pub model: Model,
    pub spec: S,
}

impl<S> Managed<S>
where
    S: ManagedSpec,
{
    pub fn new(model: Model, spec: S) -> Self {
        Self { model, spec }
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// namespace the object is addressed in, empty for cluster scoped kinds
    pub fn namespace(&self) -> &str {
        scoped::<S>(&self.model.namespace)
    }

    pub fn as_input(&self) -> InputK8Obj<S> {
        InputK8Obj::new(
            self.spec.clone(),
            InputObjectMeta {
                name: self.model.name.clone(),
                namespace: self.namespace().to_owned(),
                labels: self.model.labels().into_iter().collect(),
                ..Default::default()
            },
        )
    }
}

fn scoped<S: Spec>(namespace: &str) -> &str {
    if S::NAME_SPACED { namespace } else { "" }
}

pub(crate) fn object_labels<S: Spec>(object: &K8Obj<S>) -> Labels {
    object
        .metadata
        .labels
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// List objects of any kind matching one of `selectors`, deduplicated by name.
/// No selector lists the whole namespace.
pub(crate) async fn list_selected<C, T>(
    client: &C,
    ctx: &OpContext,
    namespace: &str,
    selectors: &[LabelSelector],
) -> EngineResult<Vec<K8Obj<T>>>
where
    C: ClusterClient,
    T: Spec,
{
    if selectors.is_empty() {
        return ctx
            .race(client.list::<T>(namespace, None))
            .await?
            .map_err(|source| EngineError::remote("list", T::label(), namespace, source));
    }

    let mut seen = BTreeSet::new();
    let mut objects = vec![];
    for selector in selectors {
        let selected = ctx
            .race(client.list::<T>(namespace, Some(selector)))
            .await?
            .map_err(|source| {
                EngineError::remote("list", T::label(), selector.to_query(), source)
            })?;

        for object in selected {
            if seen.insert(object.metadata.name.clone()) {
                objects.push(object);
            }
        }
    }
    Ok(objects)
}

/// CRUD of one managed kind on behalf of the engine
pub struct ResourceAdapter<C, S> {
    client: Arc<C>,
    data: PhantomData<S>,
}

impl<C, S> Clone for ResourceAdapter<C, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            data: PhantomData,
        }
    }
}

impl<C, S> ResourceAdapter<C, S>
where
    C: ClusterClient,
    S: ManagedSpec,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            data: PhantomData,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// current object, `None` if absent
    pub async fn fetch(
        &self,
        ctx: &OpContext,
        namespace: &str,
        name: &str,
    ) -> EngineResult<Option<K8Obj<S>>> {
        match ctx
            .race(self.client.get::<S>(scoped::<S>(namespace), name))
            .await?
        {
            Ok(object) => Ok(Some(object)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(source) => Err(EngineError::remote("get", S::label(), name, source)),
        }
    }

    pub async fn exists(&self, ctx: &OpContext, namespace: &str, name: &str) -> EngineResult<bool> {
        Ok(self.fetch(ctx, namespace, name).await?.is_some())
    }

    /// Create the object, or update it when the desired state allows it
    #[instrument(skip(self, ctx, desired), fields(kind = S::label(), name = %desired.name()))]
    pub async fn apply(&self, ctx: &OpContext, desired: &Managed<S>) -> EngineResult<()> {
        match self.fetch(ctx, &desired.model.namespace, desired.name()).await? {
            Some(_) if !desired.model.allow_update => Err(EngineError::AlreadyExists {
                kind: S::label(),
                name: desired.name().to_owned(),
            }),
            Some(current) => self.update_from(ctx, current, desired).await,
            None => self.create(ctx, desired).await,
        }
    }

    /// Create the object unless it already exists
    #[instrument(skip(self, ctx, desired), fields(kind = S::label(), name = %desired.name()))]
    pub async fn ensure(&self, ctx: &OpContext, desired: &Managed<S>) -> EngineResult<()> {
        if self
            .exists(ctx, &desired.model.namespace, desired.name())
            .await?
        {
            debug!("already present");
            return Ok(());
        }
        self.create(ctx, desired).await
    }

    /// Apply a batch: absent objects are created, present ones merged regardless of
    /// their update flag
    #[instrument(skip(self, ctx, batch), fields(kind = S::label(), count = batch.len()))]
    pub async fn apply_all(&self, ctx: &OpContext, batch: &[Managed<S>]) -> EngineResult<()> {
        for desired in batch {
            match self.fetch(ctx, &desired.model.namespace, desired.name()).await? {
                Some(current) => self.update_from(ctx, current, desired).await?,
                None => self.create(ctx, desired).await?,
            }
        }
        Ok(())
    }

    /// Delete a single object, absent objects are ignored
    #[instrument(skip(self, ctx), fields(kind = S::label()))]
    pub async fn delete(&self, ctx: &OpContext, namespace: &str, name: &str) -> EngineResult<()> {
        match ctx
            .race(self.client.delete::<S>(scoped::<S>(namespace), name))
            .await?
        {
            Ok(()) => {
                info!("deleted");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!("already gone");
                Ok(())
            }
            Err(source) => Err(EngineError::remote("delete", S::label(), name, source)),
        }
    }

    /// Delete every object of a group in one collection delete, returns how many
    /// objects were deleted. Nothing is sent when the group has no object.
    #[instrument(skip(self, ctx), fields(kind = S::label()))]
    pub async fn delete_by_group(
        &self,
        ctx: &OpContext,
        namespace: &str,
        group: &str,
    ) -> EngineResult<usize> {
        let selector = S::group_selector(namespace, group);
        let namespace = scoped::<S>(namespace);
        let objects = list_selected::<C, S>(
            &self.client,
            ctx,
            namespace,
            std::slice::from_ref(&selector),
        )
        .await?;
        if objects.is_empty() {
            debug!("group has no object");
            return Ok(0);
        }

        let deleted = ctx
            .race(self.client.delete_collection::<S>(namespace, &selector))
            .await?
            .map_err(|source| {
                EngineError::remote("delete", S::label(), selector.to_query(), source)
            })?;
        info!(count = deleted, "group deleted");
        Ok(deleted)
    }

    /// Objects of the given groups, everything in the namespace when `groups` is empty
    #[instrument(skip(self, ctx), fields(kind = S::label()))]
    pub async fn list(
        &self,
        ctx: &OpContext,
        namespace: &str,
        groups: &[String],
    ) -> EngineResult<Vec<K8Obj<S>>> {
        let selectors: Vec<LabelSelector> = groups
            .iter()
            .map(|group| S::group_selector(namespace, group))
            .collect();
        list_selected::<C, S>(&self.client, ctx, scoped::<S>(namespace), &selectors).await
    }

    async fn create(&self, ctx: &OpContext, desired: &Managed<S>) -> EngineResult<()> {
        let input = desired.as_input();
        trace!(?input, "creating");
        ctx.race(self.client.create(input))
            .await?
            .map_err(|source| EngineError::remote("create", S::label(), desired.name(), source))?;
        info!(name = %desired.name(), kind = S::label(), "created");
        Ok(())
    }

    async fn update_from(
        &self,
        ctx: &OpContext,
        current: K8Obj<S>,
        desired: &Managed<S>,
    ) -> EngineResult<()> {
        let spec = S::merge(&current.spec, &desired.spec);
        let current_labels = object_labels(&current);
        let labels = if S::REPLACE_LABELS {
            desired.model.labels()
        } else {
            current_labels.clone()
        };

        if S::unchanged(&current.spec, &spec) && labels == current_labels {
            debug!(name = %desired.name(), kind = S::label(), "up to date, skipping update");
            return Ok(());
        }

        let mut next = current;
        next.spec = spec;
        next.metadata.labels = labels.into_iter().collect();
        trace!(?next, "updating");

        ctx.race(self.client.update(next))
            .await?
            .map_err(|source| EngineError::remote("update", S::label(), desired.name(), source))?;
        info!(name = %desired.name(), kind = S::label(), "updated");
        Ok(())
    }
}
