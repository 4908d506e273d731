//!
//! # In-memory cluster
//!
//! [`MemoryClient`] keeps objects as JSON values, one store per kind, and records every
//! call so tests can assert on ordering. Failures can be injected per verb and kind.
//!
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use k8_types::{InputK8Obj, K8Obj, LabelSelector, Spec};

use procgroup_metadata::labels::{Labels, SelectorExt};

use crate::client::{ClientError, ClusterClient, MetricsClient, PodMetrics};

pub const VERB_GET: &str = "get";
pub const VERB_LIST: &str = "list";
pub const VERB_CREATE: &str = "create";
pub const VERB_UPDATE: &str = "update";
pub const VERB_DELETE: &str = "delete";
pub const VERB_DELETE_COLLECTION: &str = "delete_collection";

/// One recorded client call
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Call {
    pub verb: &'static str,
    pub kind: String,
    /// object name, or rendered selector for collection calls
    pub name: String,
}

impl Call {
    pub fn is(&self, verb: &str, kind: &str) -> bool {
        self.verb == verb && self.kind == kind
    }
}

type SpecStore = BTreeMap<String, Value>;

#[derive(Debug, Default)]
pub struct MemoryClient {
    stores: RwLock<BTreeMap<String, SpecStore>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<BTreeSet<(String, String)>>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

fn injected(verb: &str, kind: &str) -> ClientError {
    ClientError::Api {
        code: 500,
        message: format!("injected failure on {verb} {kind}"),
    }
}

impl MemoryClient {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// every call recorded so far, in order
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// recorded calls with the given verb, in order
    pub async fn calls_of(&self, verb: &str) -> Vec<Call> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.verb == verb)
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// make every following `verb` on `kind` fail
    pub async fn fail_on(&self, verb: &str, kind: &str) {
        self.failures
            .lock()
            .await
            .insert((verb.to_owned(), kind.to_owned()));
    }

    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    /// seed an object without recording a call
    pub async fn seed<S: Spec>(
        &self,
        namespace: &str,
        name: &str,
        labels: Labels,
        spec: S,
        status: S::Status,
    ) -> Result<(), ClientError> {
        let value = Self::to_object::<S>(namespace, name, &labels, &spec, &status)?;
        self.stores
            .write()
            .await
            .entry(S::kind())
            .or_default()
            .insert(key(namespace, name), value);
        Ok(())
    }

    /// read an object without recording a call
    pub async fn object<S: Spec>(&self, namespace: &str, name: &str) -> Option<K8Obj<S>> {
        let stores = self.stores.read().await;
        let value = stores.get(&S::kind())?.get(&key(namespace, name))?.clone();
        drop(stores);
        serde_json::from_value(value).ok()
    }

    /// number of stored objects of a kind
    pub async fn count<S: Spec>(&self) -> usize {
        self.stores
            .read()
            .await
            .get(&S::kind())
            .map(BTreeMap::len)
            .unwrap_or_default()
    }

    fn to_object<S: Spec>(
        namespace: &str,
        name: &str,
        labels: &Labels,
        spec: &S,
        status: &S::Status,
    ) -> Result<Value, ClientError> {
        let mut metadata = Map::new();
        metadata.insert("name".to_owned(), Value::String(name.to_owned()));
        if !namespace.is_empty() {
            metadata.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
        }
        metadata.insert("labels".to_owned(), serde_json::to_value(labels)?);

        let mut object = Map::new();
        object.insert("apiVersion".to_owned(), Value::String(S::api_version()));
        object.insert("kind".to_owned(), Value::String(S::kind()));
        object.insert("metadata".to_owned(), Value::Object(metadata));
        object.insert("spec".to_owned(), serde_json::to_value(spec)?);
        object.insert("status".to_owned(), serde_json::to_value(status)?);
        Ok(Value::Object(object))
    }

    async fn record<S: Spec>(&self, verb: &'static str, name: &str) -> Result<(), ClientError> {
        let kind = S::kind();
        trace!(verb, %kind, name, "memory call");
        self.calls.lock().await.push(Call {
            verb,
            kind: kind.clone(),
            name: name.to_owned(),
        });

        if self
            .failures
            .lock()
            .await
            .contains(&(verb.to_owned(), kind.clone()))
        {
            return Err(injected(verb, &kind));
        }
        Ok(())
    }

    async fn select<S: Spec>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<(String, K8Obj<S>)>, ClientError> {
        let stores = self.stores.read().await;
        let Some(store) = stores.get(&S::kind()) else {
            return Ok(vec![]);
        };

        let mut selected = vec![];
        for (store_key, value) in store {
            let object: K8Obj<S> = serde_json::from_value(value.clone())?;
            if !namespace.is_empty() && object.metadata.namespace != namespace {
                continue;
            }
            if let Some(selector) = selector {
                if !selector.matches(object.metadata.labels.iter()) {
                    continue;
                }
            }
            selected.push((store_key.clone(), object));
        }
        Ok(selected)
    }
}

#[async_trait]
impl ClusterClient for MemoryClient {
    async fn get<S: Spec>(&self, namespace: &str, name: &str) -> Result<K8Obj<S>, ClientError> {
        self.record::<S>(VERB_GET, name).await?;
        self.object::<S>(namespace, name)
            .await
            .ok_or_else(|| ClientError::not_found(S::kind(), name))
    }

    async fn list<S: Spec>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<K8Obj<S>>, ClientError> {
        let rendered = selector.map(SelectorExt::to_query).unwrap_or_default();
        self.record::<S>(VERB_LIST, &rendered).await?;
        Ok(self
            .select::<S>(namespace, selector)
            .await?
            .into_iter()
            .map(|(_, object)| object)
            .collect())
    }

    async fn create<S: Spec>(&self, input: InputK8Obj<S>) -> Result<K8Obj<S>, ClientError> {
        let metadata = input.metadata;
        let namespace = metadata.namespace;
        let name = metadata.name;
        self.record::<S>(VERB_CREATE, &name).await?;

        let labels: Labels = metadata.labels.into_iter().collect();
        let value = Self::to_object::<S>(
            &namespace,
            &name,
            &labels,
            &input.spec,
            &S::Status::default(),
        )?;

        let mut stores = self.stores.write().await;
        let store = stores.entry(S::kind()).or_default();
        let store_key = key(&namespace, &name);
        if store.contains_key(&store_key) {
            return Err(ClientError::Api {
                code: 409,
                message: format!("{} {name} already exists", S::kind()),
            });
        }
        debug!(%store_key, "memory create");
        store.insert(store_key, value.clone());
        drop(stores);

        Ok(serde_json::from_value(value)?)
    }

    async fn update<S: Spec>(&self, object: K8Obj<S>) -> Result<K8Obj<S>, ClientError> {
        let name = object.metadata.name.clone();
        self.record::<S>(VERB_UPDATE, &name).await?;

        let store_key = key(&object.metadata.namespace, &name);
        let value = serde_json::to_value(&object)?;

        let mut stores = self.stores.write().await;
        let slot = stores
            .get_mut(&S::kind())
            .and_then(|store| store.get_mut(&store_key))
            .ok_or_else(|| ClientError::not_found(S::kind(), &name))?;
        *slot = value;
        Ok(object)
    }

    async fn delete<S: Spec>(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.record::<S>(VERB_DELETE, name).await?;
        self.stores
            .write()
            .await
            .get_mut(&S::kind())
            .and_then(|store| store.remove(&key(namespace, name)))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(S::kind(), name))
    }

    async fn delete_collection<S: Spec>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<usize, ClientError> {
        self.record::<S>(VERB_DELETE_COLLECTION, &selector.to_query())
            .await?;

        let selected = self.select::<S>(namespace, Some(selector)).await?;
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get_mut(&S::kind()) else {
            return Ok(0);
        };
        for (store_key, _) in &selected {
            store.remove(store_key);
        }
        Ok(selected.len())
    }
}

/// Metrics source serving fixed samples per namespace
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    samples: RwLock<BTreeMap<String, Vec<PodMetrics>>>,
    failing: AtomicBool,
}

impl MemoryMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, namespace: &str, metrics: PodMetrics) {
        self.samples
            .write()
            .await
            .entry(namespace.to_owned())
            .or_default()
            .push(metrics);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetricsClient for MemoryMetrics {
    async fn list(&self, namespace: &str) -> Result<Vec<PodMetrics>, ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Other("metrics unavailable".to_owned()));
        }
        Ok(self
            .samples
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod test {

    use k8_types::core::service::ServiceSpec;
    use k8_types::InputObjectMeta;
    use procgroup_metadata::labels::LABEL_GROUP;

    use super::*;

    fn input(name: &str, group: &str) -> InputK8Obj<ServiceSpec> {
        let labels: Labels = [(LABEL_GROUP.to_owned(), group.to_owned())].into();
        InputK8Obj::new(
            ServiceSpec::default(),
            InputObjectMeta {
                name: name.to_owned(),
                namespace: "ns".to_owned(),
                labels: labels.into_iter().collect(),
                ..Default::default()
            },
        )
    }

    #[fluvio_future::test]
    async fn test_crud_and_selection() {
        let client = MemoryClient::default();
        client.create(input("a", "g1")).await.expect("create");
        client.create(input("b", "g2")).await.expect("create");

        assert!(client.create(input("a", "g1")).await.is_err());

        let fetched: K8Obj<ServiceSpec> = client.get("ns", "a").await.expect("get");
        assert_eq!(fetched.metadata.name, "a");

        let selected: Vec<K8Obj<ServiceSpec>> = client
            .list("ns", Some(&LabelSelector::group("g2")))
            .await
            .expect("list");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].metadata.name, "b");

        let other: Vec<K8Obj<ServiceSpec>> = client.list("other", None).await.expect("list");
        assert!(other.is_empty());

        let deleted = client
            .delete_collection::<ServiceSpec>("ns", &LabelSelector::group("g1"))
            .await
            .expect("delete");
        assert_eq!(deleted, 1);
        assert_eq!(client.count::<ServiceSpec>().await, 1);

        let missing = client.get::<ServiceSpec>("ns", "a").await;
        assert!(matches!(missing, Err(err) if err.is_not_found()));
    }

    #[fluvio_future::test]
    async fn test_call_log_and_failures() {
        let client = MemoryClient::default();
        client.fail_on(VERB_CREATE, "Service").await;
        assert!(client.create(input("a", "g1")).await.is_err());
        assert_eq!(client.count::<ServiceSpec>().await, 0);

        client.clear_failures().await;
        client.create(input("a", "g1")).await.expect("create");

        let calls = client.calls().await;
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|call| call.is(VERB_CREATE, "Service")));
    }
}
