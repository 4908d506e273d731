use k8_types::core::namespace::NamespaceSpec;

use super::{ManagedSpec, ResourceAdapter};

pub type NamespaceAdapter<C> = ResourceAdapter<C, NamespaceSpec>;

/// Namespaces only carry labels, an update refreshes them
impl ManagedSpec for NamespaceSpec {
    fn merge(current: &Self, _desired: &Self) -> Self {
        current.clone()
    }

    fn unchanged(_current: &Self, _merged: &Self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {

    use procgroup_metadata::labels::Model;

    use crate::context::OpContext;
    use crate::memory::{MemoryClient, VERB_CREATE, VERB_UPDATE};
    use crate::resources::Managed;

    use super::*;

    fn namespace(name: &str, owner: &str) -> Managed<NamespaceSpec> {
        let model = Model::new(name, name)
            .with_group("g1")
            .with_owner(owner)
            .with_allow_update(true);
        Managed::new(model, NamespaceSpec::default())
    }

    #[fluvio_future::test]
    async fn test_namespace_is_cluster_scoped() {
        let client = MemoryClient::shared();
        let adapter = NamespaceAdapter::new(client.clone());
        let ctx = OpContext::new();

        adapter.ensure(&ctx, &namespace("shop", "a")).await.expect("ensure");
        assert!(client.object::<NamespaceSpec>("", "shop").await.is_some());
        assert!(adapter.exists(&ctx, "shop", "shop").await.expect("exists"));

        adapter.apply(&ctx, &namespace("shop", "a")).await.expect("apply");
        assert!(client.calls_of(VERB_UPDATE).await.is_empty());

        adapter.apply(&ctx, &namespace("shop", "b")).await.expect("apply");
        assert_eq!(client.calls_of(VERB_UPDATE).await.len(), 1);
        assert_eq!(client.calls_of(VERB_CREATE).await.len(), 1);

        let stored = client
            .object::<NamespaceSpec>("", "shop")
            .await
            .expect("stored");
        let owner = stored
            .metadata
            .labels
            .get(procgroup_metadata::labels::LABEL_OWNER)
            .cloned();
        assert_eq!(owner.as_deref(), Some("b"));
    }
}
