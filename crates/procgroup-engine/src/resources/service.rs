use k8_types::core::service::ServiceSpec;

use super::{ManagedSpec, ResourceAdapter};

pub type ServiceAdapter<C> = ResourceAdapter<C, ServiceSpec>;

impl ManagedSpec for ServiceSpec {
    /// addresses are assigned by the platform and kept
    fn merge(current: &Self, desired: &Self) -> Self {
        Self {
            r#type: desired.r#type.clone(),
            selector: desired.selector.clone(),
            ports: desired.ports.clone(),
            ..current.clone()
        }
    }

    fn unchanged(current: &Self, merged: &Self) -> bool {
        current == merged
    }
}

#[cfg(test)]
mod test {

    use k8_types::core::service::ServicePort;
    use procgroup_metadata::labels::{Model, LABEL_GROUP};

    use crate::context::OpContext;
    use crate::error::EngineError;
    use crate::memory::{
        MemoryClient, VERB_CREATE, VERB_DELETE, VERB_DELETE_COLLECTION, VERB_UPDATE,
    };
    use crate::resources::Managed;

    use super::*;

    fn service(name: &str, group: &str, port: u16) -> Managed<ServiceSpec> {
        let spec = ServiceSpec {
            selector: Some([(LABEL_GROUP.to_owned(), group.to_owned())].into()),
            ports: vec![ServicePort {
                port,
                ..Default::default()
            }],
            ..Default::default()
        };
        Managed::new(
            Model::new("shop", name)
                .with_group(group)
                .with_allow_update(true),
            spec,
        )
    }

    #[fluvio_future::test]
    async fn test_update_keeps_cluster_ip() {
        let client = MemoryClient::shared();
        let adapter = ServiceAdapter::new(client.clone());
        let ctx = OpContext::new();

        let mut seeded = service("svc1", "g1", 80);
        seeded.spec.cluster_ip = "10.96.0.10".to_owned();
        client
            .seed(
                "shop",
                "svc1",
                seeded.model.labels(),
                seeded.spec,
                Default::default(),
            )
            .await
            .expect("seed");

        adapter.apply(&ctx, &service("svc1", "g1", 8080)).await.expect("apply");

        let stored = client
            .object::<ServiceSpec>("shop", "svc1")
            .await
            .expect("stored");
        assert_eq!(stored.spec.ports[0].port, 8080);
        assert_eq!(stored.spec.cluster_ip, "10.96.0.10");
        assert_eq!(client.calls_of(VERB_UPDATE).await.len(), 1);
    }

    #[fluvio_future::test]
    async fn test_list_union_of_groups() {
        let client = MemoryClient::shared();
        let adapter = ServiceAdapter::new(client.clone());
        let ctx = OpContext::new();

        for (name, group) in [("a", "g1"), ("b", "g2"), ("c", "g3")] {
            adapter.ensure(&ctx, &service(name, group, 80)).await.expect("ensure");
        }
        assert_eq!(client.calls_of(VERB_CREATE).await.len(), 3);

        let all = adapter.list(&ctx, "shop", &[]).await.expect("list");
        assert_eq!(all.len(), 3);

        let groups = ["g1".to_owned(), "g3".to_owned()];
        let selected = adapter.list(&ctx, "shop", &groups).await.expect("list");
        let names: Vec<&str> = selected
            .iter()
            .map(|service| service.metadata.name.as_str())
            .collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[fluvio_future::test]
    async fn test_list_short_circuits_on_failure() {
        let client = MemoryClient::shared();
        let adapter = ServiceAdapter::new(client.clone());
        let ctx = OpContext::new();

        client.fail_on("list", "Service").await;
        let groups = ["g1".to_owned(), "g2".to_owned()];
        let result = adapter.list(&ctx, "shop", &groups).await;
        assert!(matches!(
            result,
            Err(EngineError::RemoteFailure { operation: "list", .. })
        ));
        assert_eq!(client.calls().await.len(), 1);
    }

    #[fluvio_future::test]
    async fn test_cancelled_context_skips_call() {
        let client = MemoryClient::shared();
        let adapter = ServiceAdapter::new(client.clone());
        let ctx = OpContext::new();
        ctx.cancel();

        let result = adapter.ensure(&ctx, &service("a", "g1", 80)).await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(client.calls().await.is_empty());
    }

    #[fluvio_future::test]
    async fn test_delete_absent_is_noop() {
        let client = MemoryClient::shared();
        let adapter = ServiceAdapter::new(client.clone());
        let ctx = OpContext::new();

        adapter.delete(&ctx, "shop", "missing").await.expect("noop");
        assert_eq!(
            adapter.delete_by_group(&ctx, "shop", "g1").await.expect("noop"),
            0
        );
        assert!(client.calls_of(VERB_DELETE_COLLECTION).await.is_empty());
    }

    #[fluvio_future::test]
    async fn test_delete_by_group_is_one_collection_call() {
        let client = MemoryClient::shared();
        let adapter = ServiceAdapter::new(client.clone());
        let ctx = OpContext::new();

        for (name, group) in [("a", "g1"), ("b", "g1"), ("c", "g2")] {
            adapter.ensure(&ctx, &service(name, group, 80)).await.expect("ensure");
        }

        let deleted = adapter.delete_by_group(&ctx, "shop", "g1").await.expect("delete");
        assert_eq!(deleted, 2);
        assert_eq!(client.count::<ServiceSpec>().await, 1);
        assert_eq!(client.calls_of(VERB_DELETE_COLLECTION).await.len(), 1);
        assert!(client.calls_of(VERB_DELETE).await.is_empty());
    }
}
