use tracing::instrument;

use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::node::NodeSpec;
use k8_types::core::pod::PodSpec;
use k8_types::K8Obj;

use procgroup_metadata::labels::{LabelSelector, SelectorExt};

use crate::client::ClusterClient;
use crate::context::OpContext;
use crate::error::EngineResult;

use super::{list_selected, ManagedSpec, ResourceAdapter};

/// Workloads running the processes of a group, plus the pods and nodes they run on
pub type PodAdapter<C> = ResourceAdapter<C, DeploymentSpec>;

impl ManagedSpec for DeploymentSpec {
    fn merge(_current: &Self, desired: &Self) -> Self {
        desired.clone()
    }

    fn unchanged(current: &Self, merged: &Self) -> bool {
        current == merged
    }
}

impl<C> ResourceAdapter<C, DeploymentSpec>
where
    C: ClusterClient,
{
    /// Running pods of the given groups, every pod of the namespace when `groups` is empty.
    /// An empty namespace lists pods across the cluster.
    #[instrument(skip(self, ctx))]
    pub async fn list_pods(
        &self,
        ctx: &OpContext,
        namespace: &str,
        groups: &[String],
    ) -> EngineResult<Vec<K8Obj<PodSpec>>> {
        let selectors: Vec<LabelSelector> = groups
            .iter()
            .map(|group| LabelSelector::group(group))
            .collect();
        list_selected(self.client(), ctx, namespace, &selectors).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_nodes(&self, ctx: &OpContext) -> EngineResult<Vec<K8Obj<NodeSpec>>> {
        list_selected(self.client(), ctx, "", &[]).await
    }
}

#[cfg(test)]
mod test {

    use k8_types::core::pod::{ContainerSpec, PodStatus};
    use k8_types::TemplateSpec;
    use procgroup_metadata::labels::{Model, LABEL_GROUP};

    use crate::error::EngineError;
    use crate::memory::{MemoryClient, VERB_UPDATE};
    use crate::resources::Managed;

    use super::*;

    fn deployment(image: &str, allow_update: bool) -> Managed<DeploymentSpec> {
        let model = Model::new("shop", "g1")
            .with_group("g1")
            .with_allow_update(allow_update);
        let spec = DeploymentSpec {
            replicas: Some(1),
            selector: model.selector(),
            template: TemplateSpec::new(PodSpec {
                containers: vec![ContainerSpec {
                    name: "web".to_owned(),
                    image: Some(image.to_owned()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        Managed::new(model, spec)
    }

    #[fluvio_future::test]
    async fn test_workload_update_replaces_containers() {
        let client = MemoryClient::shared();
        let adapter = PodAdapter::new(client.clone());
        let ctx = OpContext::new();

        adapter.apply(&ctx, &deployment("web:1", true)).await.expect("create");
        adapter.apply(&ctx, &deployment("web:1", true)).await.expect("same");
        assert!(client.calls_of(VERB_UPDATE).await.is_empty());

        adapter.apply(&ctx, &deployment("web:2", true)).await.expect("update");
        let stored = client
            .object::<DeploymentSpec>("shop", "g1")
            .await
            .expect("stored");
        assert_eq!(
            stored.spec.template.spec.containers[0].image.as_deref(),
            Some("web:2")
        );

        assert!(matches!(
            adapter.apply(&ctx, &deployment("web:3", false)).await,
            Err(EngineError::AlreadyExists { kind: "Deployment", .. })
        ));
    }

    #[fluvio_future::test]
    async fn test_list_pods_by_group() {
        let client = MemoryClient::shared();
        let adapter = PodAdapter::new(client.clone());
        let ctx = OpContext::new();

        for (name, group) in [("g1-abc", "g1"), ("g2-def", "g2")] {
            client
                .seed(
                    "shop",
                    name,
                    [(LABEL_GROUP.to_owned(), group.to_owned())].into(),
                    PodSpec::default(),
                    PodStatus::default(),
                )
                .await
                .expect("seed");
        }

        let pods = adapter
            .list_pods(&ctx, "shop", &["g2".to_owned()])
            .await
            .expect("list");
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].metadata.name, "g2-def");
        assert_eq!(adapter.list_pods(&ctx, "shop", &[]).await.expect("list").len(), 2);
        assert_eq!(adapter.list_pods(&ctx, "", &[]).await.expect("list").len(), 2);
    }
}
