use async_trait::async_trait;
use k8s_openapi::api::{apps::v1::StatefulSet, core::v1::Service};
use kube::{
    Api, Client, ResourceExt,
    api::{Patch, PatchParams, PostParams},
};
#[cfg(test)]
use mockall::automock;
use serde_json::json;

use crate::{
    MadaraChain,
    crd::MadaraChainStatus,
    reconcilier::Error,
};

/// Cluster access needed by the reconciler.
///
/// Getters return `Ok(None)` when the object does not exist. Replacements
/// send the live `resourceVersion`, so a concurrent write fails with a
/// conflict instead of being merged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_chain(&self, namespace: &str, name: &str) -> Result<Option<MadaraChain>, Error>;

    async fn get_statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error>;

    async fn create_statefulset(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, Error>;

    async fn replace_statefulset(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, Error>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    async fn create_service(&self, namespace: &str, svc: &Service) -> Result<Service, Error>;

    async fn replace_service(&self, namespace: &str, svc: &Service) -> Result<Service, Error>;

    /// Writes the status subresource only, guarded by the chain's `resourceVersion`.
    async fn patch_chain_status(
        &self,
        chain: &MadaraChain,
        status: &MadaraChainStatus,
    ) -> Result<(), Error>;
}

pub struct KubeChainClient {
    client: Client,
}

impl KubeChainClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainClient for KubeChainClient {
    async fn get_chain(&self, namespace: &str, name: &str) -> Result<Option<MadaraChain>, Error> {
        let api = Api::<MadaraChain>::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error> {
        let api = Api::<StatefulSet>::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_statefulset(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, Error> {
        let api = Api::<StatefulSet>::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), sts).await?)
    }

    async fn replace_statefulset(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, Error> {
        let api = Api::<StatefulSet>::namespaced(self.client.clone(), namespace);
        Ok(api
            .replace(&sts.name_any(), &PostParams::default(), sts)
            .await?)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        let api = Api::<Service>::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_service(&self, namespace: &str, svc: &Service) -> Result<Service, Error> {
        let api = Api::<Service>::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), svc).await?)
    }

    async fn replace_service(&self, namespace: &str, svc: &Service) -> Result<Service, Error> {
        let api = Api::<Service>::namespaced(self.client.clone(), namespace);
        Ok(api
            .replace(&svc.name_any(), &PostParams::default(), svc)
            .await?)
    }

    async fn patch_chain_status(
        &self,
        chain: &MadaraChain,
        status: &MadaraChainStatus,
    ) -> Result<(), Error> {
        let namespace = chain
            .namespace()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let api = Api::<MadaraChain>::namespaced(self.client.clone(), &namespace);

        // A resourceVersion in a merge patch acts as a precondition.
        let patch = json!({
            "metadata": { "resourceVersion": chain.resource_version() },
            "status": status,
        });

        api.patch_status(
            &chain.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }
}
