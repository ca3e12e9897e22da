use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::{Api, Client};
use stg_models::ResourceIdentity;

/// Reads the two resources a pass works from. `Ok(None)` is not-found.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn service(
        &self,
        id: &ResourceIdentity,
    ) -> Result<Option<Service>, kube::Error>;

    async fn endpoints(
        &self,
        id: &ResourceIdentity,
    ) -> Result<Option<Endpoints>, kube::Error>;
}

#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceSource for KubeSource {
    async fn service(
        &self,
        id: &ResourceIdentity,
    ) -> Result<Option<Service>, kube::Error> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), &id.namespace);
        api.get_opt(&id.name).await
    }

    async fn endpoints(
        &self,
        id: &ResourceIdentity,
    ) -> Result<Option<Endpoints>, kube::Error> {
        let api: Api<Endpoints> =
            Api::namespaced(self.client.clone(), &id.namespace);
        api.get_opt(&id.name).await
    }
}
