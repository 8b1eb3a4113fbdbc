//! [`InstallerApi`] bound to the simulated service.

use assisted_api::{
    ApiResult, Cluster, ClusterCreateParams, ClusterId, ClusterUpdateParams, CompletionParams,
    Credentials, DownloadFile, Event, Host, HostId, HostProgressUpdate, HostRegisterParams,
    Identity, ImageCreateParams, InstallerApi, StepReply, Steps,
};

use crate::service::SimService;

/// A client of [`SimService`] issuing every call as one identity.
#[derive(Debug, Clone)]
pub struct SimClient {
    service: SimService,
    identity: Identity,
}

impl SimClient {
    pub(crate) fn new(service: SimService, identity: Identity) -> Self {
        Self { service, identity }
    }

    /// The service this client talks to.
    #[must_use]
    pub fn service(&self) -> &SimService {
        &self.service
    }
}

impl InstallerApi for SimClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn create_cluster(&self, params: &ClusterCreateParams) -> ApiResult<Cluster> {
        self.service.create_cluster(&self.identity, params)
    }

    async fn cluster_get(&self, id: &ClusterId) -> ApiResult<Cluster> {
        self.service.cluster_get(&self.identity, id)
    }

    async fn clusters_list(&self) -> ApiResult<Vec<Cluster>> {
        self.service.clusters_list(&self.identity)
    }

    async fn delete_cluster(&self, id: &ClusterId) -> ApiResult<()> {
        self.service.delete_cluster(&self.identity, id)
    }

    async fn get_events(&self, id: &ClusterId) -> ApiResult<Vec<Event>> {
        self.service.get_events(&self.identity, id)
    }

    async fn update_cluster(&self, id: &ClusterId, params: &ClusterUpdateParams) -> ApiResult<Cluster> {
        self.service.update_cluster(&self.identity, id, params)
    }

    async fn generate_image(&self, id: &ClusterId, params: &ImageCreateParams) -> ApiResult<()> {
        self.service.generate_image(&self.identity, id, params)
    }

    async fn download_image(&self, id: &ClusterId) -> ApiResult<Vec<u8>> {
        self.service.download_image(&self.identity, id)
    }

    async fn get_hosts(&self, id: &ClusterId) -> ApiResult<Vec<Host>> {
        self.service.get_hosts(&self.identity, id)
    }

    async fn register_host(&self, id: &ClusterId, params: &HostRegisterParams) -> ApiResult<Host> {
        self.service.register_host(&self.identity, id, params)
    }

    async fn host_get_next_steps(&self, id: &ClusterId, host_id: &HostId) -> ApiResult<Steps> {
        self.service.host_get_next_steps(&self.identity, id, host_id)
    }

    async fn host_post_step_result(
        &self,
        id: &ClusterId,
        host_id: &HostId,
        reply: &StepReply,
    ) -> ApiResult<()> {
        self.service
            .host_post_step_result(&self.identity, id, host_id, reply)
    }

    async fn update_host_install_progress(
        &self,
        id: &ClusterId,
        host_id: &HostId,
        progress: &HostProgressUpdate,
    ) -> ApiResult<()> {
        self.service
            .update_host_install_progress(&self.identity, id, host_id, progress)
    }

    async fn install_cluster(&self, id: &ClusterId) -> ApiResult<Cluster> {
        self.service.install_cluster(&self.identity, id)
    }

    async fn cancel_installation(&self, id: &ClusterId) -> ApiResult<Cluster> {
        self.service.cancel_installation(&self.identity, id)
    }

    async fn complete_installation(&self, id: &ClusterId, params: &CompletionParams) -> ApiResult<()> {
        self.service.complete_installation(&self.identity, id, params)
    }

    async fn download_cluster_file(&self, id: &ClusterId, file: DownloadFile) -> ApiResult<Vec<u8>> {
        self.service.download_cluster_file(&self.identity, id, file)
    }

    async fn get_install_config(&self, id: &ClusterId) -> ApiResult<String> {
        self.service.get_install_config(&self.identity, id)
    }

    async fn get_credentials(&self, id: &ClusterId) -> ApiResult<Credentials> {
        self.service.get_credentials(&self.identity, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_issues_calls_as_its_identity() {
        let service = SimService::default();
        let owner = service.client(Identity::user("user1", "t1", "ps1"));
        let other = service.client(Identity::user("user2", "t2", "ps2"));

        let cluster = owner
            .create_cluster(&ClusterCreateParams {
                name: "c1".into(),
                openshift_version: "4.6".into(),
                pull_secret: "ps1".into(),
                ssh_public_key: String::new(),
                base_dns_domain: "redhat.com".into(),
                vip_dhcp_allocation: true,
            })
            .await
            .unwrap();

        assert_eq!(owner.identity().name(), "user1");
        assert_eq!(owner.clusters_list().await.unwrap().len(), 1);
        assert!(other.cluster_get(&cluster.id).await.unwrap_err().is_not_found());
        assert!(other.delete_cluster(&cluster.id).await.unwrap_err().is_not_found());
        owner.delete_cluster(&cluster.id).await.unwrap();
        assert_eq!(owner.service().cluster_count(), 0);
    }
}
