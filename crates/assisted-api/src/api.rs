//! The installation API facade.

use std::future::Future;

use crate::error::ApiResult;
use crate::identity::Identity;
use crate::types::{
    Cluster, ClusterCreateParams, ClusterId, ClusterUpdateParams, CompletionParams, Credentials,
    DownloadFile, Event, Host, HostId, HostProgressUpdate, HostRegisterParams, ImageCreateParams,
    StepReply, Steps,
};

/// Typed operations against the installation service, issued as one identity.
///
/// Every implementation is bound to a single [`Identity`]; holding two
/// tenants concurrently means holding two clients. Implemented by
/// [`RestClient`](crate::RestClient) for a real service and by the simulated
/// service used in tests.
pub trait InstallerApi: Send + Sync {
    /// Identity every call is issued as.
    fn identity(&self) -> &Identity;

    /// Create a cluster.
    fn create_cluster(
        &self,
        params: &ClusterCreateParams,
    ) -> impl Future<Output = ApiResult<Cluster>> + Send;

    /// Get a cluster by id.
    fn cluster_get(&self, id: &ClusterId) -> impl Future<Output = ApiResult<Cluster>> + Send;

    /// List clusters visible to this identity.
    fn clusters_list(&self) -> impl Future<Output = ApiResult<Vec<Cluster>>> + Send;

    /// Delete a cluster.
    fn delete_cluster(&self, id: &ClusterId) -> impl Future<Output = ApiResult<()>> + Send;

    /// List a cluster's events.
    fn get_events(&self, id: &ClusterId) -> impl Future<Output = ApiResult<Vec<Event>>> + Send;

    /// Patch a cluster.
    fn update_cluster(
        &self,
        id: &ClusterId,
        params: &ClusterUpdateParams,
    ) -> impl Future<Output = ApiResult<Cluster>> + Send;

    /// Generate the discovery image.
    fn generate_image(
        &self,
        id: &ClusterId,
        params: &ImageCreateParams,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Download the generated discovery image.
    fn download_image(&self, id: &ClusterId) -> impl Future<Output = ApiResult<Vec<u8>>> + Send;

    /// List a cluster's hosts.
    fn get_hosts(&self, id: &ClusterId) -> impl Future<Output = ApiResult<Vec<Host>>> + Send;

    /// Register a host (agent call).
    fn register_host(
        &self,
        id: &ClusterId,
        params: &HostRegisterParams,
    ) -> impl Future<Output = ApiResult<Host>> + Send;

    /// Fetch the next instructions for a host (agent call).
    fn host_get_next_steps(
        &self,
        id: &ClusterId,
        host_id: &HostId,
    ) -> impl Future<Output = ApiResult<Steps>> + Send;

    /// Post the result of a step (agent call).
    fn host_post_step_result(
        &self,
        id: &ClusterId,
        host_id: &HostId,
        reply: &StepReply,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Report host installation progress (agent call).
    fn update_host_install_progress(
        &self,
        id: &ClusterId,
        host_id: &HostId,
        progress: &HostProgressUpdate,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Start installing a cluster.
    fn install_cluster(&self, id: &ClusterId) -> impl Future<Output = ApiResult<Cluster>> + Send;

    /// Cancel a running installation.
    fn cancel_installation(
        &self,
        id: &ClusterId,
    ) -> impl Future<Output = ApiResult<Cluster>> + Send;

    /// Report installation completion.
    fn complete_installation(
        &self,
        id: &ClusterId,
        params: &CompletionParams,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Download one of the cluster's generated files.
    fn download_cluster_file(
        &self,
        id: &ClusterId,
        file: DownloadFile,
    ) -> impl Future<Output = ApiResult<Vec<u8>>> + Send;

    /// Get the rendered install-config.
    fn get_install_config(&self, id: &ClusterId) -> impl Future<Output = ApiResult<String>> + Send;

    /// Get the admin credentials of an installed cluster.
    fn get_credentials(
        &self,
        id: &ClusterId,
    ) -> impl Future<Output = ApiResult<Credentials>> + Send;
}
