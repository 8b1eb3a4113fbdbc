//! REST implementation of [`InstallerApi`].
//!
//! # Example
//!
//! ```rust,no_run
//! use assisted_api::{ClientOptions, Identity, InstallerApi, RestClient};
//!
//! # async fn example() -> Result<(), assisted_api::ApiError> {
//! let identity = Identity::user("user1", "offline-token", "{\"auths\":{}}");
//! let client = RestClient::connect("http://localhost:8090", identity, ClientOptions::default()).await?;
//! let clusters = client.clusters_list().await?;
//! println!("clusters: {}", clusters.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};
use url::Url;

use crate::api::InstallerApi;
use crate::auth::{
    AGENT_AUTH_HEADER, Credential, DEFAULT_SSO_URL, agent_key_from_pull_secret,
    exchange_offline_token,
};
use crate::error::{ApiError, ApiResult};
use crate::identity::Identity;
use crate::types::{
    Cluster, ClusterCreateParams, ClusterId, ClusterUpdateParams, CompletionParams, Credentials,
    DownloadFile, Event, Host, HostId, HostProgressUpdate, HostRegisterParams, ImageCreateParams,
    StepReply, Steps,
};

/// Path prefix of every API endpoint.
pub const API_PREFIX: &str = "api/assisted-install/v1/";

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time to wait for the API to answer at connect time.
const DEFAULT_API_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default pause between readiness probes.
const DEFAULT_API_READY_INTERVAL: Duration = Duration::from_secs(5);

/// Options for [`RestClient::connect`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Poll the API until it answers before returning the client.
    pub wait_for_api: bool,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// How long to wait for the API when `wait_for_api` is set.
    pub api_ready_timeout: Duration,
    /// Pause between readiness probes.
    pub api_ready_interval: Duration,
    /// SSO token endpoint for the offline token exchange.
    pub sso_url: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            wait_for_api: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            api_ready_timeout: DEFAULT_API_READY_TIMEOUT,
            api_ready_interval: DEFAULT_API_READY_INTERVAL,
            sso_url: DEFAULT_SSO_URL.to_string(),
        }
    }
}

impl ClientOptions {
    /// Skip the readiness pre-check (used for agent identities).
    #[must_use]
    pub fn without_api_wait(mut self) -> Self {
        self.wait_for_api = false;
        self
    }

    /// Override the SSO endpoint.
    #[must_use]
    pub fn with_sso_url(mut self, sso_url: impl Into<String>) -> Self {
        self.sso_url = sso_url.into();
        self
    }
}

/// reqwest-backed client bound to one identity.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    identity: Identity,
    credential: Credential,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .field("identity", &self.identity)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Build a client for `service_url` acting as `identity`.
    ///
    /// Users exchange their offline token for an access token; identities
    /// without a token authenticate with their pull secret. Unless disabled in
    /// `options`, waits until the API answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the token exchange fails, or the
    /// API does not become reachable in time.
    pub async fn connect(
        service_url: &str,
        identity: Identity,
        options: ClientOptions,
    ) -> ApiResult<Self> {
        let base = api_base(service_url)?;
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        let credential = if !identity.offline_token().is_empty() {
            let token =
                exchange_offline_token(&http, &options.sso_url, identity.offline_token()).await?;
            Credential::Bearer(token)
        } else if !identity.pull_secret().is_empty() {
            Credential::AgentKey(agent_key_from_pull_secret(identity.pull_secret())?)
        } else {
            Credential::Anonymous
        };

        debug!(url = %base, identity = %identity, "created API client");

        let client = Self {
            http,
            base,
            identity,
            credential,
        };

        if options.wait_for_api {
            client
                .wait_for_api(options.api_ready_timeout, options.api_ready_interval)
                .await?;
        }

        Ok(client)
    }

    /// Poll `clusters_list` until the API answers.
    ///
    /// Transport failures and 5xx answers keep the wait going; any other HTTP
    /// error is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unavailable`] when `timeout` elapses.
    pub async fn wait_for_api(&self, timeout: Duration, interval: Duration) -> ApiResult<()> {
        let start = Instant::now();
        loop {
            match self.clusters_list().await {
                Ok(_) => {
                    debug!(url = %self.base, "API is ready");
                    return Ok(());
                }
                Err(e) if e.status().is_some_and(|status| status < 500) => return Err(e),
                Err(e) => {
                    if start.elapsed() >= timeout {
                        return Err(ApiError::Unavailable(format!(
                            "{} did not answer within {timeout:?}: {e}",
                            self.base
                        )));
                    }
                    warn!(url = %self.base, error = %e, "API not ready yet");
                }
            }
            sleep(interval.min(timeout.saturating_sub(start.elapsed()))).await;
        }
    }

    /// Base URL every endpoint is joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Config(format!("invalid endpoint '{path}': {e}")))
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        trace!(method = %method, url = %url, identity = %self.identity, "sending request");
        let builder = self.http.request(method, url);
        Ok(match &self.credential {
            Credential::Bearer(token) => builder.bearer_auth(token),
            Credential::AgentKey(key) => builder.header(AGENT_AUTH_HEADER, key),
            Credential::Anonymous => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(http_error(status.as_u16(), status.canonical_reason(), body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        decode(response).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(method, path)?.json(body)).await?;
        decode(response).await
    }

    async fn send_json_no_content<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResult<()> {
        self.send(self.request(method, path)?.json(body)).await?;
        Ok(())
    }

    async fn get_bytes(&self, builder: RequestBuilder) -> ApiResult<Vec<u8>> {
        let response = self.send(builder).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

/// Normalize a service URL into the API base (`<url>/api/assisted-install/v1/`).
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed or is not http(s).
pub fn api_base(service_url: &str) -> ApiResult<Url> {
    let mut url = Url::parse(service_url)
        .map_err(|e| ApiError::Config(format!("invalid service URL '{service_url}': {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ApiError::Config(format!(
            "invalid service URL '{service_url}': must start with http:// or https://"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.join(API_PREFIX)
        .map_err(|e| ApiError::Config(format!("invalid service URL '{service_url}': {e}")))
}

fn http_error(status: u16, reason: Option<&str>, body: String) -> ApiError {
    ApiError::Http {
        status,
        reason: reason.unwrap_or("Unknown").to_string(),
        body,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

impl InstallerApi for RestClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn create_cluster(&self, params: &ClusterCreateParams) -> ApiResult<Cluster> {
        self.send_json(Method::POST, "clusters", params).await
    }

    async fn cluster_get(&self, id: &ClusterId) -> ApiResult<Cluster> {
        self.get_json(&format!("clusters/{id}")).await
    }

    async fn clusters_list(&self) -> ApiResult<Vec<Cluster>> {
        self.get_json("clusters").await
    }

    async fn delete_cluster(&self, id: &ClusterId) -> ApiResult<()> {
        self.send(self.request(Method::DELETE, &format!("clusters/{id}"))?)
            .await?;
        Ok(())
    }

    async fn get_events(&self, id: &ClusterId) -> ApiResult<Vec<Event>> {
        self.get_json(&format!("clusters/{id}/events")).await
    }

    async fn update_cluster(
        &self,
        id: &ClusterId,
        params: &ClusterUpdateParams,
    ) -> ApiResult<Cluster> {
        self.send_json(Method::PATCH, &format!("clusters/{id}"), params)
            .await
    }

    async fn generate_image(&self, id: &ClusterId, params: &ImageCreateParams) -> ApiResult<()> {
        self.send_json_no_content(Method::POST, &format!("clusters/{id}/downloads/image"), params)
            .await
    }

    async fn download_image(&self, id: &ClusterId) -> ApiResult<Vec<u8>> {
        self.get_bytes(self.request(Method::GET, &format!("clusters/{id}/downloads/image"))?)
            .await
    }

    async fn get_hosts(&self, id: &ClusterId) -> ApiResult<Vec<Host>> {
        self.get_json(&format!("clusters/{id}/hosts")).await
    }

    async fn register_host(&self, id: &ClusterId, params: &HostRegisterParams) -> ApiResult<Host> {
        self.send_json(Method::POST, &format!("clusters/{id}/hosts"), params)
            .await
    }

    async fn host_get_next_steps(&self, id: &ClusterId, host_id: &HostId) -> ApiResult<Steps> {
        self.get_json(&format!("clusters/{id}/hosts/{host_id}/instructions"))
            .await
    }

    async fn host_post_step_result(
        &self,
        id: &ClusterId,
        host_id: &HostId,
        reply: &StepReply,
    ) -> ApiResult<()> {
        self.send_json_no_content(
            Method::POST,
            &format!("clusters/{id}/hosts/{host_id}/instructions"),
            reply,
        )
        .await
    }

    async fn update_host_install_progress(
        &self,
        id: &ClusterId,
        host_id: &HostId,
        progress: &HostProgressUpdate,
    ) -> ApiResult<()> {
        self.send_json_no_content(
            Method::PUT,
            &format!("clusters/{id}/hosts/{host_id}/progress"),
            progress,
        )
        .await
    }

    async fn install_cluster(&self, id: &ClusterId) -> ApiResult<Cluster> {
        let response = self
            .send(self.request(Method::POST, &format!("clusters/{id}/actions/install"))?)
            .await?;
        decode(response).await
    }

    async fn cancel_installation(&self, id: &ClusterId) -> ApiResult<Cluster> {
        let response = self
            .send(self.request(Method::POST, &format!("clusters/{id}/actions/cancel"))?)
            .await?;
        decode(response).await
    }

    async fn complete_installation(
        &self,
        id: &ClusterId,
        params: &CompletionParams,
    ) -> ApiResult<()> {
        self.send_json_no_content(
            Method::POST,
            &format!("clusters/{id}/actions/complete_installation"),
            params,
        )
        .await
    }

    async fn download_cluster_file(&self, id: &ClusterId, file: DownloadFile) -> ApiResult<Vec<u8>> {
        let builder = self
            .request(Method::GET, &format!("clusters/{id}/downloads/files"))?
            .query(&[("file_name", file.as_str())]);
        self.get_bytes(builder).await
    }

    async fn get_install_config(&self, id: &ClusterId) -> ApiResult<String> {
        self.get_json(&format!("clusters/{id}/install-config")).await
    }

    async fn get_credentials(&self, id: &ClusterId) -> ApiResult<Credentials> {
        self.get_json(&format!("clusters/{id}/credentials")).await
    }
}
