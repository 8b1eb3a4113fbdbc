//! Harness configuration read from the environment.

use std::path::PathBuf;

use assisted_api::auth::DEFAULT_SSO_URL;
use assisted_api::{ClientOptions, ClusterCreateParams, Identity};

use crate::error::{HarnessError, Result};

/// Default target platform version.
pub const DEFAULT_OPENSHIFT_VERSION: &str = "4.6";

/// Default base DNS domain.
pub const DEFAULT_BASE_DOMAIN: &str = "redhat.com";

/// Default path the discovery image is written to.
pub const DEFAULT_ISO_DOWNLOAD_PATH: &str = "/tmp/test_images/discovery-image.iso";

/// Default minikube profile and namespace of a local deployment.
pub const DEFAULT_PROFILE: &str = "assisted-installer";

/// Default deploy target of a local deployment.
pub const DEFAULT_DEPLOY_TARGET: &str = "minikube";

/// Everything a test run needs to know about its environment.
#[derive(Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Offline token of the primary user.
    pub offline_token: String,
    /// Offline token of the second user (isolation checks).
    pub second_offline_token: String,
    /// Pull secret of the primary user.
    pub pull_secret: String,
    /// Pull secret of the second tenant (agent isolation checks).
    pub second_pull_secret: String,
    /// SSH public key injected into hosts.
    pub ssh_public_key: String,
    /// Target platform version.
    pub openshift_version: String,
    /// Base DNS domain.
    pub base_domain: String,
    /// Whether VIPs are allocated by DHCP.
    pub vip_dhcp_allocation: bool,
    /// URL of a remote service. Empty means discover the local deployment.
    pub remote_service_url: Option<String>,
    /// Fixed cluster name; random names are used when unset.
    pub cluster_name: Option<String>,
    /// Number of control-plane nodes.
    pub num_masters: usize,
    /// Number of worker nodes.
    pub num_workers: usize,
    /// Where the discovery image is written.
    pub iso_download_path: PathBuf,
    /// SSO token endpoint.
    pub sso_url: String,
    /// minikube profile of a local deployment.
    pub profile: String,
    /// Namespace of a local deployment.
    pub namespace: String,
    /// How the local deployment was made (minikube, kind, podman, onprem).
    pub deploy_target: String,
}

impl std::fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("openshift_version", &self.openshift_version)
            .field("base_domain", &self.base_domain)
            .field("vip_dhcp_allocation", &self.vip_dhcp_allocation)
            .field("remote_service_url", &self.remote_service_url)
            .field("cluster_name", &self.cluster_name)
            .field("num_masters", &self.num_masters)
            .field("num_workers", &self.num_workers)
            .field("iso_download_path", &self.iso_download_path)
            .field("deploy_target", &self.deploy_target)
            .finish_non_exhaustive()
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            offline_token: String::new(),
            second_offline_token: String::new(),
            pull_secret: String::new(),
            second_pull_secret: String::new(),
            ssh_public_key: String::new(),
            openshift_version: DEFAULT_OPENSHIFT_VERSION.to_string(),
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            vip_dhcp_allocation: true,
            remote_service_url: None,
            cluster_name: None,
            num_masters: 3,
            num_workers: 0,
            iso_download_path: PathBuf::from(DEFAULT_ISO_DOWNLOAD_PATH),
            sso_url: DEFAULT_SSO_URL.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            namespace: DEFAULT_PROFILE.to_string(),
            deploy_target: DEFAULT_DEPLOY_TARGET.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        let strings: [(&str, &mut String); 11] = [
            ("OFFLINE_TOKEN", &mut config.offline_token),
            ("SECOND_OFFLINE_TOKEN", &mut config.second_offline_token),
            ("PULL_SECRET", &mut config.pull_secret),
            ("SECOND_PULL_SECRET", &mut config.second_pull_secret),
            ("SSH_PUB_KEY", &mut config.ssh_public_key),
            ("OPENSHIFT_VERSION", &mut config.openshift_version),
            ("BASE_DOMAIN", &mut config.base_domain),
            ("SSO_URL", &mut config.sso_url),
            ("PROFILE", &mut config.profile),
            ("NAMESPACE", &mut config.namespace),
            ("DEPLOY_TARGET", &mut config.deploy_target),
        ];
        for (key, field) in strings {
            if let Some(value) = get(key) {
                *field = value;
            }
        }

        config.remote_service_url = get("REMOTE_SERVICE_URL");
        config.cluster_name = get("CLUSTER_NAME");
        if let Some(path) = get("ISO_DOWNLOAD_PATH") {
            config.iso_download_path = PathBuf::from(path);
        }
        if let Some(value) = get("VIP_DHCP_ALLOCATION") {
            config.vip_dhcp_allocation = parse_bool("VIP_DHCP_ALLOCATION", &value)?;
        }
        if let Some(value) = get("NUM_MASTERS") {
            config.num_masters = parse_count("NUM_MASTERS", &value)?;
        }
        if let Some(value) = get("NUM_WORKERS") {
            config.num_workers = parse_count("NUM_WORKERS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.num_masters == 0 {
            return Err(HarnessError::Config("NUM_MASTERS must be at least 1".into()));
        }
        if self.iso_download_path.as_os_str().is_empty() {
            return Err(HarnessError::Config("ISO_DOWNLOAD_PATH must not be empty".into()));
        }
        if self.openshift_version.is_empty() {
            return Err(HarnessError::Config("OPENSHIFT_VERSION must not be empty".into()));
        }
        Ok(())
    }

    /// Number of hosts a full discovery should find.
    #[must_use]
    pub fn expected_host_count(&self) -> usize {
        self.num_masters + self.num_workers
    }

    /// Primary user.
    #[must_use]
    pub fn user_identity(&self) -> Identity {
        Identity::user("user1", &self.offline_token, &self.pull_secret)
    }

    /// Second user, owning nothing the primary user created.
    #[must_use]
    pub fn second_user_identity(&self) -> Identity {
        Identity::user("user2", &self.second_offline_token, &self.second_pull_secret)
    }

    /// Agent of the second tenant: no token, second pull secret.
    #[must_use]
    pub fn second_agent_identity(&self) -> Identity {
        Identity::agent("agent2", &self.second_pull_secret)
    }

    /// REST client options for an identity; agents skip the API pre-check.
    #[must_use]
    pub fn client_options(&self, identity: &Identity) -> ClientOptions {
        let options = ClientOptions::default().with_sso_url(&self.sso_url);
        if identity.is_agent() {
            options.without_api_wait()
        } else {
            options
        }
    }

    /// Creation parameters for a cluster named `name`.
    #[must_use]
    pub fn cluster_params(&self, name: impl Into<String>) -> ClusterCreateParams {
        ClusterCreateParams {
            name: name.into(),
            openshift_version: self.openshift_version.clone(),
            pull_secret: self.pull_secret.clone(),
            ssh_public_key: self.ssh_public_key.clone(),
            base_dns_domain: self.base_domain.clone(),
            vip_dhcp_allocation: self.vip_dhcp_allocation,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(HarnessError::Config(format!("{key}: '{value}' is not a boolean"))),
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|e| HarnessError::Config(format!("{key}: '{value}': {e}")))
}
