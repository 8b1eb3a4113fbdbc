//! Backend selection from the environment.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use ipnet::IpNet;

use crate::error::{NodeError, NodeResult};
use crate::libvirt::DEFAULT_LIBVIRT_URI;
use crate::network::NetworkSettings;

/// Default prefix of the VMs created for a test run.
pub const DEFAULT_NODE_PREFIX: &str = "test-infra-cluster";

/// Default terraform working directory.
pub const DEFAULT_TERRAFORM_DIR: &str = "build/terraform";

/// Which node backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeBackendKind {
    /// `virsh` against a libvirt URI.
    #[default]
    Libvirt,
    /// `terraform apply` in a working directory.
    Terraform,
}

impl FromStr for NodeBackendKind {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "libvirt" | "virsh" => Ok(Self::Libvirt),
            "terraform" => Ok(Self::Terraform),
            other => Err(NodeError::Config(format!("unknown node backend '{other}'"))),
        }
    }
}

impl fmt::Display for NodeBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Libvirt => write!(f, "libvirt"),
            Self::Terraform => write!(f, "terraform"),
        }
    }
}

/// Node backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodesConfig {
    /// Selected backend.
    pub backend: NodeBackendKind,
    /// libvirt connection URI.
    pub libvirt_uri: String,
    /// Prefix of the managed domain names.
    pub node_prefix: String,
    /// Terraform working directory.
    pub terraform_dir: PathBuf,
    /// Machine network and VIP overrides.
    pub network: NetworkSettings,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            backend: NodeBackendKind::default(),
            libvirt_uri: DEFAULT_LIBVIRT_URI.to_string(),
            node_prefix: DEFAULT_NODE_PREFIX.to_string(),
            terraform_dir: PathBuf::from(DEFAULT_TERRAFORM_DIR),
            network: NetworkSettings::default(),
        }
    }
}

impl NodesConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> NodeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// Recognised keys: `NODE_BACKEND`, `LIBVIRT_URI`, `NODE_PREFIX`,
    /// `TERRAFORM_DIR`, `MACHINE_CIDR`, `API_VIP` and `INGRESS_VIP`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Config`] if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> NodeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(backend) = get("NODE_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(uri) = get("LIBVIRT_URI") {
            config.libvirt_uri = uri;
        }
        if let Some(prefix) = get("NODE_PREFIX") {
            config.node_prefix = prefix;
        }
        if let Some(dir) = get("TERRAFORM_DIR") {
            config.terraform_dir = PathBuf::from(dir);
        }
        if let Some(cidr) = get("MACHINE_CIDR") {
            config.network.machine_cidr = cidr
                .trim()
                .parse::<IpNet>()
                .map_err(|e| NodeError::Config(format!("MACHINE_CIDR '{cidr}': {e}")))?;
        }
        config.network.api_vip = get("API_VIP").map(|v| parse_ip("API_VIP", &v)).transpose()?;
        config.network.ingress_vip = get("INGRESS_VIP")
            .map(|v| parse_ip("INGRESS_VIP", &v))
            .transpose()?;

        Ok(config)
    }
}

fn parse_ip(key: &str, value: &str) -> NodeResult<IpAddr> {
    value
        .trim()
        .parse()
        .map_err(|e| NodeError::Config(format!("{key} '{value}': {e}")))
}
