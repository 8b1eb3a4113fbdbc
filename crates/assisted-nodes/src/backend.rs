//! Runtime backend dispatch.

use crate::config::{NodeBackendKind, NodesConfig};
use crate::controller::{NetworkFacts, NodeController, NodeInfo};
use crate::error::NodeResult;
use crate::libvirt::LibvirtController;
use crate::terraform::TerraformController;

/// A node controller chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyNodeController {
    /// libvirt through `virsh`.
    Libvirt(LibvirtController),
    /// terraform working directory.
    Terraform(TerraformController),
}

impl AnyNodeController {
    /// Build the backend named by `config`.
    #[must_use]
    pub fn from_config(config: &NodesConfig) -> Self {
        match config.backend {
            NodeBackendKind::Libvirt => Self::Libvirt(LibvirtController::new(
                config.libvirt_uri.clone(),
                config.node_prefix.clone(),
                config.network.clone(),
            )),
            NodeBackendKind::Terraform => Self::Terraform(TerraformController::new(
                config.terraform_dir.clone(),
                config.network.clone(),
            )),
        }
    }

    /// Which backend this is.
    #[must_use]
    pub fn kind(&self) -> NodeBackendKind {
        match self {
            Self::Libvirt(_) => NodeBackendKind::Libvirt,
            Self::Terraform(_) => NodeBackendKind::Terraform,
        }
    }
}

impl NodeController for AnyNodeController {
    async fn list_nodes(&self) -> NodeResult<Vec<NodeInfo>> {
        match self {
            Self::Libvirt(c) => c.list_nodes().await,
            Self::Terraform(c) => c.list_nodes().await,
        }
    }

    async fn start_all(&self) -> NodeResult<()> {
        match self {
            Self::Libvirt(c) => c.start_all().await,
            Self::Terraform(c) => c.start_all().await,
        }
    }

    async fn start_node(&self, name: &str) -> NodeResult<()> {
        match self {
            Self::Libvirt(c) => c.start_node(name).await,
            Self::Terraform(c) => c.start_node(name).await,
        }
    }

    async fn stop_all(&self) -> NodeResult<()> {
        match self {
            Self::Libvirt(c) => c.stop_all().await,
            Self::Terraform(c) => c.stop_all().await,
        }
    }

    async fn stop_node(&self, name: &str) -> NodeResult<()> {
        match self {
            Self::Libvirt(c) => c.stop_node(name).await,
            Self::Terraform(c) => c.stop_node(name).await,
        }
    }

    async fn network_facts(&self) -> NodeResult<NetworkFacts> {
        match self {
            Self::Libvirt(c) => c.network_facts().await,
            Self::Terraform(c) => c.network_facts().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_picks_backend() {
        let mut config = NodesConfig::default();
        assert_eq!(
            AnyNodeController::from_config(&config).kind(),
            NodeBackendKind::Libvirt
        );
        config.backend = NodeBackendKind::Terraform;
        assert_eq!(
            AnyNodeController::from_config(&config).kind(),
            NodeBackendKind::Terraform
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dispatch_reaches_terraform_backend() {
        let tf = TerraformController::new("/nonexistent", Default::default()).with_terraform("true");
        let controller = AnyNodeController::Terraform(tf);
        controller.stop_all().await.unwrap();
    }
}
