//! Simulated VMs.
//!
//! Booting a simulated node reads the discovery image from disk and plays the
//! discovery agent: it registers a host with the cluster named in the image
//! and posts an inventory carrying the node's name as hostname.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assisted_api::{
    HostId, HostInventory, HostRegisterParams, Identity, InstallerApi, InventoryInterface,
    StepReply, StepType,
};
use assisted_nodes::network::nth_host;
use assisted_nodes::{NetworkFacts, NetworkSettings, NodeController, NodeError, NodeInfo, NodeResult};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::service::{SimImage, SimService};

/// Host number of the first node address in the machine network.
const FIRST_NODE_HOST: u32 = 10;

const AGENT_VERSION: &str = "sim-agent/1.0";

#[derive(Debug, Clone)]
struct SimNode {
    name: String,
    host_id: HostId,
    address: IpAddr,
    running: bool,
}

/// Node backend that boots agents against a [`SimService`].
#[derive(Debug, Clone)]
pub struct SimNodes {
    service: SimService,
    image_path: PathBuf,
    network: NetworkSettings,
    nodes: Arc<RwLock<Vec<SimNode>>>,
}

impl SimNodes {
    /// Nodes with the given names, booting from the image at `image_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine network cannot address every node.
    pub fn new<I, S>(service: SimService, image_path: impl Into<PathBuf>, names: I) -> NodeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_network(service, image_path, names, NetworkSettings::default())
    }

    /// Nodes on a specific machine network.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine network cannot address every node.
    pub fn with_network<I, S>(
        service: SimService,
        image_path: impl Into<PathBuf>,
        names: I,
        network: NetworkSettings,
    ) -> NodeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes = Vec::new();
        for (index, name) in (0u32..).zip(names) {
            nodes.push(SimNode {
                name: name.into(),
                host_id: HostId::new(),
                address: nth_host(&network.machine_cidr, FIRST_NODE_HOST + index)?,
                running: false,
            });
        }
        Ok(Self {
            service,
            image_path: image_path.into(),
            network,
            nodes: Arc::new(RwLock::new(nodes)),
        })
    }

    /// `masters` nodes named `master-N` followed by `workers` named `worker-N`.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine network cannot address every node.
    pub fn cluster(
        service: SimService,
        image_path: impl Into<PathBuf>,
        masters: usize,
        workers: usize,
    ) -> NodeResult<Self> {
        let names = (0..masters)
            .map(|i| format!("master-{i}"))
            .chain((0..workers).map(|i| format!("worker-{i}")));
        Self::new(service, image_path, names)
    }

    /// Path the nodes boot from.
    #[must_use]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    async fn boot(&self, node: &SimNode) -> NodeResult<()> {
        let bytes = tokio::fs::read(&self.image_path).await.map_err(|e| {
            NodeError::Config(format!(
                "cannot read discovery image {}: {e}",
                self.image_path.display()
            ))
        })?;
        let image = SimImage::from_bytes(&bytes).map_err(|e| NodeError::Config(e.to_string()))?;

        let agent = self
            .service
            .client(Identity::agent(format!("{}-agent", node.name), image.pull_secret));
        agent
            .register_host(
                &image.cluster_id,
                &HostRegisterParams {
                    host_id: node.host_id,
                    discovery_agent_version: Some(AGENT_VERSION.to_string()),
                },
            )
            .await
            .map_err(|e| NodeError::Backend(format!("{}: host registration failed: {e}", node.name)))?;

        let inventory = HostInventory {
            hostname: node.name.clone(),
            interfaces: vec![InventoryInterface {
                name: "eth0".to_string(),
                ipv4_addresses: vec![format!(
                    "{}/{}",
                    node.address,
                    self.network.machine_cidr.prefix_len()
                )],
            }],
        };
        let output = serde_json::to_string(&inventory).map_err(|e| NodeError::Parse(e.to_string()))?;
        agent
            .host_post_step_result(
                &image.cluster_id,
                &node.host_id,
                &StepReply {
                    step_type: StepType::Inventory,
                    step_id: format!("inventory-{}", node.name),
                    exit_code: 0,
                    output,
                    error: None,
                },
            )
            .await
            .map_err(|e| NodeError::Backend(format!("{}: inventory rejected: {e}", node.name)))?;

        debug!(node = %node.name, cluster_id = %image.cluster_id, "simulated agent checked in");
        Ok(())
    }

    fn set_running(&self, name: &str, running: bool) {
        if let Some(node) = self.nodes.write().iter_mut().find(|n| n.name == name) {
            node.running = running;
        }
    }

    fn find(&self, name: &str) -> NodeResult<SimNode> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .ok_or_else(|| NodeError::NodeNotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.nodes.read().iter().map(|n| n.name.clone()).collect()
    }
}

impl NodeController for SimNodes {
    async fn list_nodes(&self) -> NodeResult<Vec<NodeInfo>> {
        Ok(self
            .nodes
            .read()
            .iter()
            .map(|n| NodeInfo {
                name: n.name.clone(),
                running: n.running,
                addresses: if n.running { vec![n.address] } else { Vec::new() },
            })
            .collect())
    }

    async fn start_all(&self) -> NodeResult<()> {
        for name in self.names() {
            self.start_node(&name).await?;
        }
        Ok(())
    }

    async fn start_node(&self, name: &str) -> NodeResult<()> {
        let node = self.find(name)?;
        if node.running {
            return Ok(());
        }
        self.boot(&node).await?;
        self.set_running(name, true);
        info!(node = %name, "simulated node started");
        Ok(())
    }

    async fn stop_all(&self) -> NodeResult<()> {
        for name in self.names() {
            self.stop_node(&name).await?;
        }
        Ok(())
    }

    async fn stop_node(&self, name: &str) -> NodeResult<()> {
        self.find(name)?;
        self.set_running(name, false);
        info!(node = %name, "simulated node stopped");
        Ok(())
    }

    async fn network_facts(&self) -> NodeResult<NetworkFacts> {
        let nodes = self.list_nodes().await?;
        self.network.facts(&nodes)
    }
}
