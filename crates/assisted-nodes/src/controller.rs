//! The node controller capability set.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::NodeResult;

/// A machine managed by a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Node name (also the hostname it reports once booted).
    pub name: String,
    /// Whether the node is powered on.
    pub running: bool,
    /// Addresses currently assigned to the node.
    pub addresses: Vec<IpAddr>,
}

/// Live network facts read from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFacts {
    /// Machine network the nodes live on.
    pub machine_network_cidr: IpNet,
    /// Virtual IP for the API.
    pub api_vip: IpAddr,
    /// Virtual IP for ingress.
    pub ingress_vip: IpAddr,
    /// Addresses per node name.
    pub node_addresses: BTreeMap<String, Vec<IpAddr>>,
}

/// Power control over the machines standing in for cluster hardware.
///
/// The lifecycle controller only ever uses this capability set, so swapping
/// backends does not change how a cluster is driven.
pub trait NodeController: Send + Sync {
    /// Every node the controller manages.
    fn list_nodes(&self) -> impl Future<Output = NodeResult<Vec<NodeInfo>>> + Send;

    /// Power on every node.
    fn start_all(&self) -> impl Future<Output = NodeResult<()>> + Send;

    /// Power on one node.
    fn start_node(&self, name: &str) -> impl Future<Output = NodeResult<()>> + Send;

    /// Power off every node.
    fn stop_all(&self) -> impl Future<Output = NodeResult<()>> + Send;

    /// Power off one node.
    fn stop_node(&self, name: &str) -> impl Future<Output = NodeResult<()>> + Send;

    /// Read the machine network, VIPs, and node addresses.
    fn network_facts(&self) -> impl Future<Output = NodeResult<NetworkFacts>> + Send;
}
