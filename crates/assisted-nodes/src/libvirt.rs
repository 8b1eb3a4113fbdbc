//! libvirt backend driven through `virsh`.

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::info;

use crate::command::run;
use crate::controller::{NetworkFacts, NodeController, NodeInfo};
use crate::error::{NodeError, NodeResult};
use crate::network::NetworkSettings;

/// Default libvirt connection URI.
pub const DEFAULT_LIBVIRT_URI: &str = "qemu:///system";

/// Controls libvirt domains whose names start with a prefix.
#[derive(Debug, Clone)]
pub struct LibvirtController {
    uri: String,
    prefix: String,
    network: NetworkSettings,
    virsh: String,
}

impl LibvirtController {
    /// Control the domains named `<prefix>*` on the hypervisor at `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>, prefix: impl Into<String>, network: NetworkSettings) -> Self {
        Self {
            uri: uri.into(),
            prefix: prefix.into(),
            network,
            virsh: "virsh".to_string(),
        }
    }

    /// Use a different `virsh` binary.
    #[must_use]
    pub fn with_virsh(mut self, virsh: impl Into<String>) -> Self {
        self.virsh = virsh.into();
        self
    }

    async fn virsh(&self, args: &[&str]) -> NodeResult<String> {
        let mut full = vec!["-c", self.uri.as_str()];
        full.extend_from_slice(args);
        run(&self.virsh, full, None).await
    }

    async fn domains(&self) -> NodeResult<Vec<String>> {
        let out = self.virsh(&["list", "--all", "--name"]).await?;
        Ok(parse_domain_names(&out, &self.prefix))
    }

    async fn is_running(&self, name: &str) -> NodeResult<bool> {
        let out = self.virsh(&["domstate", name]).await?;
        Ok(out.trim() == "running")
    }

    async fn addresses(&self, name: &str) -> NodeResult<Vec<IpAddr>> {
        let out = self.virsh(&["domifaddr", name]).await?;
        parse_domifaddr(&out)
    }

    async fn ensure_managed(&self, name: &str) -> NodeResult<()> {
        if self.domains().await?.iter().any(|d| d == name) {
            Ok(())
        } else {
            Err(NodeError::NodeNotFound(name.to_string()))
        }
    }
}

impl NodeController for LibvirtController {
    async fn list_nodes(&self) -> NodeResult<Vec<NodeInfo>> {
        let mut nodes = Vec::new();
        for name in self.domains().await? {
            let running = self.is_running(&name).await?;
            let addresses = if running {
                self.addresses(&name).await?
            } else {
                Vec::new()
            };
            nodes.push(NodeInfo {
                name,
                running,
                addresses,
            });
        }
        Ok(nodes)
    }

    async fn start_all(&self) -> NodeResult<()> {
        for name in self.domains().await? {
            self.start_node(&name).await?;
        }
        Ok(())
    }

    async fn start_node(&self, name: &str) -> NodeResult<()> {
        self.ensure_managed(name).await?;
        if self.is_running(name).await? {
            return Ok(());
        }
        info!(node = %name, "starting libvirt domain");
        self.virsh(&["start", name]).await.map(|_| ())
    }

    async fn stop_all(&self) -> NodeResult<()> {
        for name in self.domains().await? {
            self.stop_node(&name).await?;
        }
        Ok(())
    }

    async fn stop_node(&self, name: &str) -> NodeResult<()> {
        self.ensure_managed(name).await?;
        if !self.is_running(name).await? {
            return Ok(());
        }
        info!(node = %name, "stopping libvirt domain");
        self.virsh(&["destroy", name]).await.map(|_| ())
    }

    async fn network_facts(&self) -> NodeResult<NetworkFacts> {
        let nodes = self.list_nodes().await?;
        self.network.facts(&nodes)
    }
}

/// Domain names from `virsh list --name`, keeping those with `prefix`.
#[must_use]
pub fn parse_domain_names(output: &str, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.starts_with(prefix))
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

/// Addresses from `virsh domifaddr` output.
///
/// # Errors
///
/// Returns an error if an address column cannot be parsed.
pub fn parse_domifaddr(output: &str) -> NodeResult<Vec<IpAddr>> {
    let mut addresses = Vec::new();
    for line in output.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != 4 || !matches!(cols[2], "ipv4" | "ipv6") {
            continue;
        }
        let net: IpNet = cols[3]
            .parse()
            .map_err(|e| NodeError::Parse(format!("bad address '{}': {e}", cols[3])))?;
        addresses.push(net.addr());
    }
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMIFADDR: &str = " Name       MAC address          Protocol     Address
-------------------------------------------------------------------------------
 vnet0      52:54:00:6a:3c:1e    ipv4         192.168.126.10/24
 vnet1      52:54:00:6a:3c:1f    ipv6         fd00::10/64
";

    #[test]
    fn parses_domifaddr_rows() {
        let addrs = parse_domifaddr(DOMIFADDR).unwrap();
        assert_eq!(
            addrs,
            vec![
                "192.168.126.10".parse::<IpAddr>().unwrap(),
                "fd00::10".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn domifaddr_rejects_garbage_address() {
        let out = " vnet0 52:54:00:6a:3c:1e ipv4 not-an-ip\n";
        assert!(matches!(parse_domifaddr(out), Err(NodeError::Parse(_))));
    }

    #[test]
    fn domain_names_filtered_by_prefix_and_sorted() {
        let out = "test-infra-worker-0\nother-vm\n\ntest-infra-master-1\ntest-infra-master-0\n";
        assert_eq!(
            parse_domain_names(out, "test-infra-"),
            vec![
                "test-infra-master-0",
                "test-infra-master-1",
                "test-infra-worker-0"
            ]
        );
    }
}
