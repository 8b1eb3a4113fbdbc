//! Machine network settings and VIP derivation.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use crate::controller::{NetworkFacts, NodeInfo};
use crate::error::{NodeError, NodeResult};

/// Host number of the API VIP inside the machine network.
pub const API_VIP_HOST: u32 = 100;

/// Host number of the ingress VIP inside the machine network.
pub const INGRESS_VIP_HOST: u32 = 101;

/// Default machine network of the libvirt test network.
pub const DEFAULT_MACHINE_CIDR: &str = "192.168.126.0/24";

/// Machine network plus optional VIP overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Machine network CIDR.
    pub machine_cidr: IpNet,
    /// API VIP override.
    pub api_vip: Option<IpAddr>,
    /// Ingress VIP override.
    pub ingress_vip: Option<IpAddr>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            machine_cidr: DEFAULT_MACHINE_CIDR
                .parse()
                .unwrap_or_else(|_| IpNet::V4(ipnet::Ipv4Net::default())),
            api_vip: None,
            ingress_vip: None,
        }
    }
}

impl NetworkSettings {
    /// Settings for a machine network, VIPs derived.
    #[must_use]
    pub fn new(machine_cidr: IpNet) -> Self {
        Self {
            machine_cidr,
            api_vip: None,
            ingress_vip: None,
        }
    }

    /// Combine the settings with the nodes' live addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the VIPs cannot be derived from the CIDR.
    pub fn facts(&self, nodes: &[NodeInfo]) -> NodeResult<NetworkFacts> {
        let api_vip = match self.api_vip {
            Some(vip) => vip,
            None => nth_host(&self.machine_cidr, API_VIP_HOST)?,
        };
        let ingress_vip = match self.ingress_vip {
            Some(vip) => vip,
            None => nth_host(&self.machine_cidr, INGRESS_VIP_HOST)?,
        };
        let node_addresses: BTreeMap<_, _> = nodes
            .iter()
            .map(|n| (n.name.clone(), n.addresses.clone()))
            .collect();

        Ok(NetworkFacts {
            machine_network_cidr: self.machine_cidr.trunc(),
            api_vip,
            ingress_vip,
            node_addresses,
        })
    }
}

/// The `n`th address after the network address.
///
/// # Errors
///
/// Returns an error if the network is too small to hold host `n`.
pub fn nth_host(cidr: &IpNet, n: u32) -> NodeResult<IpAddr> {
    let too_small = || NodeError::Network(format!("{cidr} has no host number {n}"));
    match cidr.trunc() {
        IpNet::V4(net) => {
            let host_bits = 32 - u32::from(net.prefix_len());
            if host_bits < 32 && u64::from(n) >= (1u64 << host_bits) - 1 {
                return Err(too_small());
            }
            let base = u32::from(net.network());
            base.checked_add(n)
                .map(|addr| IpAddr::V4(Ipv4Addr::from(addr)))
                .ok_or_else(too_small)
        }
        IpNet::V6(net) => {
            let host_bits = 128 - u32::from(net.prefix_len());
            if host_bits < 32 && n >= (1u32 << host_bits) {
                return Err(too_small());
            }
            let base = u128::from(net.network());
            base.checked_add(u128::from(n))
                .map(|addr| IpAddr::V6(Ipv6Addr::from(addr)))
                .ok_or_else(too_small)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("192.168.126.0/24", 100, "192.168.126.100")]
    #[test_case("192.168.126.17/24", 101, "192.168.126.101" ; "host bits are truncated")]
    #[test_case("10.0.0.0/16", 100, "10.0.0.100")]
    #[test_case("fd00::/64", 100, "fd00::64")]
    fn nth_host_offsets_from_network(cidr: &str, n: u32, expected: &str) {
        let cidr: IpNet = cidr.parse().unwrap();
        assert_eq!(nth_host(&cidr, n).unwrap(), expected.parse::<IpAddr>().unwrap());
    }

    #[test]
    fn nth_host_rejects_small_networks() {
        let cidr: IpNet = "192.168.1.0/28".parse().unwrap();
        assert!(matches!(nth_host(&cidr, 100), Err(NodeError::Network(_))));
    }

    #[test]
    fn facts_prefer_overrides() {
        let mut settings = NetworkSettings::new("192.168.126.0/24".parse().unwrap());
        settings.api_vip = Some("192.168.126.5".parse().unwrap());
        let facts = settings.facts(&[]).unwrap();
        assert_eq!(facts.api_vip, "192.168.126.5".parse::<IpAddr>().unwrap());
        assert_eq!(facts.ingress_vip, "192.168.126.101".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn facts_collect_node_addresses() {
        let settings = NetworkSettings::default();
        let nodes = vec![NodeInfo {
            name: "master-0".into(),
            running: true,
            addresses: vec!["192.168.126.10".parse().unwrap()],
        }];
        let facts = settings.facts(&nodes).unwrap();
        assert_eq!(facts.node_addresses["master-0"].len(), 1);
        assert_eq!(facts.machine_network_cidr.to_string(), DEFAULT_MACHINE_CIDR);
    }
}
