//! Driving one cluster from creation to installation.
//!
//! [`ClusterLifecycle`] wraps a cluster id and the client of its owner and
//! tracks how far the cluster got:
//!
//! ```text
//! Created ─► ImageReady ─► HostsDiscovered ─► RolesAssigned ─► NetworkConfigured
//!                                                                    │
//!                                  InstallFailed ◄── Installing ◄────┘
//!                                                        │
//!                                                        ▼
//!                                                    Installed
//! ```
//!
//! `Deleted` is reachable from every state. Moving backwards, or out of
//! `Installed`/`InstallFailed` other than by deletion, is an
//! [`HarnessError::InvalidState`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assisted_api::{
    Cluster, ClusterCreateParams, ClusterId, ClusterStatus, ClusterUpdateParams, CompletionParams,
    Credentials, DownloadFile, Event, Host, HostId, HostRole, HostRoleUpdate, HostStatus,
    ImageCreateParams, InstallerApi,
};
use assisted_nodes::{NetworkFacts, NodeController};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};
use crate::wait::{WaitConfig, wait_until};

/// Where a cluster is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Cluster exists, nothing else done.
    Created,
    /// Discovery image generated and downloaded.
    ImageReady,
    /// The expected hosts are `known`.
    HostsDiscovered,
    /// Host roles submitted.
    RolesAssigned,
    /// VIPs or machine network submitted.
    NetworkConfigured,
    /// Installation started.
    Installing,
    /// Installation finished.
    Installed,
    /// Installation failed or was cancelled.
    InstallFailed,
    /// Cluster deleted.
    Deleted,
}

impl LifecycleState {
    const fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::ImageReady => 1,
            Self::HostsDiscovered => 2,
            Self::RolesAssigned => 3,
            Self::NetworkConfigured => 4,
            Self::Installing => 5,
            Self::Installed | Self::InstallFailed => 6,
            Self::Deleted => 7,
        }
    }

    /// `Installed` or `InstallFailed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Installed | Self::InstallFailed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::ImageReady => "image-ready",
            Self::HostsDiscovered => "hosts-discovered",
            Self::RolesAssigned => "roles-assigned",
            Self::NetworkConfigured => "network-configured",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::InstallFailed => "install-failed",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Timeouts of the lifecycle's waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimeouts {
    /// Hosts reaching `known`.
    pub discovery: WaitConfig,
    /// Cluster reaching `ready`.
    pub ready: WaitConfig,
    /// Every host reaching `installed`.
    pub nodes_install: WaitConfig,
    /// Cluster reaching `installed`.
    pub cluster_install: WaitConfig,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            discovery: WaitConfig::new(Duration::from_secs(20 * 60), Duration::from_secs(10)),
            ready: WaitConfig::new(Duration::from_secs(5 * 60), Duration::from_secs(5)),
            nodes_install: WaitConfig::new(Duration::from_secs(60 * 60), Duration::from_secs(30)),
            cluster_install: WaitConfig::new(Duration::from_secs(60 * 60), Duration::from_secs(30)),
        }
    }
}

impl LifecycleTimeouts {
    /// Every wait uses `config`.
    #[must_use]
    pub const fn uniform(config: WaitConfig) -> Self {
        Self {
            discovery: config,
            ready: config,
            nodes_install: config,
            cluster_install: config,
        }
    }
}

/// How hosts get their roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleAssignment {
    /// Hostnames containing `master` become control-plane nodes, those
    /// containing `worker` become workers.
    #[default]
    ByHostname,
    /// Roles per exact hostname.
    Explicit(BTreeMap<String, HostRole>),
}

impl RoleAssignment {
    /// Role for a hostname, if the rule assigns one.
    #[must_use]
    pub fn role_for(&self, hostname: &str) -> Option<HostRole> {
        match self {
            Self::ByHostname => {
                if hostname.contains("master") {
                    Some(HostRole::Master)
                } else if hostname.contains("worker") {
                    Some(HostRole::Worker)
                } else {
                    None
                }
            }
            Self::Explicit(roles) => roles.get(hostname).copied(),
        }
    }
}

/// Result of [`ClusterLifecycle::set_host_roles`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleReport {
    /// Hosts that got a role.
    pub assigned: Vec<(String, HostRole)>,
    /// Hostnames the rule did not cover. They keep `auto-assign`.
    pub unassigned: Vec<String>,
}

/// The cluster update that submits `facts`.
///
/// With VIP DHCP allocation only the machine network is sent; otherwise the
/// API and ingress VIPs are.
#[must_use]
pub fn network_update(facts: &NetworkFacts, vip_dhcp_allocation: bool) -> ClusterUpdateParams {
    if vip_dhcp_allocation {
        ClusterUpdateParams {
            machine_network_cidr: Some(facts.machine_network_cidr.to_string()),
            ..Default::default()
        }
    } else {
        ClusterUpdateParams {
            api_vip: Some(facts.api_vip.to_string()),
            ingress_vip: Some(facts.ingress_vip.to_string()),
            ..Default::default()
        }
    }
}

/// A cluster being driven through installation by its owner.
#[derive(Debug)]
pub struct ClusterLifecycle<A> {
    api: A,
    cluster_id: ClusterId,
    name: String,
    ssh_public_key: String,
    vip_dhcp_allocation: bool,
    image_path: PathBuf,
    state: LifecycleState,
    timeouts: LifecycleTimeouts,
}

impl<A: InstallerApi> ClusterLifecycle<A> {
    /// Create a cluster.
    ///
    /// # Errors
    ///
    /// Returns the service's error unchanged (a duplicate name surfaces as
    /// whatever the service answers).
    pub async fn create(
        api: A,
        params: &ClusterCreateParams,
        image_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let cluster = api.create_cluster(params).await?;
        info!(cluster_id = %cluster.id, name = %cluster.name, owner = %api.identity(), "created cluster");
        Ok(Self::from_cluster(api, &cluster, image_path))
    }

    /// Take over an existing cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be read through `api`.
    pub async fn attach(api: A, cluster_id: ClusterId, image_path: impl Into<PathBuf>) -> Result<Self> {
        let cluster = api.cluster_get(&cluster_id).await?;
        Ok(Self::from_cluster(api, &cluster, image_path))
    }

    fn from_cluster(api: A, cluster: &Cluster, image_path: impl Into<PathBuf>) -> Self {
        Self {
            api,
            cluster_id: cluster.id,
            name: cluster.name.clone(),
            ssh_public_key: cluster.ssh_public_key.clone(),
            vip_dhcp_allocation: cluster.vip_dhcp_allocation,
            image_path: image_path.into(),
            state: LifecycleState::Created,
            timeouts: LifecycleTimeouts::default(),
        }
    }

    /// Use different wait timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: LifecycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Cluster id.
    #[must_use]
    pub fn id(&self) -> ClusterId {
        self.cluster_id
    }

    /// Cluster name at creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Client of the owner.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Where the discovery image is written.
    #[must_use]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Whether VIPs are allocated by DHCP.
    #[must_use]
    pub fn vip_dhcp_allocation(&self) -> bool {
        self.vip_dhcp_allocation
    }

    fn invalid(&self, operation: &str) -> HarnessError {
        HarnessError::InvalidState {
            operation: operation.to_string(),
            state: self.state.to_string(),
        }
    }

    fn ensure_forward(&self, operation: &str, target: LifecycleState) -> Result<()> {
        let current = self.state;
        if current == LifecycleState::Deleted
            || current.is_terminal()
            || target.rank() < current.rank()
        {
            return Err(self.invalid(operation));
        }
        Ok(())
    }

    fn ensure_in(&self, operation: &str, allowed: &[LifecycleState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn ensure_exists(&self, operation: &str) -> Result<()> {
        if self.state == LifecycleState::Deleted {
            Err(self.invalid(operation))
        } else {
            Ok(())
        }
    }

    fn move_to(&mut self, state: LifecycleState) {
        debug!(cluster_id = %self.cluster_id, from = %self.state, to = %state, "lifecycle transition");
        self.state = state;
    }

    /// Current remote view of the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster was deleted or cannot be read.
    pub async fn cluster(&self) -> Result<Cluster> {
        self.ensure_exists("get cluster")?;
        Ok(self.api.cluster_get(&self.cluster_id).await?)
    }

    /// Generate the discovery image and write it to the image path.
    ///
    /// May be repeated until installation starts; the file is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid state, API failure, or if the file cannot
    /// be written.
    pub async fn generate_and_download_image(&mut self) -> Result<PathBuf> {
        const OPERATION: &str = "generate image";
        if self.state.rank() > LifecycleState::NetworkConfigured.rank() {
            return Err(self.invalid(OPERATION));
        }
        self.api
            .generate_image(
                &self.cluster_id,
                &ImageCreateParams {
                    ssh_public_key: self.ssh_public_key.clone(),
                },
            )
            .await?;
        let image = self.api.download_image(&self.cluster_id).await?;

        if let Some(parent) = self.image_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.image_path, &image).await?;
        info!(
            cluster_id = %self.cluster_id,
            path = %self.image_path.display(),
            bytes = image.len(),
            "downloaded discovery image"
        );

        if self.state.rank() < LifecycleState::ImageReady.rank() {
            self.move_to(LifecycleState::ImageReady);
        }
        Ok(self.image_path.clone())
    }

    /// Power on every node so it boots the discovery image.
    ///
    /// # Errors
    ///
    /// Returns an error if no image is ready yet or the backend fails.
    pub async fn boot_nodes<N: NodeController>(&self, controller: &N) -> Result<()> {
        let rank = self.state.rank();
        if rank < LifecycleState::ImageReady.rank() || rank > LifecycleState::NetworkConfigured.rank() {
            return Err(self.invalid("boot nodes"));
        }
        controller.start_all().await?;
        info!(cluster_id = %self.cluster_id, "booted nodes");
        Ok(())
    }

    /// Poll until the cluster has exactly `expected_count` hosts, all `known`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if they do not show up in time, or if
    /// more hosts than expected registered.
    pub async fn wait_until_hosts_are_discovered(&mut self, expected_count: usize) -> Result<Vec<Host>> {
        self.ensure_forward("wait for host discovery", LifecycleState::HostsDiscovered)?;
        let api = &self.api;
        let id = self.cluster_id;
        let description = format!("{expected_count} known hosts in cluster {id}");
        let hosts = wait_until(
            &description,
            &self.timeouts.discovery,
            move || async move { Ok::<_, HarnessError>(api.get_hosts(&id).await?) },
            |hosts: &Vec<Host>| hosts.len() == expected_count && known_count(hosts) == expected_count,
        )
        .await?;
        info!(cluster_id = %id, hosts = hosts.len(), "hosts discovered");
        if self.state.rank() < LifecycleState::HostsDiscovered.rank() {
            self.move_to(LifecycleState::HostsDiscovered);
        }
        Ok(hosts)
    }

    /// Assign roles to the discovered hosts.
    ///
    /// Hosts the rule does not cover are left unassigned and listed in the
    /// report.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid state or API failure.
    pub async fn set_host_roles(&mut self, rule: &RoleAssignment) -> Result<RoleReport> {
        self.ensure_forward("set host roles", LifecycleState::RolesAssigned)?;
        let hosts = self.api.get_hosts(&self.cluster_id).await?;

        let mut report = RoleReport::default();
        let mut updates = Vec::new();
        for host in &hosts {
            match rule.role_for(&host.requested_hostname) {
                Some(role) => {
                    updates.push(HostRoleUpdate { id: host.id, role });
                    report.assigned.push((host.requested_hostname.clone(), role));
                }
                None => {
                    warn!(
                        cluster_id = %self.cluster_id,
                        host_id = %host.id,
                        hostname = %host.requested_hostname,
                        "no role rule matches host"
                    );
                    report.unassigned.push(host.requested_hostname.clone());
                }
            }
        }

        if !updates.is_empty() {
            let params = ClusterUpdateParams {
                hosts_roles: updates,
                ..Default::default()
            };
            self.api.update_cluster(&self.cluster_id, &params).await?;
        }
        info!(
            cluster_id = %self.cluster_id,
            assigned = report.assigned.len(),
            unassigned = report.unassigned.len(),
            "set host roles"
        );
        self.move_to(LifecycleState::RolesAssigned);
        Ok(report)
    }

    /// Submit the network parameters read from `controller`.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid state, backend failure, or API failure.
    pub async fn set_network_params<N: NodeController>(&mut self, controller: &N) -> Result<NetworkFacts> {
        self.ensure_forward("set network params", LifecycleState::NetworkConfigured)?;
        let facts = controller.network_facts().await?;
        let params = network_update(&facts, self.vip_dhcp_allocation);
        self.api.update_cluster(&self.cluster_id, &params).await?;
        info!(
            cluster_id = %self.cluster_id,
            machine_cidr = %facts.machine_network_cidr,
            api_vip = %facts.api_vip,
            ingress_vip = %facts.ingress_vip,
            dhcp = self.vip_dhcp_allocation,
            "set network params"
        );
        self.move_to(LifecycleState::NetworkConfigured);
        Ok(facts)
    }

    /// Poll until the cluster reports `ready`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if it never does.
    pub async fn wait_for_ready_to_install(&self) -> Result<Cluster> {
        self.ensure_exists("wait for ready")?;
        let api = &self.api;
        let id = self.cluster_id;
        let cluster = wait_until(
            &format!("cluster {id} ready to install"),
            &self.timeouts.ready,
            move || async move { Ok::<_, HarnessError>(api.cluster_get(&id).await?) },
            |cluster: &Cluster| cluster.status == ClusterStatus::Ready,
        )
        .await?;
        Ok(cluster)
    }

    /// Start the installation.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid state or if the service refuses.
    pub async fn start_install(&mut self) -> Result<Cluster> {
        self.ensure_forward("start install", LifecycleState::Installing)?;
        let cluster = self.api.install_cluster(&self.cluster_id).await?;
        info!(cluster_id = %self.cluster_id, status = %cluster.status, "installation started");
        self.move_to(LifecycleState::Installing);
        Ok(cluster)
    }

    /// Poll until every host is `installed`.
    ///
    /// A host in `error` ends the wait and moves the cluster to
    /// `InstallFailed`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InstallFailed`] or [`HarnessError::Timeout`].
    pub async fn wait_for_nodes_to_install(&mut self) -> Result<Vec<Host>> {
        self.ensure_in("wait for nodes to install", &[LifecycleState::Installing])?;
        let api = &self.api;
        let id = self.cluster_id;
        let hosts = wait_until(
            &format!("all hosts of cluster {id} installed"),
            &self.timeouts.nodes_install,
            move || async move { Ok::<_, HarnessError>(api.get_hosts(&id).await?) },
            |hosts: &Vec<Host>| {
                hosts.iter().any(|h| h.status == HostStatus::Error)
                    || (!hosts.is_empty() && hosts.iter().all(|h| h.status == HostStatus::Installed))
            },
        )
        .await?;

        if let Some(failed) = hosts.iter().find(|h| h.status == HostStatus::Error) {
            let reason = format!(
                "host {} ({}) failed: {}",
                failed.requested_hostname, failed.id, failed.status_info
            );
            warn!(cluster_id = %id, reason = %reason, "host installation failed");
            self.move_to(LifecycleState::InstallFailed);
            return Err(HarnessError::InstallFailed {
                cluster_id: id.to_string(),
                reason,
            });
        }
        info!(cluster_id = %id, hosts = hosts.len(), "all hosts installed");
        Ok(hosts)
    }

    /// Poll until the cluster is `installed`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InstallFailed`] if the cluster ends in `error`
    /// or `cancelled`, or [`HarnessError::Timeout`].
    pub async fn wait_for_cluster_to_install(&mut self) -> Result<Cluster> {
        self.ensure_in("wait for cluster to install", &[LifecycleState::Installing])?;
        let api = &self.api;
        let id = self.cluster_id;
        let cluster = wait_until(
            &format!("cluster {id} installed"),
            &self.timeouts.cluster_install,
            move || async move { Ok::<_, HarnessError>(api.cluster_get(&id).await?) },
            |cluster: &Cluster| cluster.status == ClusterStatus::Installed || cluster.status.is_failed(),
        )
        .await?;

        if cluster.status.is_failed() {
            self.move_to(LifecycleState::InstallFailed);
            return Err(HarnessError::InstallFailed {
                cluster_id: id.to_string(),
                reason: format!("{}: {}", cluster.status, cluster.status_info),
            });
        }
        info!(cluster_id = %id, "cluster installed");
        self.move_to(LifecycleState::Installed);
        Ok(cluster)
    }

    /// Admin credentials of the installed cluster.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidState`] unless the cluster is installed.
    pub async fn get_admin_credentials(&self) -> Result<Credentials> {
        self.ensure_in("get admin credentials", &[LifecycleState::Installed])?;
        Ok(self.api.get_credentials(&self.cluster_id).await?)
    }

    /// Delete the cluster. Deleting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the service's error if the delete fails.
    pub async fn delete(&mut self) -> Result<()> {
        if self.state == LifecycleState::Deleted {
            return Ok(());
        }
        self.api.delete_cluster(&self.cluster_id).await?;
        info!(cluster_id = %self.cluster_id, "deleted cluster");
        self.move_to(LifecycleState::Deleted);
        Ok(())
    }

    /// Hosts of the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster was deleted or cannot be read.
    pub async fn get_hosts(&self) -> Result<Vec<Host>> {
        self.ensure_exists("get hosts")?;
        Ok(self.api.get_hosts(&self.cluster_id).await?)
    }

    /// Ids of the cluster's hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster was deleted or cannot be read.
    pub async fn host_ids(&self) -> Result<Vec<HostId>> {
        Ok(self.get_hosts().await?.into_iter().map(|h| h.id).collect())
    }

    /// Cancel a running installation.
    ///
    /// # Errors
    ///
    /// Returns an error unless the cluster is installing.
    pub async fn cancel_install(&mut self) -> Result<Cluster> {
        self.ensure_in("cancel install", &[LifecycleState::Installing])?;
        let cluster = self.api.cancel_installation(&self.cluster_id).await?;
        warn!(cluster_id = %self.cluster_id, "installation cancelled");
        self.move_to(LifecycleState::InstallFailed);
        Ok(cluster)
    }

    /// Kubeconfig without the ingress CA, available once installation starts.
    ///
    /// # Errors
    ///
    /// Returns an error before installation starts or on API failure.
    pub async fn download_kubeconfig_no_ingress(&self) -> Result<Vec<u8>> {
        self.ensure_in(
            "download kubeconfig",
            &[LifecycleState::Installing, LifecycleState::Installed],
        )?;
        Ok(self
            .api
            .download_cluster_file(&self.cluster_id, DownloadFile::KubeconfigNoIngress)
            .await?)
    }

    /// Rendered install-config.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster was deleted or on API failure.
    pub async fn get_install_config(&self) -> Result<String> {
        self.ensure_exists("get install config")?;
        Ok(self.api.get_install_config(&self.cluster_id).await?)
    }

    /// Report the installation as finished.
    ///
    /// # Errors
    ///
    /// Returns an error unless the cluster is installing.
    pub async fn complete_installation(&mut self, is_success: bool) -> Result<()> {
        self.ensure_in("complete installation", &[LifecycleState::Installing])?;
        let params = CompletionParams {
            is_success,
            error_info: (!is_success).then(|| "reported as failed by the test harness".to_string()),
        };
        self.api.complete_installation(&self.cluster_id, &params).await?;
        self.move_to(if is_success {
            LifecycleState::Installed
        } else {
            LifecycleState::InstallFailed
        });
        Ok(())
    }

    /// Events recorded for the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster was deleted or on API failure.
    pub async fn events(&self) -> Result<Vec<Event>> {
        self.ensure_exists("get events")?;
        Ok(self.api.get_events(&self.cluster_id).await?)
    }
}

fn known_count(hosts: &[Host]) -> usize {
    hosts.iter().filter(|h| h.status == HostStatus::Known).count()
}
