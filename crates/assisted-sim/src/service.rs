//! The simulated installation service.
//!
//! State lives behind one `parking_lot::RwLock`. Every cluster belongs to the
//! offline token that created it and is visible to agents holding its pull
//! secret; anyone else gets the same 404 a missing cluster would produce.
//!
//! Progress is driven by reads: each `cluster_get` or `get_hosts` by a
//! principal who can see the cluster advances it by one tick, so polling
//! loops in the harness observe the eventual consistency of a real service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use assisted_api::{
    ApiError, ApiResult, Cluster, ClusterCreateParams, ClusterId, ClusterStatus,
    ClusterUpdateParams, CompletionParams, Credentials, DownloadFile, Event, EventSeverity, Host,
    HostId, HostInventory, HostProgressInfo, HostProgressUpdate, HostRegisterParams, HostRole,
    HostStage, HostStatus, Identity, ImageCreateParams, Step, StepReply, StepType, Steps,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::SimClient;

/// Seconds agents are told to wait between instruction polls.
const NEXT_INSTRUCTION_SECONDS: u64 = 60;

/// Tunables of the simulated service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Reject a second cluster with the same name for the same owner.
    pub enforce_unique_names: bool,
    /// Reads before a host with an inventory becomes `known`.
    pub discovery_ticks: u32,
    /// Reads per host installation phase.
    pub install_ticks: u32,
    /// Reads spent in `finalizing`.
    pub finalize_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            enforce_unique_names: false,
            discovery_ticks: 2,
            install_ticks: 2,
            finalize_ticks: 1,
        }
    }
}

/// Content of a simulated discovery image.
///
/// Simulated nodes boot from this to learn which cluster to join and which
/// pull secret authenticates their agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimImage {
    /// Cluster the image was generated for.
    pub cluster_id: ClusterId,
    /// Pull secret the agent authenticates with.
    pub pull_secret: String,
}

impl SimImage {
    /// Serialize the image.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> ApiResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Read an image back.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a simulated image.
    pub fn from_bytes(bytes: &[u8]) -> ApiResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(format!("not a discovery image: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Principal {
    User(String),
    Agent(String),
}

impl Principal {
    fn of(identity: &Identity) -> ApiResult<Self> {
        if !identity.offline_token().is_empty() {
            Ok(Self::User(identity.offline_token().to_string()))
        } else if !identity.pull_secret().is_empty() {
            Ok(Self::Agent(identity.pull_secret().to_string()))
        } else {
            Err(ApiError::http(401, "no credentials supplied"))
        }
    }
}

#[derive(Debug)]
struct ClusterRecord {
    cluster: Cluster,
    owner_token: String,
    pull_secret: String,
    image_ssh_key: Option<String>,
    host_ticks: HashMap<HostId, u32>,
    finalize_ticks: u32,
    admin_password: String,
    events: Vec<Event>,
}

impl ClusterRecord {
    fn new(cluster: Cluster, owner_token: String, pull_secret: String) -> Self {
        Self {
            cluster,
            owner_token,
            pull_secret,
            image_ssh_key: None,
            host_ticks: HashMap::new(),
            finalize_ticks: 0,
            admin_password: Uuid::new_v4().simple().to_string(),
            events: Vec::new(),
        }
    }

    fn visible_to(&self, principal: &Principal) -> bool {
        match principal {
            Principal::User(token) => *token == self.owner_token,
            Principal::Agent(secret) => *secret == self.pull_secret,
        }
    }

    fn id(&self) -> ClusterId {
        self.cluster.id
    }

    fn event(&mut self, host_id: Option<HostId>, severity: EventSeverity, message: impl Into<String>) {
        self.events.push(Event {
            cluster_id: self.cluster.id,
            host_id,
            severity,
            message: message.into(),
            event_time: Utc::now(),
        });
    }

    fn host_mut(&mut self, host_id: &HostId) -> ApiResult<&mut Host> {
        self.cluster
            .hosts
            .iter_mut()
            .find(|h| h.id == *host_id)
            .ok_or_else(|| ApiError::not_found(format!("host {host_id} not found")))
    }

    fn is_pre_install(&self) -> bool {
        matches!(
            self.cluster.status,
            ClusterStatus::Insufficient | ClusterStatus::PendingForInput | ClusterStatus::Ready
        )
    }

    fn has_started_install(&self) -> bool {
        self.cluster.status.is_installing() || self.cluster.status == ClusterStatus::Installed
    }

    fn network_configured(&self) -> bool {
        if self.cluster.vip_dhcp_allocation {
            self.cluster.machine_network_cidr.is_some()
        } else {
            self.cluster.api_vip.is_some() && self.cluster.ingress_vip.is_some()
        }
    }

    fn set_status(&mut self, status: ClusterStatus, info: impl Into<String>) {
        let info = info.into();
        if self.cluster.status != status {
            debug!(cluster_id = %self.cluster.id, from = %self.cluster.status, to = %status, "cluster status changed");
            let message = format!("Updated status of cluster {} to {status}", self.cluster.name);
            self.event(None, EventSeverity::Info, message);
        }
        self.cluster.status = status;
        self.cluster.status_info = info;
    }

    fn refresh_pre_install_status(&mut self) {
        if !self.is_pre_install() {
            return;
        }
        let hosts = &self.cluster.hosts;
        let (status, info) = if hosts.is_empty() || hosts.iter().any(|h| h.status != HostStatus::Known) {
            (
                ClusterStatus::Insufficient,
                "Cluster is not ready for install: waiting for hosts",
            )
        } else if hosts.iter().any(|h| h.role == HostRole::AutoAssign)
            || !hosts.iter().any(|h| h.role == HostRole::Master)
        {
            (
                ClusterStatus::PendingForInput,
                "User input required: host roles are not assigned",
            )
        } else if !self.network_configured() {
            (
                ClusterStatus::PendingForInput,
                "User input required: network parameters are not set",
            )
        } else {
            (ClusterStatus::Ready, "Cluster ready to be installed")
        };
        self.set_status(status, info);
    }

    fn advance(&mut self, config: &SimConfig) {
        match self.cluster.status {
            ClusterStatus::Insufficient | ClusterStatus::PendingForInput | ClusterStatus::Ready => {
                for host in &mut self.cluster.hosts {
                    if host.status != HostStatus::Discovering || host.requested_hostname.is_empty() {
                        continue;
                    }
                    let ticks = self.host_ticks.entry(host.id).or_default();
                    *ticks += 1;
                    if *ticks >= config.discovery_ticks {
                        *ticks = 0;
                        host.status = HostStatus::Known;
                        host.status_info = "Host is ready to be installed".to_string();
                    }
                }
                self.refresh_pre_install_status();
            }
            ClusterStatus::PreparingForInstallation => {
                self.set_status(ClusterStatus::Installing, "Installation in progress");
            }
            ClusterStatus::Installing => {
                for host in &mut self.cluster.hosts {
                    let next = match host.status {
                        HostStatus::Installing => (HostStatus::InstallingInProgress, HostStage::WritingImageToDisk),
                        HostStatus::InstallingInProgress => (HostStatus::Installed, HostStage::Done),
                        _ => continue,
                    };
                    let ticks = self.host_ticks.entry(host.id).or_default();
                    *ticks += 1;
                    if *ticks >= config.install_ticks {
                        *ticks = 0;
                        host.status = next.0;
                        host.progress.current_stage = Some(next.1);
                    }
                }
                if self.cluster.hosts.iter().all(|h| h.status == HostStatus::Installed) {
                    self.finalize_ticks = 0;
                    self.set_status(ClusterStatus::Finalizing, "Finalizing cluster installation");
                }
            }
            ClusterStatus::Finalizing => {
                self.finalize_ticks += 1;
                if self.finalize_ticks >= config.finalize_ticks {
                    self.set_status(ClusterStatus::Installed, "Cluster is installed");
                }
            }
            _ => {}
        }
    }

    fn render_install_config(&self) -> String {
        let c = &self.cluster;
        let masters = c.hosts.iter().filter(|h| h.role == HostRole::Master).count();
        let workers = c.hosts.iter().filter(|h| h.role == HostRole::Worker).count();
        let mut out = format!(
            "apiVersion: v1\nbaseDomain: {}\nmetadata:\n  name: {}\ncompute:\n- name: worker\n  replicas: {workers}\ncontrolPlane:\n  name: master\n  replicas: {masters}\nnetworking:\n",
            c.base_dns_domain, c.name
        );
        if let Some(cidr) = &c.machine_network_cidr {
            out.push_str(&format!("  machineNetwork:\n  - cidr: {cidr}\n"));
        }
        out.push_str("platform:\n  baremetal:\n");
        if let Some(vip) = &c.api_vip {
            out.push_str(&format!("    apiVIP: {vip}\n"));
        }
        if let Some(vip) = &c.ingress_vip {
            out.push_str(&format!("    ingressVIP: {vip}\n"));
        }
        out.push_str(&format!("sshKey: '{}'\n", c.ssh_public_key));
        out
    }

    fn render_file(&self, file: DownloadFile) -> Vec<u8> {
        let c = &self.cluster;
        match file {
            DownloadFile::Kubeconfig | DownloadFile::KubeconfigNoIngress => format!(
                "apiVersion: v1\nkind: Config\nclusters:\n- name: {name}\n  cluster:\n    server: https://api.{name}.{domain}:6443\ncurrent-context: admin\n",
                name = c.name,
                domain = c.base_dns_domain
            )
            .into_bytes(),
            DownloadFile::BootstrapIgnition
            | DownloadFile::MasterIgnition
            | DownloadFile::WorkerIgnition => {
                format!("{{\"ignition\":{{\"version\":\"3.1.0\"}},\"source\":\"{file}\"}}").into_bytes()
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    clusters: HashMap<ClusterId, ClusterRecord>,
    failing_deletes: HashSet<ClusterId>,
}

/// An in-memory installation service.
///
/// Cheap to clone; clones share state. Talk to it through [`SimClient`]s
/// obtained from [`SimService::client`].
#[derive(Debug, Clone, Default)]
pub struct SimService {
    state: Arc<RwLock<State>>,
    config: SimConfig,
}

impl SimService {
    /// Create an empty service.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            config,
        }
    }

    /// Service tunables.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// A client issuing calls as `identity`.
    #[must_use]
    pub fn client(&self, identity: Identity) -> SimClient {
        SimClient::new(self.clone(), identity)
    }

    /// Number of clusters across all tenants.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.state.read().clusters.len()
    }

    /// Whether a cluster exists, regardless of owner.
    #[must_use]
    pub fn contains(&self, id: &ClusterId) -> bool {
        self.state.read().clusters.contains_key(id)
    }

    /// A cluster as stored, bypassing visibility and without advancing it.
    #[must_use]
    pub fn snapshot(&self, id: &ClusterId) -> Option<Cluster> {
        self.state.read().clusters.get(id).map(|r| r.cluster.clone())
    }

    /// Make every delete of `id` fail with HTTP 500.
    pub fn reject_deletes(&self, id: ClusterId) {
        self.state.write().failing_deletes.insert(id);
    }

    fn with_visible<T>(
        &self,
        identity: &Identity,
        id: &ClusterId,
        f: impl FnOnce(&mut ClusterRecord) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let principal = Principal::of(identity)?;
        let mut state = self.state.write();
        let record = state
            .clusters
            .get_mut(id)
            .filter(|r| r.visible_to(&principal))
            .ok_or_else(|| ApiError::not_found(format!("cluster {id} not found")))?;
        f(record)
    }

    pub(crate) fn create_cluster(
        &self,
        identity: &Identity,
        params: &ClusterCreateParams,
    ) -> ApiResult<Cluster> {
        let Principal::User(owner) = Principal::of(identity)? else {
            return Err(ApiError::http(401, "agent credentials cannot create clusters"));
        };
        if params.name.trim().is_empty() {
            return Err(ApiError::http(400, "cluster name must not be empty"));
        }

        let mut state = self.state.write();
        if self.config.enforce_unique_names
            && state
                .clusters
                .values()
                .any(|r| r.owner_token == owner && r.cluster.name == params.name)
        {
            warn!(name = %params.name, "rejecting duplicate cluster name");
            return Err(ApiError::conflict(format!(
                "cluster name '{}' already exists",
                params.name
            )));
        }

        let cluster = Cluster {
            id: ClusterId::new(),
            name: params.name.clone(),
            openshift_version: params.openshift_version.clone(),
            base_dns_domain: params.base_dns_domain.clone(),
            ssh_public_key: params.ssh_public_key.clone(),
            pull_secret_set: !params.pull_secret.is_empty(),
            vip_dhcp_allocation: params.vip_dhcp_allocation,
            api_vip: None,
            ingress_vip: None,
            machine_network_cidr: None,
            status: ClusterStatus::Insufficient,
            status_info: "Cluster is not ready for install: waiting for hosts".to_string(),
            hosts: Vec::new(),
        };
        let mut record = ClusterRecord::new(cluster.clone(), owner, params.pull_secret.clone());
        record.event(
            None,
            EventSeverity::Info,
            format!("Registered cluster {}", cluster.name),
        );
        state.clusters.insert(cluster.id, record);

        info!(cluster_id = %cluster.id, name = %cluster.name, owner = %identity, "simulated cluster created");
        Ok(cluster)
    }

    pub(crate) fn cluster_get(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Cluster> {
        self.with_visible(identity, id, |record| {
            record.advance(&self.config);
            Ok(record.cluster.clone())
        })
    }

    pub(crate) fn clusters_list(&self, identity: &Identity) -> ApiResult<Vec<Cluster>> {
        let principal = Principal::of(identity)?;
        let state = self.state.read();
        let mut clusters: Vec<Cluster> = state
            .clusters
            .values()
            .filter(|r| r.visible_to(&principal))
            .map(|r| r.cluster.clone())
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clusters)
    }

    pub(crate) fn delete_cluster(&self, identity: &Identity, id: &ClusterId) -> ApiResult<()> {
        let principal = Principal::of(identity)?;
        let mut state = self.state.write();
        if !state.clusters.get(id).is_some_and(|r| r.visible_to(&principal)) {
            return Err(ApiError::not_found(format!("cluster {id} not found")));
        }
        if state.failing_deletes.contains(id) {
            return Err(ApiError::http(500, "simulated delete failure"));
        }
        state.clusters.remove(id);
        info!(cluster_id = %id, "simulated cluster deleted");
        Ok(())
    }

    pub(crate) fn get_events(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Vec<Event>> {
        self.with_visible(identity, id, |record| Ok(record.events.clone()))
    }

    pub(crate) fn update_cluster(
        &self,
        identity: &Identity,
        id: &ClusterId,
        params: &ClusterUpdateParams,
    ) -> ApiResult<Cluster> {
        self.with_visible(identity, id, |record| {
            if !record.is_pre_install() {
                return Err(ApiError::conflict(format!(
                    "cluster {id} cannot be updated in status {}",
                    record.cluster.status
                )));
            }
            for update in &params.hosts_roles {
                if !record.cluster.hosts.iter().any(|h| h.id == update.id) {
                    return Err(ApiError::http(400, format!("host {} is not part of cluster {id}", update.id)));
                }
            }

            let cluster = &mut record.cluster;
            if let Some(name) = &params.name {
                cluster.name.clone_from(name);
            }
            if let Some(dhcp) = params.vip_dhcp_allocation {
                cluster.vip_dhcp_allocation = dhcp;
            }
            if params.api_vip.is_some() {
                cluster.api_vip.clone_from(&params.api_vip);
            }
            if params.ingress_vip.is_some() {
                cluster.ingress_vip.clone_from(&params.ingress_vip);
            }
            if params.machine_network_cidr.is_some() {
                cluster.machine_network_cidr.clone_from(&params.machine_network_cidr);
            }
            for update in &params.hosts_roles {
                if let Some(host) = cluster.hosts.iter_mut().find(|h| h.id == update.id) {
                    host.role = update.role;
                }
            }

            record.event(None, EventSeverity::Info, "Cluster was updated");
            record.refresh_pre_install_status();
            Ok(record.cluster.clone())
        })
    }

    pub(crate) fn generate_image(
        &self,
        identity: &Identity,
        id: &ClusterId,
        params: &ImageCreateParams,
    ) -> ApiResult<()> {
        self.with_visible(identity, id, |record| {
            record.image_ssh_key = Some(params.ssh_public_key.clone());
            record.event(None, EventSeverity::Info, "Generated image");
            debug!(cluster_id = %id, "simulated image generated");
            Ok(())
        })
    }

    pub(crate) fn download_image(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Vec<u8>> {
        self.with_visible(identity, id, |record| {
            if record.image_ssh_key.is_none() {
                return Err(ApiError::conflict(format!("image for cluster {id} was not generated")));
            }
            SimImage {
                cluster_id: record.id(),
                pull_secret: record.pull_secret.clone(),
            }
            .to_bytes()
        })
    }

    pub(crate) fn get_hosts(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Vec<Host>> {
        self.with_visible(identity, id, |record| {
            record.advance(&self.config);
            Ok(record.cluster.hosts.clone())
        })
    }

    pub(crate) fn register_host(
        &self,
        identity: &Identity,
        id: &ClusterId,
        params: &HostRegisterParams,
    ) -> ApiResult<Host> {
        self.with_visible(identity, id, |record| {
            if let Some(existing) = record.cluster.hosts.iter().find(|h| h.id == params.host_id) {
                return Ok(existing.clone());
            }
            if !record.is_pre_install() {
                return Err(ApiError::conflict(format!(
                    "cannot register a host to cluster {id} in status {}",
                    record.cluster.status
                )));
            }
            let host = Host {
                id: params.host_id,
                cluster_id: *id,
                requested_hostname: String::new(),
                role: HostRole::AutoAssign,
                status: HostStatus::Discovering,
                status_info: "Waiting for host inventory".to_string(),
                progress: HostProgressInfo::default(),
                last_step_type: None,
            };
            record.cluster.hosts.push(host.clone());
            record.event(Some(host.id), EventSeverity::Info, format!("Host {} registered", host.id));
            record.refresh_pre_install_status();
            info!(cluster_id = %id, host_id = %host.id, "simulated host registered");
            Ok(host)
        })
    }

    pub(crate) fn host_get_next_steps(
        &self,
        identity: &Identity,
        id: &ClusterId,
        host_id: &HostId,
    ) -> ApiResult<Steps> {
        self.with_visible(identity, id, |record| {
            let host = record.host_mut(host_id)?;
            let mut instructions = Vec::new();
            if host.requested_hostname.is_empty() {
                instructions.push(Step {
                    step_type: StepType::Inventory,
                    step_id: format!("inventory-{}", &Uuid::new_v4().simple().to_string()[..8]),
                    command: "inventory".to_string(),
                    args: Vec::new(),
                });
            }
            if host.status == HostStatus::Installing && host.last_step_type != Some(StepType::Install) {
                instructions.push(Step {
                    step_type: StepType::Install,
                    step_id: format!("install-{}", &Uuid::new_v4().simple().to_string()[..8]),
                    command: "installer".to_string(),
                    args: vec!["--role".to_string(), host.role.to_string()],
                });
            }
            Ok(Steps {
                next_instruction_seconds: NEXT_INSTRUCTION_SECONDS,
                instructions,
            })
        })
    }

    pub(crate) fn host_post_step_result(
        &self,
        identity: &Identity,
        id: &ClusterId,
        host_id: &HostId,
        reply: &StepReply,
    ) -> ApiResult<()> {
        self.with_visible(identity, id, |record| {
            let host = record.host_mut(host_id)?;
            host.last_step_type = Some(reply.step_type);
            if reply.step_type == StepType::Inventory && reply.exit_code == 0 {
                let inventory: Option<HostInventory> = serde_json::from_str(&reply.output)
                    .map_err(|e| ApiError::http(400, format!("invalid inventory: {e}")))?;
                if let Some(inventory) = inventory.filter(|i| !i.hostname.is_empty()) {
                    host.requested_hostname = inventory.hostname;
                }
            }
            record.refresh_pre_install_status();
            Ok(())
        })
    }

    pub(crate) fn update_host_install_progress(
        &self,
        identity: &Identity,
        id: &ClusterId,
        host_id: &HostId,
        progress: &HostProgressUpdate,
    ) -> ApiResult<()> {
        self.with_visible(identity, id, |record| {
            if !record.cluster.status.is_installing() {
                return Err(ApiError::conflict(format!(
                    "cluster {id} is not installing (status {})",
                    record.cluster.status
                )));
            }
            let host = record.host_mut(host_id)?;
            host.progress = HostProgressInfo {
                current_stage: Some(progress.current_stage),
                progress_info: progress.progress_info.clone().unwrap_or_default(),
            };
            match progress.current_stage {
                HostStage::Failed => {
                    host.status = HostStatus::Error;
                    host.status_info = progress
                        .progress_info
                        .clone()
                        .unwrap_or_else(|| "installation failed".to_string());
                    let message = format!("Host {host_id} failed to install");
                    record.event(Some(*host_id), EventSeverity::Error, message);
                    record.set_status(ClusterStatus::Error, format!("host {host_id} failed to install"));
                }
                HostStage::Done => host.status = HostStatus::Installed,
                _ => {
                    if host.status == HostStatus::Installing {
                        host.status = HostStatus::InstallingInProgress;
                    }
                }
            }
            Ok(())
        })
    }

    pub(crate) fn install_cluster(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Cluster> {
        self.with_visible(identity, id, |record| {
            record.refresh_pre_install_status();
            if record.cluster.status != ClusterStatus::Ready {
                return Err(ApiError::conflict(format!(
                    "cluster {id} is not ready to install (status {})",
                    record.cluster.status
                )));
            }
            for host in &mut record.cluster.hosts {
                host.status = HostStatus::Installing;
                host.status_info = "Installation is in progress".to_string();
                host.progress.current_stage = Some(HostStage::StartingInstallation);
            }
            record.host_ticks.clear();
            record.set_status(ClusterStatus::PreparingForInstallation, "Preparing cluster for installation");
            info!(cluster_id = %id, "simulated installation started");
            Ok(record.cluster.clone())
        })
    }

    pub(crate) fn cancel_installation(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Cluster> {
        self.with_visible(identity, id, |record| {
            if !record.cluster.status.is_installing() && record.cluster.status != ClusterStatus::Error {
                return Err(ApiError::conflict(format!(
                    "cluster {id} cannot be cancelled in status {}",
                    record.cluster.status
                )));
            }
            for host in &mut record.cluster.hosts {
                if host.status != HostStatus::Installed {
                    host.status = HostStatus::Cancelled;
                }
            }
            record.set_status(ClusterStatus::Cancelled, "Installation was cancelled by user");
            warn!(cluster_id = %id, "simulated installation cancelled");
            Ok(record.cluster.clone())
        })
    }

    pub(crate) fn complete_installation(
        &self,
        identity: &Identity,
        id: &ClusterId,
        params: &CompletionParams,
    ) -> ApiResult<()> {
        self.with_visible(identity, id, |record| {
            if !record.cluster.status.is_installing() {
                return Err(ApiError::conflict(format!(
                    "cluster {id} is not installing (status {})",
                    record.cluster.status
                )));
            }
            if params.is_success {
                for host in &mut record.cluster.hosts {
                    host.status = HostStatus::Installed;
                    host.progress.current_stage = Some(HostStage::Done);
                }
                record.set_status(ClusterStatus::Installed, "Cluster is installed");
            } else {
                let info = params
                    .error_info
                    .clone()
                    .unwrap_or_else(|| "installation failed".to_string());
                record.set_status(ClusterStatus::Error, info);
            }
            Ok(())
        })
    }

    pub(crate) fn download_cluster_file(
        &self,
        identity: &Identity,
        id: &ClusterId,
        file: DownloadFile,
    ) -> ApiResult<Vec<u8>> {
        self.with_visible(identity, id, |record| {
            let available = match file {
                DownloadFile::Kubeconfig => record.cluster.status == ClusterStatus::Installed,
                _ => record.has_started_install(),
            };
            if !available {
                return Err(ApiError::conflict(format!(
                    "{file} is not available in status {}",
                    record.cluster.status
                )));
            }
            Ok(record.render_file(file))
        })
    }

    pub(crate) fn get_install_config(&self, identity: &Identity, id: &ClusterId) -> ApiResult<String> {
        self.with_visible(identity, id, |record| Ok(record.render_install_config()))
    }

    pub(crate) fn get_credentials(&self, identity: &Identity, id: &ClusterId) -> ApiResult<Credentials> {
        self.with_visible(identity, id, |record| {
            if record.cluster.status != ClusterStatus::Installed {
                return Err(ApiError::conflict(format!(
                    "credentials are not available in status {}",
                    record.cluster.status
                )));
            }
            Ok(Credentials {
                username: "kubeadmin".to_string(),
                password: record.admin_password.clone(),
                console_url: format!(
                    "https://console-openshift-console.apps.{}.{}",
                    record.cluster.name, record.cluster.base_dns_domain
                ),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assisted_api::{HostRoleUpdate, InventoryInterface};

    fn owner() -> Identity {
        Identity::user("user1", "token-1", "pull-1")
    }

    fn params(name: &str) -> ClusterCreateParams {
        ClusterCreateParams {
            name: name.into(),
            openshift_version: "4.6".into(),
            pull_secret: "pull-1".into(),
            ssh_public_key: "ssh-rsa AAAA".into(),
            base_dns_domain: "redhat.com".into(),
            vip_dhcp_allocation: false,
        }
    }

    fn fast() -> SimService {
        SimService::new(SimConfig {
            discovery_ticks: 1,
            install_ticks: 1,
            finalize_ticks: 1,
            ..SimConfig::default()
        })
    }

    fn add_host(svc: &SimService, id: &ClusterId, hostname: &str) -> HostId {
        let agent = Identity::agent("agent", "pull-1");
        let host_id = HostId::new();
        svc.register_host(&agent, id, &HostRegisterParams { host_id, discovery_agent_version: None })
            .unwrap();
        let inventory = HostInventory {
            hostname: hostname.into(),
            interfaces: vec![InventoryInterface::default()],
        };
        let reply = StepReply {
            step_type: StepType::Inventory,
            step_id: "inventory-1".into(),
            exit_code: 0,
            output: serde_json::to_string(&inventory).unwrap(),
            error: None,
        };
        svc.host_post_step_result(&agent, id, &host_id, &reply).unwrap();
        host_id
    }

    #[test]
    fn other_tenant_sees_not_found() {
        let svc = SimService::default();
        let cluster = svc.create_cluster(&owner(), &params("c1")).unwrap();
        let other = Identity::user("user2", "token-2", "pull-2");
        let err = svc.cluster_get(&other, &cluster.id).unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.reason(), Some("Not Found"));
        assert!(svc.clusters_list(&other).unwrap().is_empty());
    }

    #[test]
    fn agent_with_pull_secret_sees_cluster() {
        let svc = SimService::default();
        let cluster = svc.create_cluster(&owner(), &params("c1")).unwrap();
        let agent = Identity::agent("agent", "pull-1");
        assert_eq!(svc.cluster_get(&agent, &cluster.id).unwrap().id, cluster.id);
        let stranger = Identity::agent("agent2", "pull-2");
        assert!(svc.cluster_get(&stranger, &cluster.id).unwrap_err().is_not_found());
    }

    #[test]
    fn missing_credentials_are_unauthorized() {
        let svc = SimService::default();
        let nobody = Identity::agent("nobody", "");
        let err = svc.clusters_list(&nobody).unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn duplicate_names_follow_config() {
        let lenient = SimService::default();
        lenient.create_cluster(&owner(), &params("dup")).unwrap();
        assert!(lenient.create_cluster(&owner(), &params("dup")).is_ok());

        let strict = SimService::new(SimConfig {
            enforce_unique_names: true,
            ..SimConfig::default()
        });
        strict.create_cluster(&owner(), &params("dup")).unwrap();
        let err = strict.create_cluster(&owner(), &params("dup")).unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn hosts_become_known_after_discovery_ticks() {
        let svc = SimService::default();
        let id = svc.create_cluster(&owner(), &params("c1")).unwrap().id;
        add_host(&svc, &id, "master-0");
        let first = svc.get_hosts(&owner(), &id).unwrap();
        assert_eq!(first[0].status, HostStatus::Discovering);
        let second = svc.get_hosts(&owner(), &id).unwrap();
        assert_eq!(second[0].status, HostStatus::Known);
        assert_eq!(second[0].requested_hostname, "master-0");
    }

    #[test]
    fn host_without_inventory_stays_discovering() {
        let svc = fast();
        let id = svc.create_cluster(&owner(), &params("c1")).unwrap().id;
        let agent = Identity::agent("agent", "pull-1");
        let host_id = HostId::new();
        svc.register_host(&agent, &id, &HostRegisterParams { host_id, discovery_agent_version: None })
            .unwrap();
        for _ in 0..5 {
            svc.get_hosts(&owner(), &id).unwrap();
        }
        let steps = svc.host_get_next_steps(&agent, &id, &host_id).unwrap();
        assert_eq!(steps.instructions[0].step_type, StepType::Inventory);
        assert_eq!(svc.get_hosts(&owner(), &id).unwrap()[0].status, HostStatus::Discovering);
    }

    #[test]
    fn full_install_progression() {
        let svc = fast();
        let id = svc.create_cluster(&owner(), &params("c1")).unwrap().id;
        let master = add_host(&svc, &id, "master-0");
        let worker = add_host(&svc, &id, "worker-0");
        svc.get_hosts(&owner(), &id).unwrap();

        let err = svc.install_cluster(&owner(), &id).unwrap_err();
        assert_eq!(err.status(), Some(409));

        let update = ClusterUpdateParams {
            api_vip: Some("192.168.126.100".into()),
            ingress_vip: Some("192.168.126.101".into()),
            hosts_roles: vec![
                HostRoleUpdate { id: master, role: HostRole::Master },
                HostRoleUpdate { id: worker, role: HostRole::Worker },
            ],
            ..Default::default()
        };
        let updated = svc.update_cluster(&owner(), &id, &update).unwrap();
        assert_eq!(updated.status, ClusterStatus::Ready);
        assert!(svc.get_credentials(&owner(), &id).is_err());

        svc.install_cluster(&owner(), &id).unwrap();
        assert!(svc.download_cluster_file(&owner(), &id, DownloadFile::KubeconfigNoIngress).is_ok());
        assert!(svc.download_cluster_file(&owner(), &id, DownloadFile::Kubeconfig).is_err());

        let mut status = ClusterStatus::PreparingForInstallation;
        for _ in 0..10 {
            status = svc.cluster_get(&owner(), &id).unwrap().status;
            if status == ClusterStatus::Installed {
                break;
            }
        }
        assert_eq!(status, ClusterStatus::Installed);
        let creds = svc.get_credentials(&owner(), &id).unwrap();
        assert_eq!(creds.username, "kubeadmin");
        assert!(!svc.get_events(&owner(), &id).unwrap().is_empty());
    }

    #[test]
    fn failed_progress_fails_cluster() {
        let svc = fast();
        let id = svc.create_cluster(&owner(), &params("c1")).unwrap().id;
        let master = add_host(&svc, &id, "master-0");
        svc.get_hosts(&owner(), &id).unwrap();
        let update = ClusterUpdateParams {
            api_vip: Some("10.0.0.100".into()),
            ingress_vip: Some("10.0.0.101".into()),
            hosts_roles: vec![HostRoleUpdate { id: master, role: HostRole::Master }],
            ..Default::default()
        };
        svc.update_cluster(&owner(), &id, &update).unwrap();
        svc.install_cluster(&owner(), &id).unwrap();

        let progress = HostProgressUpdate {
            current_stage: HostStage::Failed,
            progress_info: Some("disk error".into()),
        };
        svc.update_host_install_progress(&owner(), &id, &master, &progress).unwrap();
        let cluster = svc.cluster_get(&owner(), &id).unwrap();
        assert_eq!(cluster.status, ClusterStatus::Error);
        assert_eq!(cluster.hosts[0].status, HostStatus::Error);
    }

    #[test]
    fn delete_removes_cluster_and_honours_injected_failure() {
        let svc = SimService::default();
        let keep = svc.create_cluster(&owner(), &params("keep")).unwrap().id;
        let gone = svc.create_cluster(&owner(), &params("gone")).unwrap().id;
        svc.reject_deletes(keep);

        svc.delete_cluster(&owner(), &gone).unwrap();
        assert!(!svc.contains(&gone));
        assert!(svc.cluster_get(&owner(), &gone).unwrap_err().is_not_found());

        let err = svc.delete_cluster(&owner(), &keep).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(svc.contains(&keep));
    }

    #[test]
    fn image_download_requires_generation() {
        let svc = SimService::default();
        let id = svc.create_cluster(&owner(), &params("c1")).unwrap().id;
        assert_eq!(svc.download_image(&owner(), &id).unwrap_err().status(), Some(409));
        svc.generate_image(&owner(), &id, &ImageCreateParams { ssh_public_key: "k".into() })
            .unwrap();
        let image = SimImage::from_bytes(&svc.download_image(&owner(), &id).unwrap()).unwrap();
        assert_eq!(image.cluster_id, id);
        assert_eq!(image.pull_secret, "pull-1");
    }

    #[test]
    fn null_inventory_output_is_accepted() {
        let svc = SimService::default();
        let id = svc.create_cluster(&owner(), &params("c1")).unwrap().id;
        let agent = Identity::agent("agent", "pull-1");
        let host_id = HostId::new();
        svc.register_host(&agent, &id, &HostRegisterParams { host_id, discovery_agent_version: None })
            .unwrap();
        let reply = StepReply {
            step_type: StepType::Inventory,
            step_id: "inventory-e048e0db".into(),
            exit_code: 0,
            output: "null".into(),
            error: None,
        };
        svc.host_post_step_result(&agent, &id, &host_id, &reply).unwrap();
        let host = &svc.snapshot(&id).unwrap().hosts[0];
        assert_eq!(host.last_step_type, Some(StepType::Inventory));
        assert!(host.requested_hostname.is_empty());
    }
}
