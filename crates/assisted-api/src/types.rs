//! Data model of the installation API.
//!
//! Field names follow the service's JSON (snake_case); status enums use the
//! service's kebab-case spellings and fall back to `Unknown` for values this
//! crate does not model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an identifier from its string form.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid UUID.
            pub fn parse(s: &str) -> Result<Self, ApiError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ApiError::Decode(format!("invalid UUID '{s}': {e}")))
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a cluster.
    ClusterId
);

uuid_id!(
    /// Identifier of a host, scoped to its cluster.
    HostId
);

/// Remote cluster status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterStatus {
    /// Not enough hosts or missing configuration.
    Insufficient,
    /// Waiting for user input (roles, VIPs).
    PendingForInput,
    /// Every precondition for installation holds.
    Ready,
    /// Installation accepted, preparing hosts.
    PreparingForInstallation,
    /// Hosts are installing.
    Installing,
    /// Installation paused on a user action.
    InstallingPendingUserAction,
    /// Hosts installed, control plane finalizing.
    Finalizing,
    /// Installation complete.
    Installed,
    /// Installation failed.
    Error,
    /// Installation cancelled.
    Cancelled,
    /// A status this crate does not model.
    #[serde(other)]
    Unknown,
}

impl ClusterStatus {
    /// Installation has started and not yet reached a terminal status.
    #[must_use]
    pub const fn is_installing(self) -> bool {
        matches!(
            self,
            Self::PreparingForInstallation
                | Self::Installing
                | Self::InstallingPendingUserAction
                | Self::Finalizing
        )
    }

    /// The installation ended unsuccessfully.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insufficient => "insufficient",
            Self::PendingForInput => "pending-for-input",
            Self::Ready => "ready",
            Self::PreparingForInstallation => "preparing-for-installation",
            Self::Installing => "installing",
            Self::InstallingPendingUserAction => "installing-pending-user-action",
            Self::Finalizing => "finalizing",
            Self::Installed => "installed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Remote host status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostStatus {
    /// Registered, inventory not yet validated.
    Discovering,
    /// Discovered and valid.
    Known,
    /// Discovered but failing validations.
    Insufficient,
    /// Agent stopped checking in.
    Disconnected,
    /// Waiting for user input.
    PendingForInput,
    /// Installation accepted for this host.
    Installing,
    /// Writing the image and rebooting.
    InstallingInProgress,
    /// Host installed.
    Installed,
    /// Host installation failed.
    Error,
    /// Host installation cancelled.
    Cancelled,
    /// A status this crate does not model.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovering => "discovering",
            Self::Known => "known",
            Self::Insufficient => "insufficient",
            Self::Disconnected => "disconnected",
            Self::PendingForInput => "pending-for-input",
            Self::Installing => "installing",
            Self::InstallingInProgress => "installing-in-progress",
            Self::Installed => "installed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Role of a host in the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostRole {
    /// No role chosen yet.
    #[default]
    AutoAssign,
    /// Control-plane node.
    Master,
    /// Worker node.
    Worker,
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AutoAssign => "auto-assign",
            Self::Master => "master",
            Self::Worker => "worker",
        };
        f.write_str(s)
    }
}

/// Installation stage reported by a host's agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostStage {
    /// Installer started.
    #[serde(rename = "Starting installation")]
    StartingInstallation,
    /// Installer running.
    #[serde(rename = "Installing")]
    Installing,
    /// Writing the OS image to disk.
    #[serde(rename = "Writing image to disk")]
    WritingImageToDisk,
    /// Rebooting into the installed OS.
    #[serde(rename = "Rebooting")]
    Rebooting,
    /// Host finished installing.
    #[serde(rename = "Done")]
    Done,
    /// Host installation failed.
    #[serde(rename = "Failed")]
    Failed,
}

/// Installation progress of one host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProgressInfo {
    /// Current stage, if the host started installing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<HostStage>,
    /// Free-form progress detail.
    #[serde(default)]
    pub progress_info: String,
}

/// A host registered against a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Host identifier.
    pub id: HostId,
    /// Owning cluster.
    pub cluster_id: ClusterId,
    /// Hostname reported by the agent's inventory (empty until reported).
    #[serde(default)]
    pub requested_hostname: String,
    /// Assigned role.
    #[serde(default)]
    pub role: HostRole,
    /// Discovery/installation status.
    pub status: HostStatus,
    /// Human-readable status detail.
    #[serde(default)]
    pub status_info: String,
    /// Installation progress.
    #[serde(default)]
    pub progress: HostProgressInfo,
    /// Step type of the last step result the agent posted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_step_type: Option<StepType>,
}

/// A cluster as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster identifier.
    pub id: ClusterId,
    /// Display name.
    pub name: String,
    /// Target platform version.
    pub openshift_version: String,
    /// Base DNS domain.
    #[serde(default)]
    pub base_dns_domain: String,
    /// SSH public key injected into hosts.
    #[serde(default)]
    pub ssh_public_key: String,
    /// Whether a pull secret was supplied at creation.
    #[serde(default)]
    pub pull_secret_set: bool,
    /// Whether VIPs are allocated by DHCP.
    #[serde(default)]
    pub vip_dhcp_allocation: bool,
    /// API virtual IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_vip: Option<String>,
    /// Ingress virtual IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_vip: Option<String>,
    /// Machine network CIDR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_network_cidr: Option<String>,
    /// Cluster status.
    pub status: ClusterStatus,
    /// Human-readable status detail.
    #[serde(default)]
    pub status_info: String,
    /// Hosts registered so far.
    #[serde(default)]
    pub hosts: Vec<Host>,
}

impl Cluster {
    /// Find a host by its requested hostname.
    #[must_use]
    pub fn host_by_name(&self, hostname: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.requested_hostname == hostname)
    }
}

/// Parameters for creating a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCreateParams {
    /// Display name.
    pub name: String,
    /// Target platform version.
    pub openshift_version: String,
    /// Pull secret (JSON docker auth config).
    pub pull_secret: String,
    /// SSH public key.
    pub ssh_public_key: String,
    /// Base DNS domain.
    pub base_dns_domain: String,
    /// Whether VIPs are allocated by DHCP.
    pub vip_dhcp_allocation: bool,
}

/// Role change for one host, sent inside [`ClusterUpdateParams`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRoleUpdate {
    /// Host to update.
    pub id: HostId,
    /// New role.
    pub role: HostRole,
}

/// Partial cluster update (PATCH). Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterUpdateParams {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// API virtual IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_vip: Option<String>,
    /// Ingress virtual IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_vip: Option<String>,
    /// Machine network CIDR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_network_cidr: Option<String>,
    /// VIP DHCP allocation flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip_dhcp_allocation: Option<bool>,
    /// Host role assignments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts_roles: Vec<HostRoleUpdate>,
}

impl ClusterUpdateParams {
    /// Whether the update carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parameters for generating a discovery image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCreateParams {
    /// SSH public key baked into the image.
    pub ssh_public_key: String,
}

/// Parameters an agent sends to register its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRegisterParams {
    /// Host identifier chosen by the agent.
    pub host_id: HostId,
    /// Agent version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_agent_version: Option<String>,
}

/// Type of an agent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    /// Hardware/network inventory.
    Inventory,
    /// Connectivity check between hosts.
    ConnectivityCheck,
    /// Free address scan.
    FreeNetworkAddresses,
    /// Install the host.
    Install,
    /// Generic command execution.
    Execute,
    /// A step type this crate does not model.
    #[serde(other)]
    Unknown,
}

/// One instruction for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step type.
    pub step_type: StepType,
    /// Unique step identifier.
    pub step_id: String,
    /// Command to run.
    #[serde(default)]
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Next instructions for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Steps {
    /// Seconds the agent should wait before asking again.
    pub next_instruction_seconds: u64,
    /// Instructions to run now.
    #[serde(default)]
    pub instructions: Vec<Step>,
}

/// Result of an agent step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReply {
    /// Step type.
    pub step_type: StepType,
    /// Step identifier the reply answers.
    pub step_id: String,
    /// Exit code of the step command.
    pub exit_code: i64,
    /// Step output (JSON for inventory).
    pub output: String,
    /// Error text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Installation progress report from an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProgressUpdate {
    /// New stage.
    pub current_stage: HostStage,
    /// Free-form detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_info: Option<String>,
}

/// Completion report for a cluster installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Whether installation succeeded.
    pub is_success: bool,
    /// Error detail when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<String>,
}

/// Admin credentials of an installed cluster.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Admin username.
    pub username: String,
    /// Admin password.
    pub password: String,
    /// Web console URL.
    pub console_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("console_url", &self.console_url)
            .finish()
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    /// Informational.
    Info,
    /// Something may need attention.
    Warning,
    /// Something failed.
    Error,
    /// Something failed badly.
    Critical,
}

/// A cluster event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Cluster the event belongs to.
    pub cluster_id: ClusterId,
    /// Host the event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<HostId>,
    /// Severity.
    pub severity: EventSeverity,
    /// Message text.
    pub message: String,
    /// When the event happened.
    pub event_time: DateTime<Utc>,
}

/// Files downloadable from an installing or installed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadFile {
    /// Kubeconfig without the ingress CA, available once installation starts.
    KubeconfigNoIngress,
    /// Full kubeconfig, available once installed.
    Kubeconfig,
    /// Bootstrap ignition.
    BootstrapIgnition,
    /// Master ignition.
    MasterIgnition,
    /// Worker ignition.
    WorkerIgnition,
}

impl DownloadFile {
    /// File name as the service expects it in `file_name`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KubeconfigNoIngress => "kubeconfig-noingress",
            Self::Kubeconfig => "kubeconfig",
            Self::BootstrapIgnition => "bootstrap.ign",
            Self::MasterIgnition => "master.ign",
            Self::WorkerIgnition => "worker.ign",
        }
    }
}

impl fmt::Display for DownloadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network interface in a host inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryInterface {
    /// Interface name.
    pub name: String,
    /// IPv4 addresses in CIDR notation.
    #[serde(default)]
    pub ipv4_addresses: Vec<String>,
}

/// Inventory reported by an agent in an `inventory` step result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInventory {
    /// Hostname of the machine.
    pub hostname: String,
    /// Network interfaces.
    #[serde(default)]
    pub interfaces: Vec<InventoryInterface>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_status_uses_kebab_case() {
        let json = serde_json::to_string(&ClusterStatus::PreparingForInstallation).unwrap();
        assert_eq!(json, "\"preparing-for-installation\"");
        let parsed: ClusterStatus = serde_json::from_str("\"installing-pending-user-action\"").unwrap();
        assert_eq!(parsed, ClusterStatus::InstallingPendingUserAction);
    }

    #[test]
    fn unknown_status_does_not_fail_decoding() {
        let parsed: HostStatus = serde_json::from_str("\"resetting-pending-user-action\"").unwrap();
        assert_eq!(parsed, HostStatus::Unknown);
    }

    #[test]
    fn host_role_display_matches_wire_name() {
        for role in [HostRole::AutoAssign, HostRole::Master, HostRole::Worker] {
            let wire = serde_json::to_string(&role).unwrap();
            assert_eq!(wire, format!("\"{role}\""));
        }
    }

    #[test]
    fn update_params_skip_unset_fields() {
        let params = ClusterUpdateParams {
            api_vip: Some("192.168.126.100".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({ "api_vip": "192.168.126.100" }));
        assert!(ClusterUpdateParams::default().is_empty());
        assert!(!params.is_empty());
    }

    #[test]
    fn host_stage_uses_display_names() {
        let json = serde_json::to_string(&HostStage::WritingImageToDisk).unwrap();
        assert_eq!(json, "\"Writing image to disk\"");
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "kubeadmin".into(),
            password: "hunter2".into(),
            console_url: "https://console.example".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("kubeadmin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn cluster_id_parse_rejects_garbage() {
        assert!(ClusterId::parse("not-a-uuid").is_err());
        let id = ClusterId::new();
        assert_eq!(ClusterId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn host_by_name_finds_registered_host() {
        let cluster_id = ClusterId::new();
        let host = Host {
            id: HostId::new(),
            cluster_id,
            requested_hostname: "master-0".into(),
            role: HostRole::AutoAssign,
            status: HostStatus::Known,
            status_info: String::new(),
            progress: HostProgressInfo::default(),
            last_step_type: None,
        };
        let cluster = Cluster {
            id: cluster_id,
            name: "c1".into(),
            openshift_version: "4.6".into(),
            base_dns_domain: "example.com".into(),
            ssh_public_key: String::new(),
            pull_secret_set: true,
            vip_dhcp_allocation: false,
            api_vip: None,
            ingress_vip: None,
            machine_network_cidr: None,
            status: ClusterStatus::Insufficient,
            status_info: String::new(),
            hosts: vec![host.clone()],
        };
        assert_eq!(cluster.host_by_name("master-0"), Some(&host));
        assert!(cluster.host_by_name("worker-0").is_none());
    }
}
