//! Cross-tenant isolation checks.
//!
//! The owner drives a cluster through installation with
//! [`ClusterLifecycle`]. At each milestone a second identity (the intruder)
//! attempts what a legitimate owner could do at that point, and every attempt
//! must fail with `404 Not Found`. A 403 would leak that the cluster exists.

use std::fmt;

use assisted_api::{
    ApiResult, ClusterId, ClusterUpdateParams, CompletionParams, DownloadFile, HostId,
    HostProgressUpdate, HostRegisterParams, HostStage, ImageCreateParams, InstallerApi,
    StepReply, StepType,
};
use assisted_nodes::NodeController;
use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::lifecycle::{ClusterLifecycle, RoleAssignment, network_update};

/// Status every cross-tenant attempt must fail with.
pub const ISOLATION_STATUS: u16 = 404;

/// Reason phrase every cross-tenant attempt must fail with.
pub const ISOLATION_REASON: &str = "Not Found";

/// Step id of the dummy inventory reply posted by the agent check.
pub const DUMMY_STEP_ID: &str = "inventory-e048e0db";

/// An API call attempted by the intruder, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Read the cluster.
    GetCluster(ClusterId),
    /// Delete the cluster.
    DeleteCluster(ClusterId),
    /// Generate the discovery image.
    GenerateImage {
        /// Target cluster.
        cluster_id: ClusterId,
        /// Key to inject.
        ssh_public_key: String,
    },
    /// Patch network parameters.
    PatchNetworkParams {
        /// Target cluster.
        cluster_id: ClusterId,
        /// The patch.
        params: ClusterUpdateParams,
    },
    /// List the cluster's hosts.
    ListHosts(ClusterId),
    /// Trigger installation.
    InstallCluster(ClusterId),
    /// Fetch a host's next install step.
    GetNextSteps {
        /// Target cluster.
        cluster_id: ClusterId,
        /// Target host.
        host_id: HostId,
    },
    /// Post a step result for a host.
    PostStepResult {
        /// Target cluster.
        cluster_id: ClusterId,
        /// Target host.
        host_id: HostId,
        /// The reply.
        reply: StepReply,
    },
    /// Report a host's installation as failed.
    FailInstall {
        /// Target cluster.
        cluster_id: ClusterId,
        /// Target host.
        host_id: HostId,
    },
    /// Download a generated file.
    DownloadArtifact {
        /// Target cluster.
        cluster_id: ClusterId,
        /// File to download.
        file: DownloadFile,
    },
    /// Read the install-config.
    GetInstallConfig(ClusterId),
    /// Cancel the installation.
    CancelInstall(ClusterId),
    /// Fetch the admin credentials.
    GetCredentials(ClusterId),
    /// Register a host.
    RegisterHost {
        /// Target cluster.
        cluster_id: ClusterId,
        /// Host to register.
        host_id: HostId,
    },
    /// Report installation completion.
    CompleteInstallation {
        /// Target cluster.
        cluster_id: ClusterId,
        /// Whether to report success.
        is_success: bool,
    },
}

impl Operation {
    /// The dummy inventory reply for `host_id`.
    #[must_use]
    pub fn dummy_step_result(cluster_id: ClusterId, host_id: HostId) -> Self {
        Self::PostStepResult {
            cluster_id,
            host_id,
            reply: StepReply {
                step_type: StepType::Inventory,
                step_id: DUMMY_STEP_ID.to_string(),
                exit_code: 0,
                output: "null".to_string(),
                error: None,
            },
        }
    }

    /// Short name used in reports and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetCluster(_) => "get cluster",
            Self::DeleteCluster(_) => "delete cluster",
            Self::GenerateImage { .. } => "generate image",
            Self::PatchNetworkParams { .. } => "patch network params",
            Self::ListHosts(_) => "list hosts",
            Self::InstallCluster(_) => "install cluster",
            Self::GetNextSteps { .. } => "get next steps",
            Self::PostStepResult { .. } => "post step result",
            Self::FailInstall { .. } => "fail install",
            Self::DownloadArtifact { .. } => "download artifact",
            Self::GetInstallConfig(_) => "get install config",
            Self::CancelInstall(_) => "cancel install",
            Self::GetCredentials(_) => "get credentials",
            Self::RegisterHost { .. } => "register host",
            Self::CompleteInstallation { .. } => "complete installation",
        }
    }

    /// Issue the call through `api`, discarding any response body.
    ///
    /// # Errors
    ///
    /// Returns whatever the API returns.
    pub async fn invoke<A: InstallerApi>(&self, api: &A) -> ApiResult<()> {
        match self {
            Self::GetCluster(id) => api.cluster_get(id).await.map(drop),
            Self::DeleteCluster(id) => api.delete_cluster(id).await,
            Self::GenerateImage {
                cluster_id,
                ssh_public_key,
            } => {
                let params = ImageCreateParams {
                    ssh_public_key: ssh_public_key.clone(),
                };
                api.generate_image(cluster_id, &params).await
            }
            Self::PatchNetworkParams { cluster_id, params } => {
                api.update_cluster(cluster_id, params).await.map(drop)
            }
            Self::ListHosts(id) => api.get_hosts(id).await.map(drop),
            Self::InstallCluster(id) => api.install_cluster(id).await.map(drop),
            Self::GetNextSteps { cluster_id, host_id } => {
                api.host_get_next_steps(cluster_id, host_id).await.map(drop)
            }
            Self::PostStepResult {
                cluster_id,
                host_id,
                reply,
            } => api.host_post_step_result(cluster_id, host_id, reply).await,
            Self::FailInstall { cluster_id, host_id } => {
                let progress = HostProgressUpdate {
                    current_stage: HostStage::Failed,
                    progress_info: None,
                };
                api.update_host_install_progress(cluster_id, host_id, &progress)
                    .await
            }
            Self::DownloadArtifact { cluster_id, file } => {
                api.download_cluster_file(cluster_id, *file).await.map(drop)
            }
            Self::GetInstallConfig(id) => api.get_install_config(id).await.map(drop),
            Self::CancelInstall(id) => api.cancel_installation(id).await.map(drop),
            Self::GetCredentials(id) => api.get_credentials(id).await.map(drop),
            Self::RegisterHost {
                cluster_id,
                host_id,
            } => {
                let params = HostRegisterParams {
                    host_id: *host_id,
                    discovery_agent_version: None,
                };
                api.register_host(cluster_id, &params).await.map(drop)
            }
            Self::CompleteInstallation {
                cluster_id,
                is_success,
            } => {
                let params = CompletionParams {
                    is_success: *is_success,
                    error_info: None,
                };
                api.complete_installation(cluster_id, &params).await
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Invoke `operation` and require it to fail with exactly
/// `expected_status` / `expected_reason`.
///
/// # Errors
///
/// Returns [`HarnessError::UnexpectedSuccess`] if the call succeeds and
/// [`HarnessError::UnexpectedError`] if it fails any other way.
pub async fn assert_http_error_code<A: InstallerApi>(
    api: &A,
    operation: &Operation,
    expected_status: u16,
    expected_reason: &str,
) -> Result<()> {
    match operation.invoke(api).await {
        Ok(()) => Err(HarnessError::UnexpectedSuccess {
            operation: operation.name().to_string(),
        }),
        Err(e) if e.status() == Some(expected_status) && e.reason() == Some(expected_reason) => {
            debug!(operation = %operation, status = expected_status, "got expected error");
            Ok(())
        }
        Err(actual) => Err(HarnessError::UnexpectedError {
            operation: operation.name().to_string(),
            expected_status,
            expected_reason: expected_reason.to_string(),
            actual,
        }),
    }
}

/// Points of the owner's lifecycle at which the intruder is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Milestone {
    /// The cluster was just created.
    Created,
    /// The expected hosts were discovered.
    HostsDiscovered,
    /// Roles and network set.
    NetworkConfigured,
    /// Installation started.
    Installing,
    /// Every host installed.
    NodesInstalled,
    /// Installation complete.
    Installed,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::HostsDiscovered => "hosts-discovered",
            Self::NetworkConfigured => "network-configured",
            Self::Installing => "installing",
            Self::NodesInstalled => "nodes-installed",
            Self::Installed => "installed",
        };
        f.write_str(s)
    }
}

/// One passed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationCheck {
    /// Milestone the check ran at.
    pub milestone: Milestone,
    /// Name of the attempted operation.
    pub operation: &'static str,
}

/// Every check an isolation run performed, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolationReport {
    /// Identity the checks ran as.
    pub intruder: String,
    /// The checks, all passed.
    pub checks: Vec<IsolationCheck>,
}

impl IsolationReport {
    /// Whether `operation` was checked at `milestone`.
    #[must_use]
    pub fn covers(&self, milestone: Milestone, operation: &str) -> bool {
        self.checks
            .iter()
            .any(|c| c.milestone == milestone && c.operation == operation)
    }

    /// Operations checked at `milestone`, in order.
    #[must_use]
    pub fn operations_at(&self, milestone: Milestone) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|c| c.milestone == milestone)
            .map(|c| c.operation)
            .collect()
    }
}

/// Runs an intruder's operations against an owner's cluster.
#[derive(Debug)]
pub struct AuthorizationVerifier<I> {
    intruder: I,
    report: IsolationReport,
}

impl<I: InstallerApi> AuthorizationVerifier<I> {
    /// A verifier acting as `intruder`.
    #[must_use]
    pub fn new(intruder: I) -> Self {
        let report = IsolationReport {
            intruder: intruder.identity().name().to_string(),
            checks: Vec::new(),
        };
        Self { intruder, report }
    }

    /// Checks performed so far.
    #[must_use]
    pub fn report(&self) -> &IsolationReport {
        &self.report
    }

    /// Require `operation` to fail with 404 for the intruder and record it.
    ///
    /// # Errors
    ///
    /// Returns the assertion failure.
    pub async fn check(&mut self, milestone: Milestone, operation: Operation) -> Result<()> {
        assert_http_error_code(&self.intruder, &operation, ISOLATION_STATUS, ISOLATION_REASON).await?;
        info!(
            intruder = %self.report.intruder,
            milestone = %milestone,
            operation = %operation,
            "cross-tenant call rejected"
        );
        self.report.checks.push(IsolationCheck {
            milestone,
            operation: operation.name(),
        });
        Ok(())
    }

    async fn check_all(&mut self, milestone: Milestone, operations: Vec<Operation>) -> Result<()> {
        for operation in operations {
            self.check(milestone, operation).await?;
        }
        Ok(())
    }

    /// Install `cluster` as its owner while a second user probes it.
    ///
    /// # Errors
    ///
    /// Returns the first failed check or lifecycle error.
    pub async fn verify_user_isolation<O, N>(
        mut self,
        cluster: &mut ClusterLifecycle<O>,
        nodes: &N,
        expected_hosts: usize,
        roles: &RoleAssignment,
    ) -> Result<IsolationReport>
    where
        O: InstallerApi,
        N: NodeController,
    {
        let id = cluster.id();
        let ssh_public_key = cluster.cluster().await?.ssh_public_key;

        self.check_all(
            Milestone::Created,
            vec![
                Operation::GetCluster(id),
                Operation::DeleteCluster(id),
                Operation::GenerateImage {
                    cluster_id: id,
                    ssh_public_key,
                },
            ],
        )
        .await?;

        cluster.generate_and_download_image().await?;
        cluster.boot_nodes(nodes).await?;
        cluster.wait_until_hosts_are_discovered(expected_hosts).await?;

        self.check_all(
            Milestone::HostsDiscovered,
            vec![Operation::GetCluster(id), Operation::ListHosts(id)],
        )
        .await?;

        cluster.set_host_roles(roles).await?;
        let facts = cluster.set_network_params(nodes).await?;

        self.check_all(
            Milestone::NetworkConfigured,
            vec![
                Operation::GetCluster(id),
                Operation::PatchNetworkParams {
                    cluster_id: id,
                    params: network_update(&facts, cluster.vip_dhcp_allocation()),
                },
                Operation::ListHosts(id),
                Operation::InstallCluster(id),
            ],
        )
        .await?;

        cluster.wait_for_ready_to_install().await?;
        cluster.start_install().await?;

        self.check_all(
            Milestone::Installing,
            vec![
                Operation::GetCluster(id),
                Operation::DownloadArtifact {
                    cluster_id: id,
                    file: DownloadFile::KubeconfigNoIngress,
                },
                Operation::GetInstallConfig(id),
                Operation::CancelInstall(id),
            ],
        )
        .await?;

        cluster.wait_for_nodes_to_install().await?;
        cluster.wait_for_cluster_to_install().await?;

        self.check_all(
            Milestone::Installed,
            vec![Operation::GetCluster(id), Operation::GetCredentials(id)],
        )
        .await?;

        info!(intruder = %self.report.intruder, checks = self.report.checks.len(), "user isolation verified");
        Ok(self.report)
    }

    /// Install `cluster` as its owner while an agent of another tenant
    /// probes it.
    ///
    /// # Errors
    ///
    /// Returns the first failed check or lifecycle error.
    pub async fn verify_agent_isolation<O, N>(
        mut self,
        cluster: &mut ClusterLifecycle<O>,
        nodes: &N,
        expected_hosts: usize,
        roles: &RoleAssignment,
    ) -> Result<IsolationReport>
    where
        O: InstallerApi,
        N: NodeController,
    {
        let id = cluster.id();

        self.check_all(
            Milestone::Created,
            vec![
                Operation::GetCluster(id),
                Operation::RegisterHost {
                    cluster_id: id,
                    host_id: HostId::new(),
                },
            ],
        )
        .await?;

        cluster.generate_and_download_image().await?;
        cluster.boot_nodes(nodes).await?;
        cluster.wait_until_hosts_are_discovered(expected_hosts).await?;

        self.check_all(
            Milestone::HostsDiscovered,
            vec![Operation::GetCluster(id), Operation::ListHosts(id)],
        )
        .await?;

        cluster.set_host_roles(roles).await?;
        cluster.set_network_params(nodes).await?;

        let host_id = first_host(cluster).await?;
        self.check_all(
            Milestone::NetworkConfigured,
            vec![
                Operation::GetCluster(id),
                Operation::ListHosts(id),
                Operation::GetNextSteps {
                    cluster_id: id,
                    host_id,
                },
                Operation::dummy_step_result(id, host_id),
            ],
        )
        .await?;

        cluster.wait_for_ready_to_install().await?;
        cluster.start_install().await?;

        self.check_all(
            Milestone::Installing,
            vec![
                Operation::GetCluster(id),
                Operation::FailInstall {
                    cluster_id: id,
                    host_id,
                },
                Operation::DownloadArtifact {
                    cluster_id: id,
                    file: DownloadFile::KubeconfigNoIngress,
                },
            ],
        )
        .await?;

        cluster.wait_for_nodes_to_install().await?;

        self.check_all(
            Milestone::NodesInstalled,
            vec![
                Operation::GetCluster(id),
                Operation::CompleteInstallation {
                    cluster_id: id,
                    is_success: true,
                },
            ],
        )
        .await?;

        info!(intruder = %self.report.intruder, checks = self.report.checks.len(), "agent isolation verified");
        Ok(self.report)
    }
}

async fn first_host<O: InstallerApi>(cluster: &ClusterLifecycle<O>) -> Result<HostId> {
    cluster.host_ids().await?.into_iter().next().ok_or_else(|| HarnessError::InvalidState {
        operation: "pick a host".to_string(),
        state: "no hosts registered".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assisted_api::{ApiError, ClusterCreateParams, Identity};
    use assisted_sim::{SimConfig, SimService};
    use test_case::test_case;

    fn params(name: &str) -> ClusterCreateParams {
        ClusterCreateParams {
            name: name.into(),
            openshift_version: "4.6".into(),
            pull_secret: "ps1".into(),
            ssh_public_key: "ssh-rsa AAAA".into(),
            base_dns_domain: "redhat.com".into(),
            vip_dhcp_allocation: true,
        }
    }

    #[test]
    fn dummy_step_result_matches_agent_format() {
        let id = ClusterId::new();
        let host = HostId::new();
        let Operation::PostStepResult { reply, .. } = Operation::dummy_step_result(id, host) else {
            unreachable!("dummy_step_result builds a step result");
        };
        assert_eq!(reply.step_id, "inventory-e048e0db");
        assert_eq!(reply.exit_code, 0);
        assert_eq!(reply.output, "null");
        assert_eq!(reply.step_type, StepType::Inventory);
    }

    #[tokio::test]
    async fn expected_error_passes() {
        let service = SimService::new(SimConfig::default());
        let intruder = service.client(Identity::user("user2", "tok2", "ps2"));
        let op = Operation::GetCluster(ClusterId::new());
        assert_http_error_code(&intruder, &op, 404, "Not Found").await.unwrap();
    }

    #[tokio::test]
    async fn success_is_a_failure() {
        let service = SimService::new(SimConfig::default());
        let owner = service.client(Identity::user("user1", "tok1", "ps1"));
        let cluster = owner.create_cluster(&params("c1")).await.unwrap();
        let err = assert_http_error_code(&owner, &Operation::GetCluster(cluster.id), 404, "Not Found")
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnexpectedSuccess { operation } if operation == "get cluster"));
    }

    #[test_case(404, "Forbidden" ; "reason mismatch")]
    #[test_case(403, "Not Found" ; "status mismatch")]
    #[tokio::test]
    async fn other_errors_are_failures(status: u16, reason: &str) {
        let service = SimService::new(SimConfig::default());
        let intruder = service.client(Identity::user("user2", "tok2", "ps2"));
        let err = assert_http_error_code(&intruder, &Operation::ListHosts(ClusterId::new()), status, reason)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::UnexpectedError { actual: ApiError::Http { status: 404, .. }, .. }
        ));
    }

    #[tokio::test]
    async fn checks_are_recorded_per_milestone() {
        let service = SimService::new(SimConfig::default());
        let owner = service.client(Identity::user("user1", "tok1", "ps1"));
        let cluster = owner.create_cluster(&params("c1")).await.unwrap();

        let mut verifier = AuthorizationVerifier::new(service.client(Identity::agent("agent2", "ps2")));
        verifier
            .check(Milestone::Created, Operation::GetCluster(cluster.id))
            .await
            .unwrap();
        verifier
            .check(Milestone::Created, Operation::dummy_step_result(cluster.id, HostId::new()))
            .await
            .unwrap();

        let report = verifier.report();
        assert_eq!(report.intruder, "agent2");
        assert!(report.covers(Milestone::Created, "get cluster"));
        assert_eq!(
            report.operations_at(Milestone::Created),
            vec!["get cluster", "post step result"]
        );
        assert!(report.operations_at(Milestone::Installed).is_empty());
    }

    #[tokio::test]
    async fn intruder_delete_leaves_cluster_in_place() {
        let service = SimService::new(SimConfig::default());
        let owner = service.client(Identity::user("user1", "tok1", "ps1"));
        let cluster = owner.create_cluster(&params("c1")).await.unwrap();
        let intruder = service.client(Identity::user("user2", "tok2", "ps2"));
        assert_http_error_code(&intruder, &Operation::DeleteCluster(cluster.id), 404, "Not Found")
            .await
            .unwrap();
        assert!(service.contains(&cluster.id));
    }
}
