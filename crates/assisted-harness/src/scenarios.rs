//! Reusable end-to-end scenarios.
//!
//! Each scenario creates its clusters through a [`ClusterFactory`], so they
//! are deleted at teardown whatever the outcome.

use assisted_api::{ApiError, Cluster, ClusterId, Host, HostRole, InstallerApi};
use assisted_nodes::NodeController;
use tracing::{info, warn};

use crate::error::{HarnessError, Result};
use crate::fixture::{ClusterFactory, random_name};
use crate::lifecycle::{ClusterLifecycle, RoleAssignment, RoleReport};

/// What the service did with a second cluster of the same name.
#[derive(Debug, Clone)]
pub enum DuplicateNameOutcome {
    /// The second create failed.
    Rejected(ApiError),
    /// Both clusters exist.
    Accepted {
        /// The first cluster.
        first: ClusterId,
        /// The second cluster.
        second: ClusterId,
    },
}

impl DuplicateNameOutcome {
    /// Whether the service refused the duplicate.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::CheckFailed(message()))
    }
}

async fn listed<A: InstallerApi>(api: &A, id: ClusterId) -> Result<bool> {
    Ok(api.clusters_list().await?.iter().any(|c| c.id == id))
}

/// Create a cluster and check it is listed, readable, and has events.
///
/// # Errors
///
/// Returns an error if creation fails or a check does not hold.
pub async fn create_cluster<A>(factory: &ClusterFactory, api: &A) -> Result<Cluster>
where
    A: InstallerApi + Clone + 'static,
{
    let lifecycle = factory.create(api, None).await?;
    let id = lifecycle.id();

    check(listed(api, id).await?, || format!("cluster {id} missing from cluster list"))?;
    let cluster = api.cluster_get(&id).await?;
    let events = api.get_events(&id).await?;
    check(!events.is_empty(), || format!("cluster {id} has no events"))?;

    info!(cluster_id = %id, events = events.len(), "create scenario passed");
    Ok(cluster)
}

/// Create then delete a cluster and check it is gone.
///
/// # Errors
///
/// Returns an error if an API call fails unexpectedly or a check does not
/// hold.
pub async fn delete_cluster<A>(factory: &ClusterFactory, api: &A) -> Result<ClusterId>
where
    A: InstallerApi + Clone + 'static,
{
    let mut lifecycle = factory.create(api, None).await?;
    let id = lifecycle.id();
    api.cluster_get(&id).await?;

    lifecycle.delete().await?;

    check(!listed(api, id).await?, || format!("deleted cluster {id} still listed"))?;
    match api.cluster_get(&id).await {
        Ok(_) => Err(HarnessError::UnexpectedSuccess {
            operation: format!("get deleted cluster {id}"),
        }),
        Err(e) => {
            info!(cluster_id = %id, error = %e, "delete scenario passed");
            Ok(id)
        }
    }
}

/// Create two clusters with the same random name.
///
/// The outcome is reported rather than judged: whether names must be unique
/// is the caller's policy.
///
/// # Errors
///
/// Returns an error only if the first create fails.
pub async fn duplicate_name<A>(factory: &ClusterFactory, api: &A) -> Result<DuplicateNameOutcome>
where
    A: InstallerApi + Clone + 'static,
{
    let name = random_name();
    let first = factory.create(api, Some(&name)).await?;
    match factory.create(api, Some(&name)).await {
        Ok(second) => {
            warn!(name = %name, first = %first.id(), second = %second.id(), "duplicate cluster name accepted");
            Ok(DuplicateNameOutcome::Accepted {
                first: first.id(),
                second: second.id(),
            })
        }
        Err(HarnessError::Api(e)) => {
            info!(name = %name, error = %e, "duplicate cluster name rejected");
            Ok(DuplicateNameOutcome::Rejected(e))
        }
        Err(e) => Err(e),
    }
}

/// Create a cluster, boot its nodes and wait for every host to be discovered.
///
/// # Errors
///
/// Returns an error if any step fails or discovery times out.
pub async fn discovery<A, N>(
    factory: &ClusterFactory,
    api: &A,
    nodes: &N,
    expected_hosts: usize,
) -> Result<ClusterLifecycle<A>>
where
    A: InstallerApi + Clone + 'static,
    N: NodeController,
{
    let mut cluster = factory.create(api, None).await?;
    cluster.generate_and_download_image().await?;
    cluster.boot_nodes(nodes).await?;
    cluster.wait_until_hosts_are_discovered(expected_hosts).await?;
    Ok(cluster)
}

/// Discovery followed by the default role rule, checked against the hosts
/// as the service reports them afterwards.
///
/// # Errors
///
/// Returns an error if a step fails or a host carries the wrong role.
pub async fn select_roles<A, N>(
    factory: &ClusterFactory,
    api: &A,
    nodes: &N,
    expected_hosts: usize,
) -> Result<(ClusterLifecycle<A>, RoleReport)>
where
    A: InstallerApi + Clone + 'static,
    N: NodeController,
{
    let mut cluster = discovery(factory, api, nodes, expected_hosts).await?;
    let report = cluster.set_host_roles(&RoleAssignment::ByHostname).await?;
    let hosts = cluster.get_hosts().await?;
    check_roles(&hosts)?;
    Ok((cluster, report))
}

/// Every host whose name mentions a role carries that role.
///
/// # Errors
///
/// Returns [`HarnessError::CheckFailed`] naming the first mismatch.
pub fn check_roles(hosts: &[Host]) -> Result<()> {
    for host in hosts {
        let Some(expected) = RoleAssignment::ByHostname.role_for(&host.requested_hostname) else {
            continue;
        };
        check(host.role == expected, || {
            format!(
                "host {} has role {}, expected {expected}",
                host.requested_hostname, host.role
            )
        })?;
    }
    Ok(())
}

/// Count of hosts per role.
#[must_use]
pub fn role_counts(hosts: &[Host]) -> (usize, usize) {
    let masters = hosts.iter().filter(|h| h.role == HostRole::Master).count();
    let workers = hosts.iter().filter(|h| h.role == HostRole::Worker).count();
    (masters, workers)
}
