//! End-to-end tests for cross-tenant isolation.
//!
//! These tests verify:
//! 1. A second user gets 404 for everything at every milestone, including
//!    right after discovery
//! 2. An agent of another tenant gets 404 for everything at every milestone
//! 3. The owner's installation is not disturbed by the attempts
//! 4. Cluster lists are scoped to their owner

mod helpers;

use assisted_api::{ClusterStatus, Identity, InstallerApi};
use assisted_harness::authz::{ISOLATION_REASON, ISOLATION_STATUS};
use assisted_harness::{
    AuthorizationVerifier, HarnessError, LifecycleState, Milestone, Operation, RoleAssignment,
    assert_http_error_code, with_cleanup,
};
use helpers::TestEnv;
use test_case::test_case;

// ============================================================================
// User axis
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_user_authorization_negative() {
    let env = TestEnv::new();
    let owner = env.user1();
    let intruder = env.user2();
    let nodes = env.nodes();
    let env_ref = &env;

    let report = with_cleanup(|registry| async move {
        let factory = env_ref.factory(registry);
        let mut cluster = factory.create(&owner, None).await.unwrap();
        let report = AuthorizationVerifier::new(intruder)
            .verify_user_isolation(&mut cluster, &nodes, 3, &RoleAssignment::default())
            .await
            .unwrap();
        assert_eq!(cluster.state(), LifecycleState::Installed);
        assert_eq!(cluster.cluster().await.unwrap().status, ClusterStatus::Installed);
        report
    })
    .await;

    assert_eq!(report.intruder, "user2");
    assert_eq!(
        report.operations_at(Milestone::Created),
        vec!["get cluster", "delete cluster", "generate image"]
    );
    assert_eq!(
        report.operations_at(Milestone::HostsDiscovered),
        vec!["get cluster", "list hosts"]
    );
    assert_eq!(
        report.operations_at(Milestone::NetworkConfigured),
        vec!["get cluster", "patch network params", "list hosts", "install cluster"]
    );
    assert_eq!(
        report.operations_at(Milestone::Installing),
        vec!["get cluster", "download artifact", "get install config", "cancel install"]
    );
    assert_eq!(
        report.operations_at(Milestone::Installed),
        vec!["get cluster", "get credentials"]
    );
    assert_eq!(env.service.cluster_count(), 0);
}

// ============================================================================
// Agent axis
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_agent_authorization_negative() {
    let env = TestEnv::new();
    let owner = env.user1();
    let intruder = env.agent2();
    let nodes = env.nodes();
    let env_ref = &env;

    let report = with_cleanup(|registry| async move {
        let factory = env_ref.factory(registry);
        let mut cluster = factory.create(&owner, None).await.unwrap();
        let report = AuthorizationVerifier::new(intruder)
            .verify_agent_isolation(&mut cluster, &nodes, 3, &RoleAssignment::default())
            .await
            .unwrap();

        // The failed-install and completion attempts must not have touched
        // the owner's cluster.
        let hosts = cluster.get_hosts().await.unwrap();
        assert!(hosts.iter().all(|h| h.status != assisted_api::HostStatus::Error));
        cluster.wait_for_cluster_to_install().await.unwrap();
        report
    })
    .await;

    assert_eq!(report.intruder, "agent2");
    assert_eq!(
        report.operations_at(Milestone::Created),
        vec!["get cluster", "register host"]
    );
    assert_eq!(
        report.operations_at(Milestone::HostsDiscovered),
        vec!["get cluster", "list hosts"]
    );
    assert_eq!(
        report.operations_at(Milestone::NetworkConfigured),
        vec!["get cluster", "list hosts", "get next steps", "post step result"]
    );
    assert_eq!(
        report.operations_at(Milestone::Installing),
        vec!["get cluster", "fail install", "download artifact"]
    );
    assert_eq!(
        report.operations_at(Milestone::NodesInstalled),
        vec!["get cluster", "complete installation"]
    );
}

// ============================================================================
// Single checks
// ============================================================================

#[test_case(Identity::user("user2", "offline-token-2", "ps2") ; "other user")]
#[test_case(Identity::agent("agent2", "ps2") ; "other tenant's agent")]
#[tokio::test]
async fn test_cluster_get_is_not_found_for_strangers(stranger: Identity) {
    let env = TestEnv::new();
    let owner = env.user1();
    let stranger = env.client(stranger);
    let env_ref = &env;

    with_cleanup(|registry| async move {
        let cluster = env_ref.factory(registry).create(&owner, None).await.unwrap();
        assert_http_error_code(
            &stranger,
            &Operation::GetCluster(cluster.id()),
            ISOLATION_STATUS,
            ISOLATION_REASON,
        )
        .await
        .unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_owner_agent_is_allowed() {
    let env = TestEnv::new();
    let owner = env.user1();
    let agent = env.client(Identity::agent("agent1", &env.config.pull_secret));
    let env_ref = &env;

    with_cleanup(|registry| async move {
        let cluster = env_ref.factory(registry).create(&owner, None).await.unwrap();
        let err = assert_http_error_code(
            &agent,
            &Operation::GetCluster(cluster.id()),
            ISOLATION_STATUS,
            ISOLATION_REASON,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::UnexpectedSuccess { .. }));
    })
    .await;
}

#[tokio::test]
async fn test_cluster_list_is_scoped_to_owner() {
    let env = TestEnv::new();
    let (user1, user2) = (env.user1(), env.user2());
    let env_ref = &env;

    with_cleanup(|registry| async move {
        let factory = env_ref.factory(registry);
        let mine = factory.create(&user1, Some("mine")).await.unwrap();
        let theirs = factory.create(&user2, Some("theirs")).await.unwrap();

        let seen_by_1: Vec<_> = user1.clusters_list().await.unwrap().into_iter().map(|c| c.id).collect();
        let seen_by_2: Vec<_> = user2.clusters_list().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(seen_by_1, vec![mine.id()]);
        assert_eq!(seen_by_2, vec![theirs.id()]);
    })
    .await;

    assert_eq!(env.service.cluster_count(), 0);
}

#[tokio::test]
async fn test_intruder_cannot_delete() {
    let env = TestEnv::new();
    let owner = env.user1();
    let intruder = env.user2();
    let env_ref = &env;

    with_cleanup(|registry| async move {
        let cluster = env_ref.factory(registry).create(&owner, None).await.unwrap();
        let mut verifier = AuthorizationVerifier::new(intruder);
        verifier
            .check(Milestone::Created, Operation::DeleteCluster(cluster.id()))
            .await
            .unwrap();
        assert!(owner.cluster_get(&cluster.id()).await.is_ok());
        assert!(verifier.report().covers(Milestone::Created, "delete cluster"));
    })
    .await;
}
