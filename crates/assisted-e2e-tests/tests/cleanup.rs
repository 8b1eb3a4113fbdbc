//! End-to-end tests for teardown guarantees.
//!
//! These tests verify:
//! 1. Every tracked cluster gets exactly one delete
//! 2. A failed delete does not stop the rest
//! 3. Teardown runs when the test body errors or panics
//! 4. Clusters are deleted as their own owner

mod helpers;

use std::panic::AssertUnwindSafe;

use assisted_harness::{CleanupRegistry, HarnessError, with_cleanup};
use futures::FutureExt;
use helpers::TestEnv;
use test_case::test_case;

#[test_case(1, None ; "single cluster")]
#[test_case(5, None ; "all succeed")]
#[test_case(5, Some(0) ; "first fails")]
#[test_case(5, Some(2) ; "middle fails")]
#[test_case(5, Some(4) ; "last fails")]
#[tokio::test]
async fn test_each_cluster_deleted_once(count: usize, failing: Option<usize>) {
    let env = TestEnv::new();
    let api = env.user1();
    let registry = CleanupRegistry::new();
    let factory = env.factory(registry.clone());

    let mut ids = Vec::new();
    for _ in 0..count {
        ids.push(factory.create(&api, None).await.unwrap().id());
    }
    if let Some(k) = failing {
        env.service.reject_deletes(ids[k]);
    }

    let report = registry.teardown().await;
    assert_eq!(report.attempted, count);
    assert_eq!(report.failed.len(), usize::from(failing.is_some()));
    assert_eq!(report.deleted, count - report.failed.len());
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(env.service.contains(id), failing == Some(i));
    }

    let again = registry.teardown().await;
    assert_eq!(again.attempted, 0);
}

#[tokio::test]
async fn test_teardown_runs_when_body_errors() {
    let env = TestEnv::new();
    let api = env.user1();
    let env_ref = &env;

    let result: Result<(), HarnessError> = with_cleanup(|registry| async move {
        let factory = env_ref.factory(registry);
        factory.create(&api, None).await?;
        factory.create(&api, None).await?;
        Err::<(), _>(HarnessError::CheckFailed("body failed".into()))
    })
    .await;

    assert!(matches!(result, Err(HarnessError::CheckFailed(_))));
    assert_eq!(env.service.cluster_count(), 0);
}

#[tokio::test]
async fn test_teardown_runs_when_body_panics() {
    let env = TestEnv::new();
    let api = env.user1();
    let env_ref = &env;

    let outcome = AssertUnwindSafe(with_cleanup(|registry| async move {
        let factory = env_ref.factory(registry);
        let cluster = factory.create(&api, None).await.unwrap();
        assert!(!env_ref.service.contains(&cluster.id()), "simulated test failure");
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(env.service.cluster_count(), 0);
}

#[tokio::test]
async fn test_clusters_deleted_by_their_owner() {
    let env = TestEnv::new();
    let (user1, user2) = (env.user1(), env.user2());
    let env_ref = &env;

    let report = with_cleanup(|registry| async move {
        let factory = env_ref.factory(registry.clone());
        factory.create(&user1, None).await.unwrap();
        factory.create(&user2, None).await.unwrap();
        assert_eq!(env_ref.service.cluster_count(), 2);
        registry.teardown().await
    })
    .await;

    assert!(report.is_clean());
    assert_eq!(report.deleted, 2);
    assert_eq!(env.service.cluster_count(), 0);
}

#[tokio::test]
async fn test_clusters_deleted_by_test_are_already_gone() {
    let env = TestEnv::new();
    let api = env.user1();
    let registry = CleanupRegistry::new();
    let factory = env.factory(registry.clone());

    let mut cluster = factory.create(&api, None).await.unwrap();
    cluster.delete().await.unwrap();

    let report = registry.teardown().await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.already_gone, 1);
    assert!(report.is_clean());
}
