//! Guaranteed deletion of every cluster a test created.
//!
//! Each successful create registers the cluster together with a handle able
//! to delete it as its owner. Teardown drains the registry once, in
//! registration order, and attempts exactly one delete per entry. Failures
//! are logged and collected, never raised, so one stuck cluster cannot keep
//! the rest alive.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use assisted_api::{ApiError, ApiResult, ClusterId, InstallerApi};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Something able to delete a cluster on behalf of its owner.
pub trait ClusterDeleter: Send + Sync {
    /// Delete the cluster.
    fn delete_cluster<'a>(&'a self, id: &'a ClusterId) -> BoxFuture<'a, ApiResult<()>>;
}

struct ApiDeleter<A>(A);

impl<A> ClusterDeleter for ApiDeleter<A>
where
    A: InstallerApi + 'static,
{
    fn delete_cluster<'a>(&'a self, id: &'a ClusterId) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(self.0.delete_cluster(id))
    }
}

/// A cluster awaiting teardown.
#[derive(Clone)]
pub struct TrackedCluster {
    /// Name of the owning identity.
    pub owner: String,
    /// Cluster to delete.
    pub cluster_id: ClusterId,
    deleter: Arc<dyn ClusterDeleter>,
}

impl fmt::Debug for TrackedCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedCluster")
            .field("owner", &self.owner)
            .field("cluster_id", &self.cluster_id)
            .finish_non_exhaustive()
    }
}

/// A delete that failed during teardown.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    /// Name of the owning identity.
    pub owner: String,
    /// Cluster that could not be deleted.
    pub cluster_id: ClusterId,
    /// The error the delete returned.
    pub error: ApiError,
}

/// Outcome of one teardown.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Deletes issued.
    pub attempted: usize,
    /// Deletes that succeeded.
    pub deleted: usize,
    /// Clusters that were already gone (404).
    pub already_gone: usize,
    /// Deletes that failed.
    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Whether every tracked cluster is gone.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Append-only set of clusters to delete at teardown.
///
/// Clones share the same set.
#[derive(Clone, Default)]
pub struct CleanupRegistry {
    tracked: Arc<Mutex<Vec<TrackedCluster>>>,
}

impl fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("tracked", &self.tracked.lock().len())
            .finish()
    }
}

impl CleanupRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a cluster, deleting it through `api` at teardown.
    pub fn track<A>(&self, api: &A, cluster_id: ClusterId)
    where
        A: InstallerApi + Clone + 'static,
    {
        let owner = api.identity().name().to_string();
        self.track_with(owner, cluster_id, Arc::new(ApiDeleter(api.clone())));
    }

    /// Track a cluster with a custom deleter.
    pub fn track_with(
        &self,
        owner: impl Into<String>,
        cluster_id: ClusterId,
        deleter: Arc<dyn ClusterDeleter>,
    ) {
        let owner = owner.into();
        debug!(cluster_id = %cluster_id, owner = %owner, "tracking cluster for cleanup");
        self.tracked.lock().push(TrackedCluster {
            owner,
            cluster_id,
            deleter,
        });
    }

    /// Number of clusters awaiting teardown.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Whether nothing awaits teardown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.lock().is_empty()
    }

    /// Tracked cluster ids in registration order.
    #[must_use]
    pub fn tracked_ids(&self) -> Vec<ClusterId> {
        self.tracked.lock().iter().map(|t| t.cluster_id).collect()
    }

    /// Delete every tracked cluster once, in registration order.
    ///
    /// Errors are logged and collected into the report. A 404 counts as
    /// already gone, which happens when the test deleted the cluster itself.
    pub async fn teardown(&self) -> CleanupReport {
        let entries = std::mem::take(&mut *self.tracked.lock());
        let mut report = CleanupReport::default();

        for entry in entries {
            report.attempted += 1;
            match entry.deleter.delete_cluster(&entry.cluster_id).await {
                Ok(()) => {
                    report.deleted += 1;
                    info!(cluster_id = %entry.cluster_id, owner = %entry.owner, "deleted cluster");
                }
                Err(e) if e.is_not_found() => {
                    report.already_gone += 1;
                    debug!(cluster_id = %entry.cluster_id, "cluster already deleted");
                }
                Err(error) => {
                    warn!(
                        cluster_id = %entry.cluster_id,
                        owner = %entry.owner,
                        error = %error,
                        "failed to delete cluster during cleanup"
                    );
                    report.failed.push(CleanupFailure {
                        owner: entry.owner,
                        cluster_id: entry.cluster_id,
                        error,
                    });
                }
            }
        }

        report
    }

    /// Run `body`, then tear down, even if `body` panicked.
    ///
    /// The body's output is returned after teardown; a panic is resumed
    /// after teardown.
    pub async fn run<F, Fut, T>(&self, body: F) -> T
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = T>,
    {
        let outcome = AssertUnwindSafe(body(self.clone())).catch_unwind().await;
        let report = self.teardown().await;
        if !report.is_clean() {
            warn!(failed = report.failed.len(), attempted = report.attempted, "cleanup left clusters behind");
        }
        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Run `body` with a fresh registry that is torn down afterwards.
pub async fn with_cleanup<F, Fut, T>(body: F) -> T
where
    F: FnOnce(CleanupRegistry) -> Fut,
    Fut: Future<Output = T>,
{
    CleanupRegistry::new().run(body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingDeleter {
        calls: Mutex<Vec<ClusterId>>,
        fail: Option<u16>,
    }

    impl ClusterDeleter for RecordingDeleter {
        fn delete_cluster<'a>(&'a self, id: &'a ClusterId) -> BoxFuture<'a, ApiResult<()>> {
            self.calls.lock().push(*id);
            let result = match self.fail {
                Some(status) => Err(ApiError::http(status, "boom")),
                None => Ok(()),
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn each_entry_deleted_once_in_order_despite_failures() {
        let ok = Arc::new(RecordingDeleter::default());
        let failing = Arc::new(RecordingDeleter {
            fail: Some(500),
            ..Default::default()
        });
        let registry = CleanupRegistry::new();
        let ids: Vec<ClusterId> = (0..4).map(|_| ClusterId::new()).collect();
        registry.track_with("user1", ids[0], ok.clone());
        registry.track_with("user1", ids[1], failing.clone());
        registry.track_with("user1", ids[2], ok.clone());
        registry.track_with("user2", ids[3], ok.clone());

        let report = registry.teardown().await;
        assert_eq!(report.attempted, 4);
        assert_eq!(report.deleted, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].cluster_id, ids[1]);
        assert_eq!(*ok.calls.lock(), vec![ids[0], ids[2], ids[3]]);
        assert_eq!(*failing.calls.lock(), vec![ids[1]]);

        let again = registry.teardown().await;
        assert_eq!(again.attempted, 0);
        assert_eq!(ok.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn not_found_counts_as_already_gone() {
        let gone = Arc::new(RecordingDeleter {
            fail: Some(404),
            ..Default::default()
        });
        let registry = CleanupRegistry::new();
        registry.track_with("user1", ClusterId::new(), gone);
        let report = registry.teardown().await;
        assert_eq!(report.already_gone, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn teardown_runs_when_body_panics() {
        let deleter = Arc::new(RecordingDeleter::default());
        let registry = CleanupRegistry::new();
        let inner = deleter.clone();
        let outcome = AssertUnwindSafe(registry.run(|reg| async move {
            reg.track_with("user1", ClusterId::new(), inner);
            assert!(reg.is_empty(), "test body failed");
        }))
        .catch_unwind()
        .await;
        assert!(outcome.is_err());
        assert_eq!(deleter.calls.lock().len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn with_cleanup_returns_body_output_after_teardown() {
        let deleted = Arc::new(AtomicUsize::new(0));
        let deleter = Arc::new(RecordingDeleter::default());
        let seen = deleted.clone();
        let inner = deleter.clone();
        let value = with_cleanup(|reg| async move {
            reg.track_with("user1", ClusterId::new(), inner);
            seen.store(reg.len(), Ordering::SeqCst);
            Err::<(), &str>("body error")
        })
        .await;
        assert_eq!(value, Err("body error"));
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
        assert_eq!(deleter.calls.lock().len(), 1);
    }
}
