//! Creating clusters that are cleaned up afterwards.

use assisted_api::{ClusterCreateParams, InstallerApi};
use rand::Rng;
use tracing::debug;

use crate::cleanup::CleanupRegistry;
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::lifecycle::{ClusterLifecycle, LifecycleTimeouts};

/// Length of generated cluster names.
pub const RANDOM_NAME_LEN: usize = 10;

/// A random name of [`RANDOM_NAME_LEN`] lowercase ASCII letters.
#[must_use]
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_NAME_LEN)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Creates clusters from the harness configuration and registers each one
/// for teardown.
#[derive(Debug, Clone)]
pub struct ClusterFactory {
    registry: CleanupRegistry,
    config: HarnessConfig,
    timeouts: LifecycleTimeouts,
}

impl ClusterFactory {
    /// A factory registering into `registry`.
    #[must_use]
    pub fn new(registry: CleanupRegistry, config: HarnessConfig) -> Self {
        Self {
            registry,
            config,
            timeouts: LifecycleTimeouts::default(),
        }
    }

    /// Timeouts handed to every lifecycle this factory creates.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: LifecycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The registry clusters are tracked in.
    #[must_use]
    pub fn registry(&self) -> &CleanupRegistry {
        &self.registry
    }

    /// The configuration clusters are created from.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Name for a new cluster: `name`, else the configured name, else random.
    #[must_use]
    pub fn resolve_name(&self, name: Option<&str>) -> String {
        name.map(str::to_string)
            .or_else(|| self.config.cluster_name.clone())
            .unwrap_or_else(random_name)
    }

    /// Creation parameters for `api`'s identity.
    ///
    /// The pull secret is the identity's own when it has one, so clusters
    /// created by a second tenant belong to that tenant's agents.
    #[must_use]
    pub fn params_for<A: InstallerApi>(&self, api: &A, name: Option<&str>) -> ClusterCreateParams {
        let mut params = self.config.cluster_params(self.resolve_name(name));
        let pull_secret = api.identity().pull_secret();
        if !pull_secret.is_empty() {
            params.pull_secret = pull_secret.to_string();
        }
        params
    }

    /// Create a cluster as `api`'s identity and track it.
    ///
    /// # Errors
    ///
    /// Returns the service's error unchanged; nothing is tracked then.
    pub async fn create<A>(&self, api: &A, name: Option<&str>) -> Result<ClusterLifecycle<A>>
    where
        A: InstallerApi + Clone + 'static,
    {
        let params = self.params_for(api, name);
        self.create_with_params(api, &params).await
    }

    /// Create a cluster from explicit parameters and track it.
    ///
    /// # Errors
    ///
    /// Returns the service's error unchanged; nothing is tracked then.
    pub async fn create_with_params<A>(
        &self,
        api: &A,
        params: &ClusterCreateParams,
    ) -> Result<ClusterLifecycle<A>>
    where
        A: InstallerApi + Clone + 'static,
    {
        let lifecycle = ClusterLifecycle::create(api.clone(), params, &self.config.iso_download_path)
            .await?
            .with_timeouts(self.timeouts);
        self.registry.track(api, lifecycle.id());
        debug!(cluster_id = %lifecycle.id(), tracked = self.registry.len(), "registered cluster for cleanup");
        Ok(lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assisted_api::Identity;
    use assisted_sim::{SimConfig, SimService};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn random_names_are_ten_lowercase_letters(_seed in 0u8..32) {
            let name = random_name();
            prop_assert_eq!(name.len(), RANDOM_NAME_LEN);
            prop_assert!(name.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    fn factory(cluster_name: Option<&str>) -> ClusterFactory {
        let config = HarnessConfig {
            offline_token: "tok1".into(),
            pull_secret: "ps1".into(),
            cluster_name: cluster_name.map(str::to_string),
            ..HarnessConfig::default()
        };
        ClusterFactory::new(CleanupRegistry::new(), config)
    }

    #[test]
    fn explicit_name_beats_configured_name() {
        let f = factory(Some("configured"));
        assert_eq!(f.resolve_name(Some("explicit")), "explicit");
        assert_eq!(f.resolve_name(None), "configured");
        assert_eq!(factory(None).resolve_name(None).len(), RANDOM_NAME_LEN);
    }

    #[tokio::test]
    async fn successful_creates_are_tracked() {
        let service = SimService::new(SimConfig::default());
        let f = factory(None);
        let api = service.client(f.config().user_identity());
        let c = f.create(&api, Some("c1")).await.unwrap();
        assert_eq!(c.name(), "c1");
        assert_eq!(f.registry().tracked_ids(), vec![c.id()]);

        let report = f.registry().teardown().await;
        assert_eq!(report.deleted, 1);
        assert!(!service.contains(&c.id()));
    }

    #[tokio::test]
    async fn failed_creates_are_not_tracked() {
        let service = SimService::new(SimConfig::default());
        let f = factory(None);
        let agent = service.client(Identity::agent("agent", "ps1"));
        assert!(f.create(&agent, None).await.is_err());
        assert!(f.registry().is_empty());
    }

    #[tokio::test]
    async fn second_tenant_clusters_use_their_pull_secret() {
        let service = SimService::new(SimConfig::default());
        let f = factory(None);
        let user2 = service.client(Identity::user("user2", "tok2", "ps2"));
        let params = f.params_for(&user2, Some("c2"));
        assert_eq!(params.pull_secret, "ps2");
    }
}
