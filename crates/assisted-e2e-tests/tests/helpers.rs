//! Test helpers for E2E tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use assisted_api::Identity;
use assisted_harness::{
    CleanupRegistry, ClusterFactory, HarnessConfig, LifecycleTimeouts, WaitConfig,
};
use assisted_sim::{SimClient, SimConfig, SimNodes, SimService};
use tempfile::TempDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Timeout of every wait in simulated runs.
pub const SIM_WAIT: WaitConfig = WaitConfig::new(Duration::from_secs(120), Duration::from_secs(1));

/// Install a log subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Simulator settings that move one step per poll.
pub fn fast_sim_config() -> SimConfig {
    SimConfig {
        discovery_ticks: 1,
        install_ticks: 1,
        finalize_ticks: 1,
        ..SimConfig::default()
    }
}

/// A simulated service plus two tenants and a scratch directory.
pub struct TestEnv {
    pub service: SimService,
    pub config: HarnessConfig,
    dir: TempDir,
}

impl TestEnv {
    /// Environment on a fast simulator.
    pub fn new() -> Self {
        Self::with_sim_config(fast_sim_config())
    }

    /// Environment on a simulator with `sim` settings.
    pub fn with_sim_config(sim: SimConfig) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            offline_token: "offline-token-1".into(),
            second_offline_token: "offline-token-2".into(),
            pull_secret: "{\"auths\":{\"cloud\":{\"auth\":\"dXNlcjE=\"}}}".into(),
            second_pull_secret: "{\"auths\":{\"cloud\":{\"auth\":\"dXNlcjI=\"}}}".into(),
            ssh_public_key: "ssh-rsa AAAAB3NzaC1yc2E test@harness".into(),
            num_masters: 2,
            num_workers: 1,
            iso_download_path: dir.path().join("images/discovery-image.iso"),
            ..HarnessConfig::default()
        };
        info!(dir = %dir.path().display(), masters = config.num_masters, workers = config.num_workers, "test environment ready");
        Self {
            service: SimService::new(sim),
            config,
            dir,
        }
    }

    /// Client of an arbitrary identity.
    pub fn client(&self, identity: Identity) -> SimClient {
        self.service.client(identity)
    }

    /// Client of the primary user.
    pub fn user1(&self) -> SimClient {
        self.client(self.config.user_identity())
    }

    /// Client of the second user.
    pub fn user2(&self) -> SimClient {
        self.client(self.config.second_user_identity())
    }

    /// Client of the second tenant's agent.
    pub fn agent2(&self) -> SimClient {
        self.client(self.config.second_agent_identity())
    }

    /// Where discovery images land.
    pub fn image_path(&self) -> PathBuf {
        self.config.iso_download_path.clone()
    }

    /// Nodes matching the configured master and worker counts.
    pub fn nodes(&self) -> SimNodes {
        SimNodes::cluster(
            self.service.clone(),
            self.image_path(),
            self.config.num_masters,
            self.config.num_workers,
        )
        .unwrap()
    }

    /// Factory registering into `registry`, with simulator timeouts.
    pub fn factory(&self, registry: CleanupRegistry) -> ClusterFactory {
        ClusterFactory::new(registry, self.config.clone())
            .with_timeouts(LifecycleTimeouts::uniform(SIM_WAIT))
    }
}
