//! # assisted-harness
//!
//! End-to-end test harness for the assisted installation service.
//!
//! The harness drives clusters through the installation API and checks that
//! tenants cannot see each other's clusters:
//!
//! - **Lifecycle**: [`ClusterLifecycle`] moves a cluster forward from
//!   creation through discovery, role assignment, network configuration and
//!   installation, polling the service between steps
//! - **Cleanup**: [`CleanupRegistry`] deletes every cluster a test created,
//!   even when the test fails or panics
//! - **Isolation**: [`AuthorizationVerifier`] replays the owner's operations
//!   as a second identity and expects `404 Not Found` every time
//! - **Waiting**: [`wait_until`] polls a remote read until a condition holds
//!
//! ## Architecture
//!
//! ```text
//!  test ──► ClusterFactory ──► ClusterLifecycle ──► InstallerApi ──► service
//!              │                      │
//!              ▼                      ▼
//!       CleanupRegistry        NodeController ──► VMs boot the image
//!                                                      │
//!                                                      ▼
//!                                         hosts register with the service
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use assisted_harness::{ClusterFactory, HarnessConfig, with_cleanup};
//!
//! let config = HarnessConfig::from_env()?;
//! with_cleanup(|registry| async move {
//!     let factory = ClusterFactory::new(registry, config.clone());
//!     let mut cluster = factory.create(&api, None).await?;
//!     cluster.generate_and_download_image().await?;
//!     cluster.boot_nodes(&nodes).await?;
//!     cluster.wait_until_hosts_are_discovered(config.expected_host_count()).await?;
//!     Ok::<_, assisted_harness::HarnessError>(())
//! })
//! .await?;
//! ```

#![forbid(unsafe_code)]

pub mod authz;
pub mod cleanup;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fixture;
pub mod lifecycle;
pub mod scenarios;
pub mod wait;

pub use authz::{
    AuthorizationVerifier, IsolationCheck, IsolationReport, Milestone, Operation,
    assert_http_error_code,
};
pub use cleanup::{CleanupFailure, CleanupRegistry, CleanupReport, ClusterDeleter, with_cleanup};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use fixture::{ClusterFactory, random_name};
pub use lifecycle::{
    ClusterLifecycle, LifecycleState, LifecycleTimeouts, RoleAssignment, RoleReport,
    network_update,
};
pub use scenarios::DuplicateNameOutcome;
pub use wait::{WaitConfig, wait_until};
