//! # assisted-sim
//!
//! An in-process stand-in for the assisted installation service and the VMs
//! that boot its discovery image.
//!
//! [`SimService`] keeps every tenant's clusters in memory and enforces the
//! same visibility rules as the real service: a cluster is visible to the
//! offline token that created it and to agents holding its pull secret, and
//! to nobody else. [`SimClient`] implements
//! [`InstallerApi`](assisted_api::InstallerApi) on top of it, and
//! [`SimNodes`] implements [`NodeController`](assisted_nodes::NodeController)
//! by playing the discovery agent for each booted node.
//!
//! ```rust,ignore
//! let service = SimService::default();
//! let api = service.client(Identity::user("user1", token, pull_secret));
//! let nodes = SimNodes::cluster(service.clone(), "/tmp/discovery.iso", 2, 1)?;
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod nodes;
pub mod service;

pub use client::SimClient;
pub use nodes::SimNodes;
pub use service::{SimConfig, SimImage, SimService};
