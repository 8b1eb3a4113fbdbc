//! # assisted-nodes
//!
//! Power control over the virtual machines that stand in for cluster
//! hardware during a test run.
//!
//! Everything above this crate talks to the [`NodeController`] trait. Two
//! backends ship here:
//!
//! - [`LibvirtController`] shells out to `virsh`
//! - [`TerraformController`] runs `terraform apply` against a working directory
//!
//! [`AnyNodeController`] picks one at runtime from [`NodesConfig`].

#![forbid(unsafe_code)]

pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod libvirt;
pub mod network;
pub mod terraform;

pub use backend::AnyNodeController;
pub use config::{NodeBackendKind, NodesConfig};
pub use controller::{NetworkFacts, NodeController, NodeInfo};
pub use error::{NodeError, NodeResult};
pub use libvirt::LibvirtController;
pub use network::NetworkSettings;
pub use terraform::TerraformController;
