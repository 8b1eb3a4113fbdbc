//! End-to-end tests of the assisted installation harness.
//!
//! The tests drive the harness against the in-process simulated service:
//! - Cluster creation, deletion and naming
//! - Host discovery and role assignment
//! - Full installation
//! - Cross-tenant isolation for users and agents
//! - Teardown guarantees
//!
//! With the `live` feature the same flows run against the service and VMs
//! described by the environment.

#![cfg(test)]
