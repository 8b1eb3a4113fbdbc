//! Terraform backend.
//!
//! The terraform working directory is expected to expose a `nodes` output
//! mapping node names to `{ resource, ips, running }` and to accept a
//! boolean `running` variable that powers the targeted domains on or off.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::command::run;
use crate::controller::{NetworkFacts, NodeController, NodeInfo};
use crate::error::{NodeError, NodeResult};
use crate::network::NetworkSettings;

/// One entry of the `nodes` terraform output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerraformNode {
    /// Resource address used with `-target`.
    pub resource: String,
    /// Addresses assigned to the node.
    #[serde(default)]
    pub ips: Vec<IpAddr>,
    /// Whether the domain is running.
    #[serde(default)]
    pub running: bool,
}

#[derive(Debug, Deserialize)]
struct OutputValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct Outputs {
    nodes: OutputValue<BTreeMap<String, TerraformNode>>,
}

/// Controls nodes described by a terraform working directory.
#[derive(Debug, Clone)]
pub struct TerraformController {
    dir: PathBuf,
    network: NetworkSettings,
    terraform: String,
}

impl TerraformController {
    /// Control the nodes defined in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, network: NetworkSettings) -> Self {
        Self {
            dir: dir.into(),
            network,
            terraform: "terraform".to_string(),
        }
    }

    /// Use a different `terraform` binary.
    #[must_use]
    pub fn with_terraform(mut self, terraform: impl Into<String>) -> Self {
        self.terraform = terraform.into();
        self
    }

    /// The terraform working directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn nodes(&self) -> NodeResult<BTreeMap<String, TerraformNode>> {
        let chdir = format!("-chdir={}", self.dir.display());
        let out = run(&self.terraform, [chdir.as_str(), "output", "-json"], None).await?;
        parse_nodes_output(&out)
    }

    async fn apply(&self, running: bool, target: Option<&str>) -> NodeResult<()> {
        let mut args = vec![
            format!("-chdir={}", self.dir.display()),
            "apply".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
            "-var".to_string(),
            format!("running={running}"),
        ];
        if let Some(resource) = target {
            args.push(format!("-target={resource}"));
        }
        run(&self.terraform, args, None).await.map(|_| ())
    }

    async fn resource_for(&self, name: &str) -> NodeResult<TerraformNode> {
        self.nodes()
            .await?
            .remove(name)
            .ok_or_else(|| NodeError::NodeNotFound(name.to_string()))
    }
}

impl NodeController for TerraformController {
    async fn list_nodes(&self) -> NodeResult<Vec<NodeInfo>> {
        Ok(self
            .nodes()
            .await?
            .into_iter()
            .map(|(name, node)| NodeInfo {
                name,
                running: node.running,
                addresses: node.ips,
            })
            .collect())
    }

    async fn start_all(&self) -> NodeResult<()> {
        info!(dir = %self.dir.display(), "starting all terraform nodes");
        self.apply(true, None).await
    }

    async fn start_node(&self, name: &str) -> NodeResult<()> {
        let node = self.resource_for(name).await?;
        info!(node = %name, resource = %node.resource, "starting terraform node");
        self.apply(true, Some(&node.resource)).await
    }

    async fn stop_all(&self) -> NodeResult<()> {
        info!(dir = %self.dir.display(), "stopping all terraform nodes");
        self.apply(false, None).await
    }

    async fn stop_node(&self, name: &str) -> NodeResult<()> {
        let node = self.resource_for(name).await?;
        info!(node = %name, resource = %node.resource, "stopping terraform node");
        self.apply(false, Some(&node.resource)).await
    }

    async fn network_facts(&self) -> NodeResult<NetworkFacts> {
        let nodes = self.list_nodes().await?;
        self.network.facts(&nodes)
    }
}

/// Parse `terraform output -json` into the `nodes` map.
///
/// # Errors
///
/// Returns [`NodeError::Parse`] if the JSON has no usable `nodes` output.
pub fn parse_nodes_output(json: &str) -> NodeResult<BTreeMap<String, TerraformNode>> {
    serde_json::from_str::<Outputs>(json)
        .map(|outputs| outputs.nodes.value)
        .map_err(|e| NodeError::Parse(format!("terraform output: {e}")))
}
