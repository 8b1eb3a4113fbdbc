//! Locating the installation service.

use assisted_nodes::command::run;
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

/// Name of the service inside the local deployment.
pub const SERVICE_NAME: &str = "assisted-service";

const MINIKUBE: &str = "minikube";

/// Port the service listens on when exposed on localhost.
pub const LOCAL_SERVICE_PORT: u16 = 8090;

/// URL of the service: the configured remote URL, or the local deployment's.
///
/// # Errors
///
/// Returns an error if the local deployment cannot be queried.
pub async fn service_url(config: &HarnessConfig) -> Result<String> {
    if let Some(url) = &config.remote_service_url {
        return Ok(url.clone());
    }
    local_service_url(&config.profile, &config.namespace, SERVICE_NAME, &config.deploy_target).await
}

/// URL of a service in a local deployment.
///
/// minikube deployments are asked for the URL; kind, podman and on-prem
/// deployments expose the service on localhost.
///
/// # Errors
///
/// Returns an error if `minikube` fails or prints nothing usable.
pub async fn local_service_url(
    profile: &str,
    namespace: &str,
    service: &str,
    deploy_target: &str,
) -> Result<String> {
    if deploy_target != MINIKUBE {
        let url = localhost_url(LOCAL_SERVICE_PORT);
        debug!(deploy_target, url = %url, "using localhost service URL");
        return Ok(url);
    }

    let url = minikube_service_url(MINIKUBE, profile, namespace, service).await?;
    info!(url = %url, profile, namespace, "discovered local service");
    Ok(url)
}

async fn minikube_service_url(
    program: &str,
    profile: &str,
    namespace: &str,
    service: &str,
) -> Result<String> {
    let stdout = run(program, ["-p", profile, "service", service, "-n", namespace, "--url"], None).await?;
    parse_service_url(&stdout)
        .ok_or_else(|| HarnessError::Config(format!("minikube printed no URL for {service}")))
}

fn localhost_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// First `http(s)://` line of `minikube service --url` output.
#[must_use]
pub fn parse_service_url(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
}
