//! Credential handling for REST calls.
//!
//! Users present a bearer access token obtained by exchanging their offline
//! token at the SSO token endpoint. Agents present the `cloud.openshift.com`
//! auth value of their pull secret in the `X-Secret-Key` header.

use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Default SSO token endpoint.
pub const DEFAULT_SSO_URL: &str =
    "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token";

/// OAuth client id used for the offline token exchange.
pub const SSO_CLIENT_ID: &str = "cloud-services";

/// Header carrying the agent credential.
pub const AGENT_AUTH_HEADER: &str = "X-Secret-Key";

/// Registry whose auth entry authenticates agents.
const AGENT_AUTH_REGISTRY: &str = "cloud.openshift.com";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// How a client authenticates its requests.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Credential {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `X-Secret-Key: <auth>`.
    AgentKey(String),
    /// No credential at all.
    Anonymous,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::AgentKey(_) => f.write_str("AgentKey(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Exchange an offline (refresh) token for an access token.
///
/// # Errors
///
/// Returns an error if the SSO endpoint is unreachable, rejects the token, or
/// answers with an unexpected body.
pub async fn exchange_offline_token(
    http: &reqwest::Client,
    sso_url: &str,
    offline_token: &str,
) -> ApiResult<String> {
    debug!(sso_url = %sso_url, "exchanging offline token");

    let response = http
        .post(sso_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", SSO_CLIENT_ID),
            ("refresh_token", offline_token),
        ])
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("token response: {e}")))?;
    Ok(token.access_token)
}

/// Extract the agent credential from a pull secret.
///
/// # Errors
///
/// Returns an error if the pull secret is not JSON or has no
/// `auths["cloud.openshift.com"].auth` entry.
pub fn agent_key_from_pull_secret(pull_secret: &str) -> ApiResult<String> {
    let value: serde_json::Value = serde_json::from_str(pull_secret)
        .map_err(|e| ApiError::Config(format!("pull secret is not valid JSON: {e}")))?;

    value
        .get("auths")
        .and_then(|auths| auths.get(AGENT_AUTH_REGISTRY))
        .and_then(|entry| entry.get("auth"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::Config(format!(
                "pull secret has no auth entry for {AGENT_AUTH_REGISTRY}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_key_is_read_from_cloud_registry() {
        let pull_secret = r#"{"auths":{"cloud.openshift.com":{"auth":"c2VjcmV0","email":"a@b.c"}}}"#;
        assert_eq!(agent_key_from_pull_secret(pull_secret).unwrap(), "c2VjcmV0");
    }

    #[test]
    fn agent_key_missing_registry_is_config_error() {
        let pull_secret = r#"{"auths":{"quay.io":{"auth":"eA=="}}}"#;
        let err = agent_key_from_pull_secret(pull_secret).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn agent_key_rejects_non_json() {
        assert!(agent_key_from_pull_secret("not json").is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::Bearer("abc.def".into()));
        assert!(!rendered.contains("abc.def"));
    }
}
