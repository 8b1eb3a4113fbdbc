//! Tenant identities.

use std::fmt;

/// Authentication material of one tenant.
///
/// A *user* identity authenticates with an offline token. An *agent* identity
/// has no token and authenticates with the pull secret, the way discovery
/// agents booted from a cluster's image do.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
    offline_token: String,
    pull_secret: String,
}

impl Identity {
    /// A user identity.
    #[must_use]
    pub fn user(
        name: impl Into<String>,
        offline_token: impl Into<String>,
        pull_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            offline_token: offline_token.into(),
            pull_secret: pull_secret.into(),
        }
    }

    /// An agent identity (empty offline token).
    #[must_use]
    pub fn agent(name: impl Into<String>, pull_secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offline_token: String::new(),
            pull_secret: pull_secret.into(),
        }
    }

    /// Display name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offline token, empty for agent identities.
    #[must_use]
    pub fn offline_token(&self) -> &str {
        &self.offline_token
    }

    /// Pull secret.
    #[must_use]
    pub fn pull_secret(&self) -> &str {
        &self.pull_secret
    }

    /// Whether this identity authenticates with a pull secret only.
    #[must_use]
    pub fn is_agent(&self) -> bool {
        self.offline_token.is_empty()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("agent", &self.is_agent())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_identity_has_no_token() {
        let agent = Identity::agent("agent2", "{\"auths\":{}}");
        assert!(agent.is_agent());
        assert!(agent.offline_token().is_empty());
        assert_eq!(agent.pull_secret(), "{\"auths\":{}}");
    }

    #[test]
    fn debug_never_prints_secrets() {
        let user = Identity::user("user1", "offline-secret", "pull-secret");
        let rendered = format!("{user:?}");
        assert!(rendered.contains("user1"));
        assert!(!rendered.contains("offline-secret"));
        assert!(!rendered.contains("pull-secret"));
    }
}
