//! Error types for node control.

use thiserror::Error;

/// Errors that can occur while controlling nodes.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A backend command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        /// Program that was run.
        program: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A backend command could not be spawned.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was run.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Backend output could not be parsed.
    #[error("failed to parse backend output: {0}")]
    Parse(String),

    /// No node with this name is managed by the controller.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Invalid backend configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network facts could not be derived.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected an operation.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for node operations.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_display() {
        let err = NodeError::Command {
            program: "virsh".into(),
            status: "exit status: 1".into(),
            stderr: "domain not found".into(),
        };
        assert_eq!(err.to_string(), "virsh exited with exit status: 1: domain not found");
    }

    #[test]
    fn node_not_found_display() {
        let err = NodeError::NodeNotFound("master-3".into());
        assert_eq!(err.to_string(), "node not found: master-3");
    }
}
