//! Error types for the harness.

use std::time::Duration;

use assisted_api::ApiError;
use assisted_nodes::NodeError;
use thiserror::Error;

/// Errors that can occur while driving a cluster or checking isolation.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The installation API returned an error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The node backend returned an error.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// A wait did not observe its condition in time.
    #[error("timed out after {waited:?} waiting for {description} (last observed: {last_observed})")]
    Timeout {
        /// What was being waited for.
        description: String,
        /// How long the wait ran.
        waited: Duration,
        /// Debug rendering of the last probed value.
        last_observed: String,
    },

    /// An operation was called in a lifecycle state that does not allow it.
    #[error("cannot {operation} while cluster is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: String,
        /// Lifecycle state at the time.
        state: String,
    },

    /// The cluster or one of its hosts ended in a failed status.
    #[error("installation of cluster {cluster_id} failed: {reason}")]
    InstallFailed {
        /// Cluster that failed.
        cluster_id: String,
        /// Status detail reported by the service.
        reason: String,
    },

    /// A negative check expected a failure but the call succeeded.
    #[error("{operation} unexpectedly succeeded")]
    UnexpectedSuccess {
        /// Operation that was attempted.
        operation: String,
    },

    /// A negative check failed with a different error than expected.
    #[error("{operation} failed with {actual}, expected HTTP {expected_status} {expected_reason}")]
    UnexpectedError {
        /// Operation that was attempted.
        operation: String,
        /// Expected HTTP status.
        expected_status: u16,
        /// Expected reason phrase.
        expected_reason: String,
        /// The error that was returned instead.
        actual: ApiError,
    },

    /// A scenario observed something other than what it expected.
    #[error("check failed: {0}")]
    CheckFailed(String),

    /// Harness configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local IO failed (image download path).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
