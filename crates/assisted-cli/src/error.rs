//! CLI error types.

use std::fmt;

/// Errors that stop a run before the test step reports a result.
#[derive(Debug)]
pub enum CliError {
    /// The make program could not be started.
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The image build step failed.
    ImageBuild(Option<i32>),
    /// The current directory could not be determined.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { program, source } => write!(f, "failed to run {program}: {source}"),
            Self::ImageBuild(Some(code)) => write!(f, "image build failed with exit code {code}"),
            Self::ImageBuild(None) => write!(f, "image build was terminated by a signal"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Io(source) => Some(source),
            Self::ImageBuild(_) => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
