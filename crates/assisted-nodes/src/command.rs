//! Running backend command-line tools.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{NodeError, NodeResult};

/// Run `program` with `args` and return its standard output.
///
/// # Errors
///
/// Returns [`NodeError::Spawn`] if the program cannot be started and
/// [`NodeError::Command`] if it exits unsuccessfully.
pub async fn run<I, S>(program: &str, args: I, cwd: Option<&Path>) -> NodeResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    debug!(program = %program, args = ?args, "running backend command");

    let mut cmd = Command::new(program);
    cmd.args(&args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|source| NodeError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(NodeError::Command {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    trace!(program = %program, bytes = stdout.len(), "backend command finished");
    Ok(stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout() {
        let out = run("echo", ["hello"], None).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn run_reports_failure_status() {
        let err = run("false", Vec::<String>::new(), None).await.unwrap_err();
        assert!(matches!(err, NodeError::Command { .. }));
    }

    #[tokio::test]
    async fn run_reports_missing_program() {
        let err = run("definitely-not-a-real-binary-xyz", ["x"], None)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Spawn { .. }));
    }
}
