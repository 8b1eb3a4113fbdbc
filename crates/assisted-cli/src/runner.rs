//! The two make steps of a test run.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::Command;
use tracing::{error, info};

use crate::error::CliError;

/// Target that builds the test image.
pub const IMAGE_BUILD_TARGET: &str = "image_build";

/// Target that runs the tests.
pub const TEST_TARGET: &str = "test";

/// Runs targets of one makefile.
#[derive(Debug, Clone)]
pub struct MakeRunner {
    make: String,
    makefile: PathBuf,
}

impl MakeRunner {
    /// A runner invoking `make -f makefile`.
    #[must_use]
    pub fn new(make: impl Into<String>, makefile: impl Into<PathBuf>) -> Self {
        Self {
            make: make.into(),
            makefile: makefile.into(),
        }
    }

    /// Makefile the targets come from.
    #[must_use]
    pub fn makefile(&self) -> &Path {
        &self.makefile
    }

    async fn target(&self, target: &str, env: &[(&str, &Path)]) -> Result<ExitStatus, CliError> {
        info!(make = %self.make, makefile = %self.makefile.display(), target, "running make target");
        let mut command = Command::new(&self.make);
        command.arg("-f").arg(&self.makefile).arg(target);
        for (key, value) in env {
            command.env(key, value);
        }
        command.status().await.map_err(|source| CliError::Spawn {
            program: self.make.clone(),
            source,
        })
    }

    /// Build the test image.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::ImageBuild`] if the target fails.
    pub async fn image_build(&self) -> Result<(), CliError> {
        let status = self.target(IMAGE_BUILD_TARGET, &[]).await?;
        if status.success() {
            Ok(())
        } else {
            error!(code = ?status.code(), "image build failed");
            Err(CliError::ImageBuild(status.code()))
        }
    }

    /// Run the tests in `test_dir`, exported as `TEST`.
    ///
    /// Returns the exit code of the test step; 1 when it was killed by a
    /// signal.
    ///
    /// # Errors
    ///
    /// Returns an error if make cannot be started.
    pub async fn test(&self, test_dir: &Path) -> Result<i32, CliError> {
        let status = self.target(TEST_TARGET, &[("TEST", test_dir)]).await?;
        let code = status.code().unwrap_or(1);
        info!(code, test_dir = %test_dir.display(), "test step finished");
        Ok(code)
    }

    /// Image build, then tests. A failed build skips the tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the build fails or make cannot be started.
    pub async fn run(&self, test_dir: &Path, skip_image_build: bool) -> Result<i32, CliError> {
        if !skip_image_build {
            self.image_build().await?;
        }
        self.test(test_dir).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// A runner whose "make" is `sh` and whose "makefile" is a script, so
    /// `sh -f script target` runs the script with the target as `$1`.
    fn fake_make(dir: &Path, build_code: i32, test_code: i32) -> MakeRunner {
        let path = dir.join("fake-make.sh");
        let log = dir.join("calls.log");
        let script = format!(
            "if [ \"$1\" = image_build ]; then echo image_build >> '{log}'; exit {build_code}; fi\necho \"$1 TEST=$TEST\" >> '{log}'\nexit {test_code}\n",
            log = log.display()
        );
        std::fs::write(&path, script).unwrap();
        MakeRunner::new("sh", path)
    }

    fn calls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn builds_then_tests_with_test_dir_exported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = fake_make(dir.path(), 0, 3);

        let code = runner.run(Path::new("/work/tests"), false).await.unwrap();
        assert_eq!(code, 3);
        assert_eq!(
            calls(dir.path()),
            vec!["image_build".to_string(), "test TEST=/work/tests".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_build_skips_tests() {
        let dir = tempfile::tempdir().unwrap();
        let runner = fake_make(dir.path(), 2, 0);

        let err = runner.run(Path::new("/work"), false).await.unwrap_err();
        assert!(matches!(err, CliError::ImageBuild(Some(2))));
        assert_eq!(calls(dir.path()), vec!["image_build".to_string()]);
    }

    #[tokio::test]
    async fn build_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let runner = fake_make(dir.path(), 2, 0);

        assert_eq!(runner.run(Path::new("/work"), true).await.unwrap(), 0);
        assert_eq!(calls(dir.path()), vec!["test TEST=/work".to_string()]);
    }

    #[tokio::test]
    async fn missing_make_is_a_spawn_error() {
        let runner = MakeRunner::new("/nonexistent/make", "/data/Makefile");
        let err = runner.image_build().await.unwrap_err();
        assert!(matches!(err, CliError::Spawn { .. }));
    }
}
