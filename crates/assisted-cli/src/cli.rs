//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::Parser;

/// Makefile shipped with this crate.
pub const DEFAULT_MAKEFILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/Makefile");

/// Build the test image, then run the assisted installation test suite.
#[derive(Parser, Debug, Clone)]
#[command(name = "run-assisted-tests")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Makefile providing the `image_build` and `test` targets.
    #[arg(long, env = "ASSISTED_TEST_MAKEFILE", default_value = DEFAULT_MAKEFILE)]
    pub makefile: PathBuf,

    /// make program to invoke.
    #[arg(long, env = "MAKE", default_value = "make")]
    pub make: String,

    /// Directory holding the tests. Defaults to the current directory.
    #[arg(long)]
    pub test_dir: Option<PathBuf>,

    /// Skip the image build step.
    #[arg(long)]
    pub skip_image_build: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_bundled_makefile() {
        let cli = Cli::try_parse_from(["run-assisted-tests"]).unwrap();
        assert!(cli.makefile.ends_with("data/Makefile"));
        assert!(!cli.skip_image_build);
        assert!(cli.test_dir.is_none());
    }

    #[test]
    fn accepts_overrides() {
        let cli = Cli::try_parse_from([
            "run-assisted-tests",
            "--makefile",
            "/tmp/Makefile",
            "--make",
            "gmake",
            "--test-dir",
            "/work",
            "--skip-image-build",
        ])
        .unwrap();
        assert_eq!(cli.makefile, PathBuf::from("/tmp/Makefile"));
        assert_eq!(cli.make, "gmake");
        assert_eq!(cli.test_dir, Some(PathBuf::from("/work")));
        assert!(cli.skip_image_build);
    }
}
