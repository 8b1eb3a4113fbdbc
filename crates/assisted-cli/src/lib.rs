//! # assisted-cli
//!
//! The `run-assisted-tests` entry point.
//!
//! A run has two steps, both targets of one makefile:
//!
//! 1. `make -f <makefile> image_build` builds the test image
//! 2. `make -f <makefile> test` runs the suite with `TEST` set to the test
//!    directory
//!
//! A failed image build ends the run; otherwise the exit code is the test
//! step's.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod error;
pub mod runner;

pub use cli::{Cli, DEFAULT_MAKEFILE};
pub use error::CliError;
pub use runner::MakeRunner;
