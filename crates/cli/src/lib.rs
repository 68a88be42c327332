//! tidycache: result cache for clang-tidy
//!
//! Wraps a clang-tidy invocation, fingerprints everything that influences its
//! result and skips the run when an identical invocation already succeeded.
//!
//! - [`cli`]: argument dispatch, exit codes and fatal error rendering
//! - [`factory`]: builds the tiered cache from the environment
//! - [`runner`]: lookup, pass-through and store for one invocation
//! - [`report`]: `--show-stats` / `--print-stats` output
//! - [`tracing`]: subscriber setup

// The binary reports fatal errors on stderr directly
#![allow(clippy::print_stderr)]

pub mod cli;
pub mod commands;
pub mod factory;
pub mod report;
pub mod runner;
pub mod tracing;

pub use cli::{Action, CliError, EXIT_INTERNAL, EXIT_OK};
pub use runner::Runner;
