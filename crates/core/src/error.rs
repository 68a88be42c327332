//! Error types for the core crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for settings, invocation parsing and fingerprinting
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while reading sources or the compilation database
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(tidycache::core::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "spawn")
        operation: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    #[diagnostic(code(tidycache::core::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Command line could not be split into tool and compiler arguments
    #[error("Invalid invocation: {message}")]
    #[diagnostic(
        code(tidycache::core::invocation),
        help("Usage: tidycache <path-to-real-tool> [tool-options] [-- <compiler command>]")
    )]
    Invocation {
        /// What was wrong with the arguments
        message: String,
    },

    /// Compilation database could not be read or has no entry for the file
    #[error("Compilation database error: {message}")]
    #[diagnostic(code(tidycache::core::compile_db))]
    CompileDb {
        /// Error message describing the lookup failure
        message: String,
    },

    /// A subprocess required for fingerprinting did not produce usable output
    #[error("Command `{command}` failed: {message}")]
    #[diagnostic(code(tidycache::core::command))]
    Command {
        /// The command line that was run
        command: String,
        /// Why its output was rejected
        message: String,
    },

    /// A string did not parse as a digest
    #[error("Invalid digest '{value}': {message}")]
    #[diagnostic(code(tidycache::core::digest))]
    InvalidDigest {
        /// The rejected input
        value: String,
        /// Why it was rejected
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an invocation error
    #[must_use]
    pub fn invocation(msg: impl Into<String>) -> Self {
        Self::Invocation {
            message: msg.into(),
        }
    }

    /// Create a compilation database error
    #[must_use]
    pub fn compile_db(msg: impl Into<String>) -> Self {
        Self::CompileDb {
            message: msg.into(),
        }
    }

    /// Create a command failure error
    #[must_use]
    pub fn command(command: &[String], msg: impl Into<String>) -> Self {
        Self::Command {
            command: command.join(" "),
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
