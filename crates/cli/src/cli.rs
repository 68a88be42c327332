//! Command line handling
//!
//! The first argument decides everything: one of the reserved maintenance
//! flags runs that action, anything else is the path of the real tool and the
//! whole argument list is forwarded verbatim (including any `--`).

use clap::{ArgGroup, Parser};
use miette::{Diagnostic, Report};
use std::io::{self, Write};
use thiserror::Error;

/// Exit code for a successful run or cache hit
pub const EXIT_OK: i32 = 0;
/// Exit code for any internal failure
pub const EXIT_INTERNAL: i32 = 1;

/// Name the binary is invoked as in usage text
pub const BIN_NAME: &str = "tidycache";

/// Usage line printed when no arguments are given
pub const USAGE: &str = "tidycache <path-to-real-tool> [tool-options] [-- <compiler command>]";

/// Reserved maintenance flags, only recognized as the first argument.
#[derive(Parser, Debug, Default)]
#[command(
    name = BIN_NAME,
    version,
    about = "Result cache for clang-tidy invocations",
    override_usage = USAGE,
    after_help = "Any first argument that is not one of the flags above is taken as the real tool."
)]
#[command(group(ArgGroup::new("maintenance").required(true)))]
pub struct Maintenance {
    /// Print the cache directory
    #[arg(long, group = "maintenance")]
    pub cache_dir: bool,

    /// Delete the cache directory and everything in it
    #[arg(long, group = "maintenance")]
    pub clean: bool,

    /// Print a human-readable statistics report
    #[arg(long, group = "maintenance")]
    pub show_stats: bool,

    /// Print the raw statistics as JSON
    #[arg(long, group = "maintenance")]
    pub print_stats: bool,

    /// Reset hit and miss counters
    #[arg(long, group = "maintenance")]
    pub zero_stats: bool,
}

impl Maintenance {
    const fn action(&self) -> Action {
        if self.cache_dir {
            Action::PrintCacheDir
        } else if self.clean {
            Action::Clean
        } else if self.show_stats {
            Action::ShowStats
        } else if self.print_stats {
            Action::PrintStats
        } else if self.zero_stats {
            Action::ZeroStats
        } else {
            Action::Usage
        }
    }
}

/// What one process invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No arguments: print usage
    Usage,
    /// `--cache-dir`
    PrintCacheDir,
    /// `--clean`
    Clean,
    /// `--show-stats`
    ShowStats,
    /// `--print-stats`
    PrintStats,
    /// `--zero-stats`
    ZeroStats,
    /// Wrap the real tool; the first element is its path
    Run(Vec<String>),
}

/// Decide the action for `args` (program name already removed).
///
/// # Errors
///
/// Returns a clap error for an unknown leading flag, and for `--help` or
/// `--version`, which clap reports as errors that print to stdout.
pub fn parse_args<I>(args: I) -> Result<Action, clap::Error>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let Some(first) = args.first() else {
        return Ok(Action::Usage);
    };
    if !first.starts_with('-') {
        return Ok(Action::Run(args));
    }
    // Trailing arguments after a reserved flag are ignored
    let flags = Maintenance::try_parse_from([BIN_NAME, first.as_str()])?;
    Ok(flags.action())
}

/// Exit code for a clap parse failure: 0 for help and version output.
#[must_use]
pub fn exit_code_for_parse_error(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        EXIT_INTERNAL
    } else {
        EXIT_OK
    }
}

/// Fatal CLI errors. All of them exit with [`EXIT_INTERNAL`].
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Settings or arguments could not be used
    #[error("Configuration error: {message}")]
    #[diagnostic(code(tidycache::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The real tool could not be started
    #[error("Failed to run '{tool}': {message}")]
    #[diagnostic(
        code(tidycache::cli::tool),
        help("The first argument must be the path to the real clang-tidy executable")
    )]
    Tool {
        /// Path of the tool
        tool: String,
        /// Why it could not be started
        message: String,
    },
    /// A maintenance action on the cache failed
    #[error("Cache error: {message}")]
    #[diagnostic(code(tidycache::cli::cache))]
    Cache {
        /// The error message
        message: String,
    },
    /// Anything else, such as a closed output stream
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(tidycache::cli::other))]
    Other {
        /// The error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create an error for a tool that could not be started
    #[must_use]
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<tidycache_core::Error> for CliError {
    fn from(err: tidycache_core::Error) -> Self {
        match err {
            tidycache_core::Error::Configuration { message } => Self::config(message),
            tidycache_core::Error::Invocation { message } => Self::Config {
                message,
                help: Some(format!("Usage: {USAGE}")),
            },
            other => Self::other(other.to_string()),
        }
    }
}

impl From<tidycache_cache::BackendError> for CliError {
    fn from(err: tidycache_cache::BackendError) -> Self {
        Self::Cache {
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::other(format!("Failed to write output: {err}"))
    }
}

/// Print `err` to stderr through miette.
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}
