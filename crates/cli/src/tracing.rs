//! Tracing setup for the tidycache binary
//!
//! Everything goes to stderr so the wrapped tool's stdout stays byte-exact.
//! `RUST_LOG` replaces the computed filter entirely.

use std::io;
use tidycache_core::config::parse_flag;
pub use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are shown at the configured level
const CRATES: &[&str] = &[
    "tidycache",
    "tidycache_core",
    "tidycache_cache",
    "tidycache_remote",
    "tidycache_aws",
    "tidycache_gcp",
];

/// Tracing output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line human-readable format
    Pretty,
    /// Single-line format
    #[default]
    Compact,
    /// Structured JSON format
    Json,
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown tracing format: {s}")),
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format
    pub format: TracingFormat,
    /// Level for tidycache crates when `RUST_LOG` is unset
    pub level: Level,
    /// Explicit filter directive, overriding both `RUST_LOG` and `level`
    pub filter: Option<String>,
    /// A `CTCACHE_LOG_FORMAT` value that was not understood
    pub rejected_format: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Compact,
            level: Level::WARN,
            filter: None,
            rejected_format: None,
        }
    }
}

impl TracingConfig {
    /// Read `CTCACHE_DEBUG` and `CTCACHE_LOG_FORMAT` from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`TracingConfig::from_env`] with an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = if lookup("CTCACHE_DEBUG").is_some_and(|v| parse_flag(&v)) {
            Level::DEBUG
        } else {
            Level::WARN
        };
        let requested = lookup("CTCACHE_LOG_FORMAT").filter(|v| !v.trim().is_empty());
        let (format, rejected_format) = match requested {
            Some(raw) => match raw.parse() {
                Ok(format) => (format, None),
                Err(_) => (TracingFormat::default(), Some(raw)),
            },
            None => (TracingFormat::default(), None),
        };

        Self {
            format,
            level,
            filter: None,
            rejected_format,
        }
    }

    /// Filter directive for tidycache crates at `level`.
    #[must_use]
    pub fn default_directive(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        CRATES
            .iter()
            .map(|name| format!("{name}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> miette::Result<()> {
    let env_filter = if let Some(filter) = &config.filter {
        EnvFilter::try_new(filter)
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.default_directive()))
    }
    .map_err(|e| miette::miette!("Failed to create tracing filter: {e}"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        TracingFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(true);

            registry.with(layer).init();
        }
        TracingFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false)
                .with_thread_ids(false);

            registry.with(layer).init();
        }
        TracingFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true);

            registry.with(layer).init();
        }
    }

    if let Some(raw) = &config.rejected_format {
        tracing::warn!(value = %raw, "Unknown CTCACHE_LOG_FORMAT, using compact");
    }

    Ok(())
}
