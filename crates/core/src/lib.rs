//! Core types for tidycache
//!
//! - [`config`]: environment-derived [`Settings`] snapshot
//! - [`invocation`]: splitting the wrapped command line into tool and compiler parts
//! - [`compile_db`]: `compile_commands.json` lookup
//! - [`fingerprint`]: content-addressed [`Digest`] computation
//! - [`process`]: subprocess execution seam

pub mod compile_db;
pub mod config;
pub mod digest;
mod error;
pub mod fingerprint;
pub mod invocation;
pub mod process;

pub use config::Settings;
pub use digest::Digest;
pub use error::{Error, Result};
pub use fingerprint::{FingerprintBuilder, Fingerprinter};
pub use invocation::Invocation;
pub use process::{CommandOutput, CommandRunner, SystemCommandRunner};
