//! Action dispatch

use crate::cli::{Action, CliError, EXIT_OK, USAGE};
use crate::factory::build_cache;
use crate::report::{render_json, render_report};
use crate::runner::Runner;
use std::io::Write;
use tidycache_cache::{CacheBackend, remove_cache_root};
use tidycache_core::{CommandRunner, Settings};

/// Execute `action` and return the process exit code.
///
/// # Errors
///
/// Returns an error when a maintenance action fails, the wrapped tool cannot
/// be started, or output cannot be written.
pub fn execute<O, E>(
    action: Action,
    settings: &Settings,
    commands: &dyn CommandRunner,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<i32, CliError>
where
    O: Write,
    E: Write,
{
    match action {
        Action::Usage => {
            writeln!(stdout, "Usage: {USAGE}")?;
        }
        Action::PrintCacheDir => {
            writeln!(stdout, "{}", settings.cache_dir.display())?;
        }
        Action::Clean => {
            tracing::debug!(cache_dir = %settings.cache_dir.display(), "Removing cache");
            remove_cache_root(&settings.cache_dir)?;
        }
        Action::ShowStats => {
            let stats = build_cache(settings).query_stats();
            write!(stdout, "{}", render_report(settings, &stats))?;
        }
        Action::PrintStats => {
            let stats = build_cache(settings).query_stats();
            let raw = render_json(&stats)
                .map_err(|e| CliError::other(format!("Failed to serialize stats: {e}")))?;
            writeln!(stdout, "{raw}")?;
        }
        Action::ZeroStats => {
            build_cache(settings).clear_stats()?;
        }
        Action::Run(args) => {
            let cache = build_cache(settings);
            return Runner::new(settings, &cache, commands).run(args, stdout, stderr);
        }
    }
    stdout.flush()?;
    Ok(EXIT_OK)
}
