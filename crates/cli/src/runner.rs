//! Invocation runner
//!
//! Looks the invocation up in the cache and either replays the stored result
//! or runs the real tool and stores what it produced. Cache trouble of any
//! kind degrades to running the tool; it never changes what the caller sees.

use crate::cli::{CliError, EXIT_INTERNAL, EXIT_OK};
use std::io::Write;
use tidycache_cache::CacheBackend;
use tidycache_core::{CommandOutput, CommandRunner, Digest, Fingerprinter, Invocation, Settings};

/// Runs one wrapped tool invocation against a cache.
pub struct Runner<'a> {
    settings: &'a Settings,
    cache: &'a dyn CacheBackend,
    commands: &'a dyn CommandRunner,
}

impl<'a> Runner<'a> {
    /// Create a runner.
    #[must_use]
    pub fn new(
        settings: &'a Settings,
        cache: &'a dyn CacheBackend,
        commands: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            settings,
            cache,
            commands,
        }
    }

    /// Run `args` (real tool path first) and return the exit code to report.
    ///
    /// The tool's stdout and stderr, or the replayed stdout on a hit, are
    /// written to `stdout` and `stderr` unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if `args` is empty, the tool cannot be started, or
    /// writing to `stdout`/`stderr` fails.
    pub fn run<O, E>(&self, args: Vec<String>, stdout: &mut O, stderr: &mut E) -> Result<i32, CliError>
    where
        O: Write,
        E: Write,
    {
        let invocation = Invocation::parse(args, self.settings.hashing.keep_comments)?;
        let digest = self.digest(&invocation);

        if let Some(digest) = &digest
            && let Some(code) = self.replay(digest, stdout)?
        {
            return Ok(code);
        }

        let argv = invocation.original_args();
        let output = self.commands.run(argv).map_err(|e| {
            CliError::tool(argv.first().cloned().unwrap_or_default(), e.to_string())
        })?;
        stdout.write_all(&output.stdout)?;
        stderr.write_all(&output.stderr)?;
        stdout.flush()?;
        stderr.flush()?;

        if let Some(digest) = &digest {
            self.record(digest, &output);
        }

        Ok(output.code.unwrap_or(EXIT_INTERNAL))
    }

    fn digest(&self, invocation: &Invocation) -> Option<Digest> {
        let mut fingerprinter = Fingerprinter::new(&self.settings.hashing, self.commands);
        if self.settings.debug.dump {
            fingerprinter = fingerprinter.with_dump(self.settings.debug.dump_path());
        }
        match fingerprinter.compute(invocation) {
            Ok(Some(digest)) => {
                tracing::debug!(digest = %digest, "Computed digest");
                Some(digest)
            }
            Ok(None) => {
                tracing::debug!("Nothing to fingerprint, not caching");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not fingerprint invocation, not caching");
                None
            }
        }
    }

    /// Exit code of a cache hit, after replaying any stored output.
    fn replay<O: Write>(&self, digest: &Digest, stdout: &mut O) -> Result<Option<i32>, CliError> {
        if self.settings.output.save_output {
            let Some(payload) = self.cache.get_data(digest) else {
                return Ok(None);
            };
            let (code, output) = match payload.split_first() {
                Some((code, output)) => (i32::from(*code), output),
                None => (EXIT_OK, &[][..]),
            };
            tracing::debug!(digest = %digest, code, bytes = output.len(), "Replaying cached output");
            stdout.write_all(output)?;
            stdout.flush()?;
            return Ok(Some(code));
        }

        if self.cache.is_cached(digest) {
            tracing::debug!(digest = %digest, "Cache hit");
            return Ok(Some(EXIT_OK));
        }
        Ok(None)
    }

    fn record(&self, digest: &Digest, output: &CommandOutput) {
        let mode = self.settings.output;
        let success = output.success() && (output.stdout.is_empty() || mode.ignore_output);
        if !success && !mode.save_even_without_success() {
            tracing::debug!(digest = %digest, code = ?output.code, "Not caching unsuccessful run");
            return;
        }

        let result = if mode.save_output {
            let Some(code) = output.code.and_then(|code| u8::try_from(code).ok()) else {
                tracing::debug!(digest = %digest, code = ?output.code, "Exit code cannot be stored");
                return;
            };
            let mut payload = Vec::with_capacity(output.stdout.len() + 1);
            payload.push(code);
            payload.extend_from_slice(&output.stdout);
            self.cache.store_with_data(digest, &payload)
        } else {
            self.cache.store(digest)
        };

        match result {
            Ok(()) => tracing::debug!(digest = %digest, "Stored result"),
            Err(e) => tracing::warn!(digest = %digest, error = %e, "Failed to store result"),
        }
    }
}
