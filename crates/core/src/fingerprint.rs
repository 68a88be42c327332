//! Fingerprint computation
//!
//! Folds everything that can change a tool run's result into one SHA-256:
//! 1. Source bytes, or the compiler's preprocessed output when a compile
//!    command is known
//! 2. The tool's effective configuration for each source file (`--dump-config`),
//!    in resolved-path order
//! 3. Normalized tool arguments, deduplicated and sorted
//! 4. Normalized compiler arguments, deduplicated and sorted
//!
//! Sorting the argument chunks makes the digest independent of flag order.

use crate::config::HashSettings;
use crate::digest::Digest;
use crate::invocation::Invocation;
use crate::process::CommandRunner;
use crate::{Error, Result};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flags whose value is a machine-local output path.
const OUTPUT_PATH_FLAGS: &[&str] = &["-export-fixes", "--export-fixes"];

/// Config-dump lines that differ between users of the same checkout.
const USER_CONFIG_PATTERNS: &[&str] = &["User:.*$", "HeaderFilterRegex:.*$"];

/// Incremental hasher that optionally mirrors every input to a dump file.
pub struct FingerprintBuilder {
    hasher: Sha256,
    dump: Option<File>,
}

impl FingerprintBuilder {
    /// Create a builder with no dump file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            dump: None,
        }
    }

    /// Append all hashed bytes to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dump file cannot be opened.
    pub fn with_dump(mut self, path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(e, path, "open dump"))?;
        self.dump = Some(file);
        Ok(self)
    }

    /// Add a block of raw content. Empty input is ignored.
    pub fn add_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        if bytes.is_empty() {
            return self;
        }
        self.hasher.update(bytes);
        if let Some(dump) = self.dump.as_mut()
            && let Err(e) = dump.write_all(bytes)
        {
            tracing::warn!(error = %e, "Failed to write hash dump, disabling it");
            self.dump = None;
        }
        self
    }

    /// Add normalized argument chunks in sorted order.
    pub fn add_chunks(&mut self, chunks: &BTreeSet<String>) -> &mut Self {
        for chunk in chunks {
            self.add_bytes(chunk.as_bytes());
            self.hasher.update([0u8]); // separator
        }
        self
    }

    /// Finalize into a [`Digest`].
    #[must_use]
    pub fn finalize(self) -> Digest {
        Digest::from_sha256_hex(hex::encode(self.hasher.finalize()))
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled hashing rules.
#[derive(Debug)]
struct Rules {
    strip: Vec<regex::Regex>,
    strip_bytes: Vec<regex::bytes::Regex>,
    strip_src: bool,
    exclude: Option<regex::Regex>,
    exclude_user_config: Option<Vec<regex::Regex>>,
}

impl Rules {
    fn compile(settings: &HashSettings) -> Result<Self> {
        let invalid = |pattern: &str, e: regex::Error| {
            Error::configuration(format!("invalid regex '{pattern}': {e}"))
        };

        let strip = settings
            .strip_patterns
            .iter()
            .map(|p| regex::Regex::new(p).map_err(|e| invalid(p, e)))
            .collect::<Result<Vec<_>>>()?;
        let strip_bytes = settings
            .strip_patterns
            .iter()
            .map(|p| regex::bytes::Regex::new(p).map_err(|e| invalid(p, e)))
            .collect::<Result<Vec<_>>>()?;
        let exclude = settings
            .exclude_hash_regex
            .as_deref()
            .map(|p| regex::Regex::new(&format!("^(?:{p})")).map_err(|e| invalid(p, e)))
            .transpose()?;
        let exclude_user_config = if settings.exclude_user_config {
            Some(
                USER_CONFIG_PATTERNS
                    .iter()
                    .map(|p| regex::Regex::new(p).map_err(|e| invalid(p, e)))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };

        Ok(Self {
            strip,
            strip_bytes,
            strip_src: settings.strip_src,
            exclude,
            exclude_user_config,
        })
    }

    fn strip_text(&self, text: &str) -> String {
        self.strip.iter().fold(text.to_string(), |acc, re| {
            re.replace_all(&acc, "").into_owned()
        })
    }

    fn strip_content(&self, content: Vec<u8>) -> Vec<u8> {
        if !self.strip_src {
            return content;
        }
        self.strip_bytes.iter().fold(content, |acc, re| {
            re.replace_all(&acc, &b""[..]).into_owned()
        })
    }

    fn filter_config(&self, dump: Vec<u8>) -> Vec<u8> {
        let Some(patterns) = &self.exclude_user_config else {
            return dump;
        };
        let text = String::from_utf8_lossy(&dump);
        text.split('\n')
            .filter(|line| !patterns.iter().any(|re| re.is_match(line)))
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    /// Normalize one argument into a hash chunk; empty means "skip".
    fn normalize_argument(&self, arg: &str) -> String {
        let arg = arg.trim();
        if arg.starts_with("# ") {
            return String::new();
        }
        arg.split_whitespace()
            .map(|token| token.trim_matches('"'))
            .map(|token| match fs::canonicalize(token) {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(_) => token.to_string(),
            })
            .map(|token| self.strip_text(&token))
            .collect()
    }

    fn chunks<'a>(&self, args: impl Iterator<Item = &'a String>) -> BTreeSet<String> {
        args.map(|arg| self.normalize_argument(arg))
            .filter(|chunk| !chunk.is_empty())
            .filter(|chunk| !self.exclude.as_ref().is_some_and(|re| re.is_match(chunk)))
            .collect()
    }
}

/// Computes invocation digests.
pub struct Fingerprinter<'a> {
    settings: &'a HashSettings,
    runner: &'a dyn CommandRunner,
    dump_path: Option<PathBuf>,
}

impl<'a> Fingerprinter<'a> {
    /// Create a fingerprinter that runs subprocesses through `runner`.
    #[must_use]
    pub fn new(settings: &'a HashSettings, runner: &'a dyn CommandRunner) -> Self {
        Self {
            settings,
            runner,
            dump_path: None,
        }
    }

    /// Mirror hashed bytes into `path`.
    #[must_use]
    pub fn with_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    /// Compute the digest of `invocation`.
    ///
    /// Returns `Ok(None)` when the invocation carries nothing to hash.
    ///
    /// # Errors
    ///
    /// Returns an error when a required subprocess fails, a source cannot be
    /// read, or a configured pattern is invalid. Callers treat this as
    /// "not cacheable".
    pub fn compute(&self, invocation: &Invocation) -> Result<Option<Digest>> {
        let tool_args = invocation.tool_args();
        let compiler_args = invocation.compiler_args();
        if tool_args.len() <= 1 && compiler_args.is_empty() {
            return Ok(None);
        }

        let rules = Rules::compile(self.settings)?;
        let mut builder = FingerprintBuilder::new();
        if let Some(path) = &self.dump_path {
            builder = builder.with_dump(path)?;
        }

        // Source content
        if compiler_args.is_empty() {
            for source in invocation.source_files() {
                let content = fs::read(source).map_err(|e| Error::io(e, source, "read"))?;
                builder.add_bytes(&rules.strip_content(content));
            }
        } else {
            let preprocessed = self.preprocess(invocation)?;
            builder.add_bytes(&rules.strip_content(preprocessed));
        }

        // Effective configuration per source file
        for dump in self.dump_configs(invocation, &rules)? {
            builder.add_bytes(&dump);
        }

        // Arguments
        let tool_args = omit_output_paths(tool_args);
        builder.add_chunks(&rules.chunks(tool_args.iter().skip(1)));
        builder.add_chunks(&rules.chunks(compiler_args.iter().skip(1)));

        Ok(Some(builder.finalize()))
    }

    fn preprocess(&self, invocation: &Invocation) -> Result<Vec<u8>> {
        let argv = invocation.compiler_args();
        let output = self.runner.run(argv)?;

        if !output.success() {
            return Err(Error::command(
                argv,
                format!("exited with {:?}", output.code),
            ));
        }
        if !invocation.is_msvc_style() && !output.stderr.is_empty() {
            return Err(Error::command(
                argv,
                format!("wrote to stderr: {}", String::from_utf8_lossy(&output.stderr)),
            ));
        }
        Ok(output.stdout)
    }

    fn dump_configs(&self, invocation: &Invocation, rules: &Rules) -> Result<Vec<Vec<u8>>> {
        let tool_args = invocation.tool_args();
        let sources = invocation.source_files();

        let mut flags: Vec<String> = tool_args.iter().take(1).cloned().collect();
        flags.extend(
            tool_args
                .iter()
                .skip(1)
                .filter(|arg| !sources.contains(&arg.as_str()))
                .cloned(),
        );

        let mut resolved: Vec<PathBuf> = sources
            .iter()
            .map(|source| fs::canonicalize(source).map_err(|e| Error::io(e, source, "resolve")))
            .collect::<Result<_>>()?;
        resolved.sort();

        resolved
            .iter()
            .map(|source| {
                let mut argv = flags.clone();
                argv.push("--dump-config".to_string());
                argv.push(source.to_string_lossy().into_owned());

                let output = self.runner.run(&argv)?;
                let dump = rules.filter_config(output.stdout.clone());
                if !output.success() || dump.is_empty() {
                    return Err(Error::command(&argv, "could not dump configuration"));
                }
                Ok(dump)
            })
            .collect()
    }
}

/// Drop output-path flags together with their value.
fn omit_output_paths(args: &[String]) -> Vec<String> {
    let mut kept = Vec::with_capacity(args.len());
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if OUTPUT_PATH_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        let joined = OUTPUT_PATH_FLAGS
            .iter()
            .any(|flag| arg.strip_prefix(flag).is_some_and(|rest| rest.starts_with('=')));
        if !joined {
            kept.push(arg.clone());
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted runner: answers `--dump-config` with a fixed config and
    /// compiler commands with fixed preprocessed output.
    struct FakeRunner {
        config: Vec<u8>,
        preprocessed: CommandOutput,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeRunner {
        fn new(config: &str) -> Self {
            Self {
                config: config.as_bytes().to_vec(),
                preprocessed: CommandOutput {
                    code: Some(0),
                    stdout: b"int main() { return 0; }".to_vec(),
                    stderr: Vec::new(),
                },
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, argv: &[String]) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(argv.to_vec());
            if argv.iter().any(|a| a == "--dump-config") {
                Ok(CommandOutput {
                    code: Some(0),
                    stdout: self.config.clone(),
                    stderr: Vec::new(),
                })
            } else {
                Ok(self.preprocessed.clone())
            }
        }
    }

    struct Fixture {
        _tmp: TempDir,
        source: String,
    }

    fn fixture(content: &str) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.cpp");
        fs::write(&path, content).unwrap();
        Fixture {
            source: path.display().to_string(),
            _tmp: tmp,
        }
    }

    fn invocation(parts: &[&str]) -> Invocation {
        Invocation::parse(parts.iter().map(|s| (*s).to_string()).collect(), false).unwrap()
    }

    fn digest_of(settings: &HashSettings, runner: &FakeRunner, parts: &[&str]) -> Digest {
        Fingerprinter::new(settings, runner)
            .compute(&invocation(parts))
            .unwrap()
            .unwrap()
    }

    // ==========================================================================
    // Determinism
    // ==========================================================================

    #[test]
    fn test_same_inputs_same_digest() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let args = ["clang-tidy", "-checks=*", fx.source.as_str()];
        assert_eq!(
            digest_of(&settings, &runner, &args),
            digest_of(&settings, &runner, &args)
        );
    }

    #[test]
    fn test_flag_order_does_not_matter() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let a = digest_of(
            &settings,
            &runner,
            &["clang-tidy", "-checks=*", "-quiet", fx.source.as_str()],
        );
        let b = digest_of(
            &settings,
            &runner,
            &["clang-tidy", fx.source.as_str(), "-quiet", "-checks=*"],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_flags_are_deduplicated() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let a = digest_of(&settings, &runner, &["clang-tidy", "-quiet", fx.source.as_str()]);
        let b = digest_of(
            &settings,
            &runner,
            &["clang-tidy", "-quiet", "-quiet", fx.source.as_str()],
        );
        assert_eq!(a, b);
    }

    // ==========================================================================
    // Sensitivity
    // ==========================================================================

    #[test]
    fn test_source_change_changes_digest() {
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let a = fixture("int x;");
        let b = fixture("int y;");
        assert_ne!(
            digest_of(&settings, &runner, &["clang-tidy", a.source.as_str()]),
            digest_of(&settings, &runner, &["clang-tidy", b.source.as_str()])
        );
    }

    #[test]
    fn test_config_change_changes_digest() {
        let fx = fixture("int x;");
        let settings = HashSettings::default();
        let args = ["clang-tidy", fx.source.as_str()];
        assert_ne!(
            digest_of(&settings, &FakeRunner::new("Checks: 'a'"), &args),
            digest_of(&settings, &FakeRunner::new("Checks: 'b'"), &args)
        );
    }

    #[test]
    fn test_flag_change_changes_digest() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        assert_ne!(
            digest_of(&settings, &runner, &["clang-tidy", "-checks=a", fx.source.as_str()]),
            digest_of(&settings, &runner, &["clang-tidy", "-checks=b", fx.source.as_str()])
        );
    }

    #[test]
    fn test_exclusion_pattern_ignores_flag_value() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings {
            exclude_hash_regex: Some("-header-filter=".to_string()),
            ..HashSettings::default()
        };
        let a = digest_of(
            &settings,
            &runner,
            &["clang-tidy", "-header-filter=src/.*", fx.source.as_str()],
        );
        let b = digest_of(
            &settings,
            &runner,
            &["clang-tidy", "-header-filter=include/.*", fx.source.as_str()],
        );
        let c = digest_of(&settings, &runner, &["clang-tidy", "-checks=x", fx.source.as_str()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_exclusion_pattern_is_anchored() {
        let rules = Rules::compile(&HashSettings {
            exclude_hash_regex: Some("quiet".to_string()),
            ..HashSettings::default()
        })
        .unwrap();
        let args = vec!["-quiet".to_string(), "quiet".to_string()];
        let chunks = rules.chunks(args.iter());
        assert!(chunks.contains("-quiet"));
        assert!(!chunks.contains("quiet"));
    }

    #[test]
    fn test_export_fixes_path_is_ignored() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let plain = digest_of(&settings, &runner, &["clang-tidy", fx.source.as_str()]);
        let separate = digest_of(
            &settings,
            &runner,
            &["clang-tidy", "-export-fixes", "/tmp/a.yaml", fx.source.as_str()],
        );
        let joined = digest_of(
            &settings,
            &runner,
            &["clang-tidy", "--export-fixes=/tmp/b.yaml", fx.source.as_str()],
        );
        assert_eq!(plain, separate);
        assert_eq!(plain, joined);
    }

    // ==========================================================================
    // Normalization details
    // ==========================================================================

    #[test]
    fn test_normalize_argument() {
        let rules = Rules::compile(&HashSettings::default()).unwrap();
        assert_eq!(rules.normalize_argument("  \"-DX=1\"  "), "-DX=1");
        assert_eq!(rules.normalize_argument("-a -b"), "-a-b");
        assert_eq!(rules.normalize_argument("# comment"), "");
        assert_eq!(rules.normalize_argument("   "), "");
    }

    #[test]
    fn test_normalize_resolves_existing_paths() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("inc");
        fs::create_dir_all(&dir).unwrap();
        let rules = Rules::compile(&HashSettings::default()).unwrap();
        let relative_spelling = format!("{}/../inc", dir.display());
        assert_eq!(
            rules.normalize_argument(&relative_spelling),
            fs::canonicalize(&dir).unwrap().to_string_lossy()
        );
    }

    #[test]
    fn test_strip_patterns_make_paths_portable() {
        let rules = Rules::compile(&HashSettings {
            strip_patterns: vec!["/home/[^/]+".to_string()],
            ..HashSettings::default()
        })
        .unwrap();
        assert_eq!(
            rules.normalize_argument("-I/home/alice/proj/include"),
            "-I/proj/include"
        );
    }

    #[test]
    fn test_strip_src_applies_to_content() {
        let on = Rules::compile(&HashSettings {
            strip_patterns: vec!["/build/[a-z]+".to_string()],
            strip_src: true,
            ..HashSettings::default()
        })
        .unwrap();
        assert_eq!(
            on.strip_content(b"#line 1 \"/build/abc/x.h\"".to_vec()),
            b"#line 1 \"/x.h\"".to_vec()
        );

        let off = Rules::compile(&HashSettings {
            strip_patterns: vec!["/build/[a-z]+".to_string()],
            ..HashSettings::default()
        })
        .unwrap();
        assert_eq!(off.strip_content(b"/build/abc".to_vec()), b"/build/abc".to_vec());
    }

    #[test]
    fn test_user_config_lines_are_dropped() {
        let rules = Rules::compile(&HashSettings {
            exclude_user_config: true,
            ..HashSettings::default()
        })
        .unwrap();
        let dump = b"Checks: '*'\nUser: alice\nHeaderFilterRegex: '.*'\nWarningsAsErrors: ''".to_vec();
        assert_eq!(
            rules.filter_config(dump),
            b"Checks: '*'\nWarningsAsErrors: ''".to_vec()
        );
    }

    #[test]
    fn test_invalid_pattern_is_a_configuration_error() {
        let settings = HashSettings {
            strip_patterns: vec!["(".to_string()],
            ..HashSettings::default()
        };
        assert!(matches!(
            Rules::compile(&settings),
            Err(Error::Configuration { .. })
        ));
    }

    // ==========================================================================
    // Subprocess handling
    // ==========================================================================

    #[test]
    fn test_no_arguments_means_no_digest() {
        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let result = Fingerprinter::new(&settings, &runner)
            .compute(&invocation(&["clang-tidy"]))
            .unwrap();
        assert!(result.is_none());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_dump_config_runs_per_source_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        let b = tmp.path().join("b.cpp");
        let a = tmp.path().join("a.cpp");
        fs::write(&a, "int a;").unwrap();
        fs::write(&b, "int b;").unwrap();

        let runner = FakeRunner::new("Checks: '*'");
        let settings = HashSettings::default();
        let b = b.display().to_string();
        let a = a.display().to_string();
        digest_of(&settings, &runner, &["clang-tidy", "-quiet", &b, &a]);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].last().unwrap().ends_with("a.cpp"));
        assert!(calls[1].last().unwrap().ends_with("b.cpp"));
        assert_eq!(calls[0][..3], ["clang-tidy", "-quiet", "--dump-config"]);
    }

    #[test]
    fn test_failed_dump_config_is_an_error() {
        let fx = fixture("int x;");
        let runner = FakeRunner::new("");
        let settings = HashSettings::default();
        let result = Fingerprinter::new(&settings, &runner)
            .compute(&invocation(&["clang-tidy", fx.source.as_str()]));
        assert!(matches!(result, Err(Error::Command { .. })));
    }

    #[test]
    fn test_compiler_stderr_is_an_error() {
        let mut runner = FakeRunner::new("Checks: '*'");
        runner.preprocessed.stderr = b"warning: something".to_vec();
        let settings = HashSettings::default();
        let result = Fingerprinter::new(&settings, &runner)
            .compute(&invocation(&["clang-tidy", "--", "g++", "-c", "x.cpp"]));
        assert!(matches!(result, Err(Error::Command { .. })));
    }

    #[test]
    fn test_msvc_stderr_is_tolerated() {
        let mut runner = FakeRunner::new("Checks: '*'");
        runner.preprocessed.stderr = b"x.cpp".to_vec();
        let settings = HashSettings::default();
        let result = Fingerprinter::new(&settings, &runner)
            .compute(&invocation(&["clang-tidy", "--", "cl.exe", "-c", "x.cpp"]))
            .unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn test_compiler_failure_is_an_error() {
        let mut runner = FakeRunner::new("Checks: '*'");
        runner.preprocessed.code = Some(1);
        let settings = HashSettings::default();
        let result = Fingerprinter::new(&settings, &runner)
            .compute(&invocation(&["clang-tidy", "--", "cl.exe", "-c", "x.cpp"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_preprocessed_output_feeds_digest() {
        let settings = HashSettings::default();
        let args = ["clang-tidy", "--", "g++", "-c", "x.cpp"];
        let a = FakeRunner::new("Checks: '*'");
        let mut b = FakeRunner::new("Checks: '*'");
        b.preprocessed.stdout = b"int other;".to_vec();
        assert_ne!(
            digest_of(&settings, &a, &args),
            digest_of(&settings, &b, &args)
        );
    }

    #[test]
    fn test_dump_file_receives_hashed_bytes() {
        let fx = fixture("int dumped;");
        let tmp = TempDir::new().unwrap();
        let dump = tmp.path().join("ctcache.dump");
        let runner = FakeRunner::new("Checks: 'dumped'");
        let settings = HashSettings::default();
        Fingerprinter::new(&settings, &runner)
            .with_dump(&dump)
            .compute(&invocation(&["clang-tidy", fx.source.as_str()]))
            .unwrap();

        let contents = fs::read_to_string(&dump).unwrap();
        assert!(contents.contains("int dumped;"));
        assert!(contents.contains("Checks: 'dumped'"));
    }

    #[test]
    fn test_omit_output_paths() {
        let args: Vec<String> = ["tidy", "-export-fixes", "f.yaml", "-quiet", "--export-fixes=g"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert_eq!(omit_output_paths(&args), vec!["tidy", "-quiet"]);
    }

    proptest! {
        #[test]
        fn prop_digest_is_order_independent(
            flags in proptest::collection::vec("-[a-z]{1,8}(=[a-z0-9]{1,4})?", 1..6),
            seed in any::<u64>(),
        ) {
            let fx = fixture("int x;");
            let runner = FakeRunner::new("Checks: '*'");
            let settings = HashSettings::default();

            let mut forward: Vec<&str> = vec!["clang-tidy"];
            forward.extend(flags.iter().map(String::as_str));
            forward.push(fx.source.as_str());

            let mut shuffled: Vec<&str> = flags.iter().map(String::as_str).collect();
            let len = shuffled.len();
            shuffled.rotate_left(usize::try_from(seed % len as u64).unwrap());
            shuffled.reverse();
            let mut reordered = vec!["clang-tidy", fx.source.as_str()];
            reordered.extend(shuffled);

            prop_assert_eq!(
                digest_of(&settings, &runner, &forward),
                digest_of(&settings, &runner, &reordered)
            );
        }
    }
}
