//! Fingerprinting through a compilation database
// Integration tests can use unwrap/expect for cleaner assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;
use tidycache_core::config::HashSettings;
use tidycache_core::invocation::ANALYZER_DEFINE;
use tidycache_core::{CommandOutput, CommandRunner, Digest, Fingerprinter, Invocation, Settings};

/// Plays both the compiler (preprocessing) and clang-tidy (`--dump-config`).
struct Toolchain {
    preprocessed: String,
    preprocessor_stderr: String,
    calls: Mutex<Vec<Vec<String>>>,
}

impl Toolchain {
    fn new(preprocessed: &str) -> Self {
        Self {
            preprocessed: preprocessed.to_string(),
            preprocessor_stderr: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn compiler_calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|argv| argv[0] == "clang++")
            .cloned()
            .collect()
    }
}

impl CommandRunner for Toolchain {
    fn run(&self, argv: &[String]) -> tidycache_core::Result<CommandOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());
        if argv.iter().any(|a| a == "--dump-config") {
            return Ok(CommandOutput {
                code: Some(0),
                stdout: b"Checks: 'modernize-*'\n".to_vec(),
                stderr: Vec::new(),
            });
        }
        Ok(CommandOutput {
            code: Some(0),
            stdout: self.preprocessed.clone().into_bytes(),
            stderr: self.preprocessor_stderr.clone().into_bytes(),
        })
    }
}

struct Project {
    tmp: TempDir,
}

impl Project {
    fn new(defines: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let build = tmp.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(tmp.path().join("engine.cpp"), "int engine() { return 0; }\n").unwrap();

        let mut arguments = vec!["clang++".to_string()];
        arguments.extend(defines.iter().map(|d| (*d).to_string()));
        arguments.extend(
            ["-c", "engine.cpp", "-o", "engine.o"]
                .iter()
                .map(|s| (*s).to_string()),
        );
        let db = json!([{
            "directory": tmp.path(),
            "file": "engine.cpp",
            "arguments": arguments,
        }]);
        fs::write(build.join("compile_commands.json"), db.to_string()).unwrap();
        Self { tmp }
    }

    fn invocation(&self) -> Invocation {
        let args = vec![
            "clang-tidy".to_string(),
            "-p".to_string(),
            self.tmp.path().join("build").to_string_lossy().into_owned(),
            self.tmp.path().join("engine.cpp").to_string_lossy().into_owned(),
        ];
        Invocation::parse(args, false).unwrap()
    }
}

fn digest(settings: &HashSettings, tools: &Toolchain, invocation: &Invocation) -> Option<Digest> {
    Fingerprinter::new(settings, tools).compute(invocation).unwrap()
}

#[test]
fn test_compiler_command_comes_from_database() {
    let project = Project::new(&["-DNDEBUG"]);
    let invocation = project.invocation();
    let tools = Toolchain::new("int engine() { return 0; }");

    assert!(digest(&HashSettings::default(), &tools, &invocation).is_some());

    let calls = tools.compiler_calls();
    assert_eq!(calls.len(), 1);
    let argv = &calls[0];
    assert!(argv.contains(&ANALYZER_DEFINE.to_string()));
    assert!(argv.contains(&"-E".to_string()));
    assert!(!argv.contains(&"-c".to_string()));
    let out = argv.iter().position(|a| a == "-o").unwrap();
    assert_eq!(argv[out + 1], "-");
}

#[test]
fn test_preprocessed_output_drives_the_digest() {
    let project = Project::new(&[]);
    let invocation = project.invocation();
    let settings = HashSettings::default();

    let a = digest(&settings, &Toolchain::new("int engine() { return 0; }"), &invocation);
    // Editing the file without changing the preprocessed result keeps the digest
    fs::write(project.tmp.path().join("engine.cpp"), "// comment\nint engine() { return 0; }\n").unwrap();
    let b = digest(&settings, &Toolchain::new("int engine() { return 0; }"), &invocation);
    let c = digest(&settings, &Toolchain::new("int engine() { return 1; }"), &invocation);

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_preprocessor_diagnostics_prevent_caching() {
    let project = Project::new(&[]);
    let tools = Toolchain {
        preprocessor_stderr: "engine.cpp:1:1: warning: deprecated\n".to_string(),
        ..Toolchain::new("int engine();")
    };
    let result = Fingerprinter::new(&HashSettings::default(), &tools).compute(&project.invocation());
    assert!(result.is_err());
}

#[test]
fn test_excluded_define_from_environment() {
    let settings = temp_env::with_vars(
        [
            ("CTCACHE_EXCLUDE_HASH_REGEX", Some("-DBUILD_ID=")),
            ("CTCACHE_STRIP", None),
        ],
        Settings::from_env,
    );
    let tools = Toolchain::new("int engine();");

    let first = Project::new(&["-DBUILD_ID=1001"]);
    let second = Project::new(&["-DBUILD_ID=1002"]);
    let third = Project::new(&["-DFEATURE=1"]);

    // Paths differ between projects, so strip the temp roots as well
    let strip = |project: &Project| HashSettings {
        strip_patterns: vec![regex::escape(&project.tmp.path().canonicalize().unwrap().to_string_lossy())],
        ..settings.hashing.clone()
    };

    let a = digest(&strip(&first), &tools, &first.invocation());
    let b = digest(&strip(&second), &tools, &second.invocation());
    let c = digest(&strip(&third), &tools, &third.invocation());
    assert_eq!(a, b);
    assert_ne!(a, c);
}
