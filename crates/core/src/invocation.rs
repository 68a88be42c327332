//! Command line splitting
//!
//! The wrapper is called as `tidycache <tool> [tool-options] [-- <compiler command>]`.
//! An [`Invocation`] separates the tool's own arguments from the compiler command
//! used to preprocess the translation unit, and rewrites that compiler command
//! so it emits preprocessed source on stdout instead of an object file.

use crate::compile_db::CompileDb;
use crate::{Error, Result};
use std::path::Path;

/// Extensions (lowercase, without dot) treated as source files.
pub const SOURCE_EXTENSIONS: &[&str] = &["cppm", "cpp", "c", "cc", "h", "hpp", "cxx"];

/// Macro defined while preprocessing, matching what the analyzer itself sees.
pub const ANALYZER_DEFINE: &str = "-D__clang_analyzer__=1";

/// Whether `path` names a source file by extension.
#[must_use]
pub fn is_source_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// A parsed wrapper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    original: Vec<String>,
    tool_args: Vec<String>,
    compiler_args: Vec<String>,
}

impl Invocation {
    /// Split the wrapper's arguments (starting with the real tool's path).
    ///
    /// With exactly one `--`, everything after it is the compiler command.
    /// Otherwise, with exactly one `-p <dir>`, the compiler command is looked
    /// up in the compilation database. A database that cannot be read leaves
    /// the invocation without compiler arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invocation`] if `args` is empty.
    pub fn parse(args: Vec<String>, keep_comments: bool) -> Result<Self> {
        if args.is_empty() {
            return Err(Error::invocation("missing path to the real tool"));
        }

        let split: Vec<String> = args
            .iter()
            .flat_map(|arg| match arg.strip_prefix("-p=") {
                Some(dir) => vec!["-p".to_string(), dir.to_string()],
                None => vec![arg.clone()],
            })
            .collect();

        let separators = split.iter().filter(|a| *a == "--").count();
        let build_paths = split.iter().filter(|a| *a == "-p").count();

        let (tool_args, compiler_args) = if separators == 1 {
            let at = split.iter().position(|a| a == "--").unwrap_or(split.len());
            (split[..at].to_vec(), split[at + 1..].to_vec())
        } else if build_paths == 1 {
            let compiler_args = compile_db_args(&split);
            (split, compiler_args)
        } else {
            (split, Vec::new())
        };

        let compiler_args = adjust_compiler_args(compiler_args, keep_comments);

        Ok(Self {
            original: args,
            tool_args,
            compiler_args,
        })
    }

    /// Arguments exactly as given, used to run the real tool.
    #[must_use]
    pub fn original_args(&self) -> &[String] {
        &self.original
    }

    /// Tool path followed by the tool's own options.
    #[must_use]
    pub fn tool_args(&self) -> &[String] {
        &self.tool_args
    }

    /// Preprocessing command, empty when no compiler command is known.
    #[must_use]
    pub fn compiler_args(&self) -> &[String] {
        &self.compiler_args
    }

    /// Whether the compiler is MSVC or clang-cl, which report diagnostics on
    /// stderr even on success.
    #[must_use]
    pub fn is_msvc_style(&self) -> bool {
        self.compiler_args
            .first()
            .is_some_and(|compiler| is_msvc_style(compiler))
    }

    /// Tool arguments naming existing source files.
    #[must_use]
    pub fn source_files(&self) -> Vec<&str> {
        self.tool_args
            .iter()
            .skip(1)
            .map(String::as_str)
            .filter(|arg| is_source_file(arg) && Path::new(arg).is_file())
            .collect()
    }
}

fn is_msvc_style(compiler: &str) -> bool {
    Path::new(compiler)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            let name = name.to_ascii_lowercase();
            name == "cl.exe" || name == "clang-cl.exe"
        })
}

/// Compiler command for the analyzed file from the `-p` database.
fn compile_db_args(args: &[String]) -> Vec<String> {
    let Some(at) = args.iter().position(|a| a == "-p") else {
        return Vec::new();
    };
    let Some(location) = args.get(at + 1) else {
        return Vec::new();
    };

    let db = match CompileDb::load(Path::new(location)) {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!(location = %location, error = %e, "Loading compilation database failed");
            return Vec::new();
        }
    };

    // The analyzed file normally follows `-p <dir>`; fall back to any earlier
    // positional argument.
    let after = args[at + 2..].iter();
    let before = args.get(1..at).unwrap_or_default().iter();
    let Some(source) = after.chain(before).find(|a| !a.starts_with('-')) else {
        return Vec::new();
    };

    match db.find(Path::new(source)).map(|entry| entry.argv()) {
        Some(Ok(argv)) => argv,
        Some(Err(e)) => {
            tracing::warn!(file = %source, error = %e, "Unusable compilation database entry");
            Vec::new()
        }
        None => {
            tracing::debug!(file = %source, "No compilation database entry");
            Vec::new()
        }
    }
}

/// Rewrite a compile command into a preprocess-to-stdout command.
fn adjust_compiler_args(args: Vec<String>, keep_comments: bool) -> Vec<String> {
    if args.is_empty() {
        return args;
    }
    let msvc = is_msvc_style(&args[0]);

    let mut args = args;
    let define_at = args
        .iter()
        .position(|a| a.starts_with("-D"))
        .unwrap_or(1)
        .min(args.len());
    args.insert(define_at, ANALYZER_DEFINE.to_string());

    let mut adjusted = Vec::with_capacity(args.len() + 2);
    let mut replace_output = false;
    for (i, arg) in args.into_iter().enumerate() {
        if replace_output {
            adjusted.push("-".to_string());
            replace_output = false;
            continue;
        }
        match arg.as_str() {
            "-o" | "--output" => {
                replace_output = true;
                adjusted.push(arg);
            }
            "-c" | "-E" if i > 0 => {
                if msvc {
                    adjusted.push("-EP".to_string());
                } else {
                    adjusted.push("-E".to_string());
                    adjusted.push("-P".to_string());
                }
                if keep_comments {
                    adjusted.push("-C".to_string());
                }
            }
            _ => adjusted.push(arg),
        }
    }
    adjusted
}
