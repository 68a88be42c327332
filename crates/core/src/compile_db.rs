//! JSON compilation database lookup
//!
//! Maps a source file to the compiler command that builds it, using the
//! `compile_commands.json` format emitted by CMake, Meson and Bear.

use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up inside a `-p` directory.
pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

/// One entry of a compilation database.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CompileCommand {
    /// Working directory of the compilation
    pub directory: PathBuf,
    /// Source file, absolute or relative to `directory`
    pub file: PathBuf,
    /// Shell-quoted command line
    #[serde(default)]
    pub command: Option<String>,
    /// Pre-split command line
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl CompileCommand {
    /// Source path resolved against the entry's directory.
    #[must_use]
    pub fn resolved_file(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }

    /// Compiler command line as separate arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when neither `arguments` nor a shell-splittable
    /// `command` is present.
    pub fn argv(&self) -> Result<Vec<String>> {
        if let Some(arguments) = self.arguments.as_ref().filter(|a| !a.is_empty()) {
            return Ok(arguments.clone());
        }
        let command = self.command.as_deref().ok_or_else(|| {
            Error::compile_db(format!(
                "entry for {} has neither 'arguments' nor 'command'",
                self.file.display()
            ))
        })?;
        shlex::split(command).ok_or_else(|| {
            Error::compile_db(format!("cannot split command for {}", self.file.display()))
        })
    }
}

/// A loaded compilation database.
#[derive(Debug, Clone, Default)]
pub struct CompileDb {
    entries: Vec<CompileCommand>,
}

impl CompileDb {
    /// Load the database named by a `-p` argument: either the JSON file itself
    /// or a directory containing [`COMPILE_COMMANDS_FILE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(location: &Path) -> Result<Self> {
        let path = if location.is_dir() {
            location.join(COMPILE_COMMANDS_FILE)
        } else {
            location.to_path_buf()
        };
        let contents = fs::read_to_string(&path).map_err(|e| Error::io(e, &path, "read"))?;
        Self::from_json(&contents)
    }

    /// Parse database contents.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON.
    pub fn from_json(contents: &str) -> Result<Self> {
        let entries = serde_json::from_str(contents)
            .map_err(|e| Error::compile_db(format!("invalid JSON: {e}")))?;
        Ok(Self { entries })
    }

    /// All entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[CompileCommand] {
        &self.entries
    }

    /// First entry that builds `source`.
    ///
    /// Paths are compared after canonicalization so symlinks and relative
    /// spellings match; entries whose file no longer exists fall back to a
    /// lexical comparison.
    #[must_use]
    pub fn find(&self, source: &Path) -> Option<&CompileCommand> {
        let wanted = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
        self.entries.iter().find(|entry| {
            let file = entry.resolved_file();
            fs::canonicalize(&file).map_or(file == wanted, |canonical| canonical == wanted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_argv_prefers_arguments() {
        let entry = CompileCommand {
            directory: PathBuf::from("/build"),
            file: PathBuf::from("a.cpp"),
            command: Some("gcc -c a.cpp".to_string()),
            arguments: Some(vec!["clang++".to_string(), "-c".to_string()]),
        };
        assert_eq!(entry.argv().unwrap(), vec!["clang++", "-c"]);
    }

    #[test]
    fn test_argv_splits_command_with_quotes() {
        let entry = CompileCommand {
            directory: PathBuf::from("/build"),
            file: PathBuf::from("a.cpp"),
            command: Some(r#"g++ -DNAME="a b" -c a.cpp"#.to_string()),
            arguments: None,
        };
        assert_eq!(entry.argv().unwrap(), vec!["g++", "-DNAME=a b", "-c", "a.cpp"]);
    }

    #[test]
    fn test_argv_without_command_fails() {
        let entry = CompileCommand {
            directory: PathBuf::from("/build"),
            file: PathBuf::from("a.cpp"),
            command: None,
            arguments: None,
        };
        assert!(entry.argv().is_err());
    }

    #[test]
    fn test_find_resolves_relative_file_against_directory() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.cpp"), "int main() {}").unwrap();

        let json = serde_json::json!([
            {
                "directory": tmp.path().join("other"),
                "file": "other.cpp",
                "command": "c++ -c other.cpp"
            },
            {
                "directory": &src,
                "file": "main.cpp",
                "command": "c++ -c main.cpp -o main.o"
            }
        ]);
        fs::write(tmp.path().join(COMPILE_COMMANDS_FILE), json.to_string()).unwrap();

        let db = CompileDb::load(tmp.path()).unwrap();
        assert_eq!(db.entries().len(), 2);

        let entry = db.find(&src.join("main.cpp")).unwrap();
        assert_eq!(entry.argv().unwrap()[2], "main.cpp");
        assert!(db.find(&tmp.path().join("missing.cpp")).is_none());
    }

    #[test]
    fn test_load_accepts_file_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.json");
        fs::write(&path, "[]").unwrap();
        assert!(CompileDb::load(&path).unwrap().entries().is_empty());
    }

    #[test]
    fn test_malformed_database() {
        assert!(matches!(
            CompileDb::from_json("{not json"),
            Err(Error::CompileDb { .. })
        ));
    }
}
