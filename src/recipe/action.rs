// src/recipe/action.rs

//! Action descriptors for install and test steps
//!
//! Steps are data, not code: a recipe can only ask the engine to run a
//! shell command, place a built executable, or check a command's output.
//! Anything else is rejected at load time with `UnsupportedDirective`.
//!
//! Accepted TOML shapes:
//!
//! ```toml
//! install = [
//!     "make",                               # RunCommand
//!     { run = "make check" },               # RunCommand
//!     { bin = "quote" },                    # CopyArtifact
//!     { bin = "build/quote", as = "qt" },   # CopyArtifact with rename
//! ]
//! test = [
//!     { run = "%(bin)s/quote --help", expect = "Usage:" },
//!     ["%(bin)s/quote --version", "0.0.3"],
//! ]
//! ```

use crate::error::{Error, Result};
use crate::recipe::format::is_contained;
use serde::Serialize;
use std::path::Path;

/// A single interpreted step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Run a shell command in the build tree
    RunCommand { command: String },
    /// Place a built executable (relative to the build tree) into the bin directory
    CopyArtifact {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
    /// Run a command and require its combined output to contain `expected`
    AssertOutputContains { command: String, expected: String },
}

impl Action {
    /// Short label used in logs and error reports
    pub fn label(&self) -> String {
        match self {
            Action::RunCommand { command } => command.clone(),
            Action::CopyArtifact { path, .. } => format!("bin.install {}", path),
            Action::AssertOutputContains { command, .. } => command.clone(),
        }
    }

    /// File name the artifact gets in the bin directory
    pub fn installed_name(&self) -> Option<String> {
        match self {
            Action::CopyArtifact { path, rename } => rename.clone().or_else(|| {
                Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            }),
            _ => None,
        }
    }
}

/// Which step list an action was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Install,
    Test,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Install => "install",
            Section::Test => "test",
        }
    }
}

fn unsupported(section: Section, index: usize, directive: &str) -> Error {
    Error::UnsupportedDirective {
        section: section.as_str().to_string(),
        index,
        directive: directive.to_string(),
    }
}

fn malformed(section: Section, index: usize, msg: &str) -> Error {
    Error::MalformedRecipe(format!("{} step {}: {}", section.as_str(), index, msg))
}

fn string_field(
    table: &toml::Table,
    key: &str,
    section: Section,
    index: usize,
) -> Result<Option<String>> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
        Some(toml::Value::String(_)) => Err(malformed(section, index, &format!("`{}` is empty", key))),
        Some(_) => Err(malformed(section, index, &format!("`{}` must be a string", key))),
    }
}

/// Parse one entry of the `install` list
pub fn parse_install_step(value: &toml::Value, index: usize) -> Result<Action> {
    const SECTION: Section = Section::Install;

    match value {
        toml::Value::String(command) if !command.trim().is_empty() => Ok(Action::RunCommand {
            command: command.clone(),
        }),
        toml::Value::String(_) => Err(malformed(SECTION, index, "empty command")),
        toml::Value::Table(table) => {
            if let Some(key) = table
                .keys()
                .find(|k| !matches!(k.as_str(), "run" | "bin" | "as"))
            {
                return Err(unsupported(SECTION, index, key));
            }

            let run = string_field(table, "run", SECTION, index)?;
            let bin = string_field(table, "bin", SECTION, index)?;
            let rename = string_field(table, "as", SECTION, index)?;

            match (run, bin) {
                (Some(command), None) if rename.is_none() => Ok(Action::RunCommand { command }),
                (Some(_), None) => Err(malformed(SECTION, index, "`as` only applies to `bin`")),
                (None, Some(path)) => {
                    if !is_contained(&path) {
                        return Err(malformed(
                            SECTION,
                            index,
                            "`bin` must be a path inside the build tree",
                        ));
                    }
                    if rename.as_deref().is_some_and(|r| r.contains('/')) {
                        return Err(malformed(SECTION, index, "`as` must be a plain file name"));
                    }
                    Ok(Action::CopyArtifact { path, rename })
                }
                (Some(_), Some(_)) => Err(malformed(
                    SECTION,
                    index,
                    "a step must declare exactly one of `run` or `bin`",
                )),
                (None, None) => Err(malformed(SECTION, index, "step declares no action")),
            }
        }
        _ => Err(malformed(SECTION, index, "expected a command string or a table")),
    }
}

/// Parse one entry of the `test` list
pub fn parse_test_step(value: &toml::Value, index: usize) -> Result<Action> {
    const SECTION: Section = Section::Test;

    match value {
        toml::Value::Table(table) => {
            if let Some(key) = table.keys().find(|k| !matches!(k.as_str(), "run" | "expect")) {
                return Err(unsupported(SECTION, index, key));
            }

            let command = string_field(table, "run", SECTION, index)?
                .ok_or_else(|| malformed(SECTION, index, "missing `run`"))?;
            let expected = string_field(table, "expect", SECTION, index)?
                .ok_or_else(|| malformed(SECTION, index, "missing `expect`"))?;

            Ok(Action::AssertOutputContains { command, expected })
        }
        toml::Value::Array(pair) => match pair.as_slice() {
            [toml::Value::String(command), toml::Value::String(expected)]
                if !command.trim().is_empty() && !expected.is_empty() =>
            {
                Ok(Action::AssertOutputContains {
                    command: command.clone(),
                    expected: expected.clone(),
                })
            }
            _ => Err(malformed(
                SECTION,
                index,
                "expected a [command, expected-substring] pair",
            )),
        },
        _ => Err(malformed(
            SECTION,
            index,
            "expected a { run, expect } table or a [command, expected] pair",
        )),
    }
}
