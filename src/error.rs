// src/error.rs

//! Error types for the recipe pipeline
//!
//! Every failure aborts the remaining pipeline. Each variant knows which
//! pipeline stage produced it and which process exit code the CLI should
//! use for it, so scripts can tell a checksum mismatch from a broken build.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Fetch,
    Resolve,
    Install,
    Test,
    /// Not tied to a single stage (I/O setup, locking)
    Setup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Fetch => "fetch",
            Stage::Resolve => "resolve",
            Stage::Install => "install",
            Stage::Test => "test",
            Stage::Setup => "setup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while loading, fetching, building, installing or testing a recipe
#[derive(Error, Debug)]
pub enum Error {
    /// Recipe is syntactically invalid or misses a required field
    #[error("Malformed recipe: {0}")]
    MalformedRecipe(String),

    /// Install or test step uses an action this engine does not know
    #[error("Unsupported directive `{directive}` in {section} step {index}")]
    UnsupportedDirective {
        section: String,
        index: usize,
        directive: String,
    },

    /// No usable source, or archive and head disagree on the version
    #[error("Ambiguous provenance: {0}")]
    AmbiguousProvenance(String),

    /// Source could not be retrieved
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Downloaded archive does not hash to the declared checksum
    #[error("Checksum mismatch: expected sha256:{expected}, got sha256:{actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Recipe declares no checksum and verification is mandatory
    #[error("Recipe {name} declares no sha256 checksum and unverified sources are not allowed")]
    ChecksumRequired { name: String },

    /// Declared dependencies are not available
    #[error("Missing dependencies: {}", missing.join(", "))]
    DependencyMissing { missing: Vec<String> },

    /// A build command exited unsuccessfully or timed out
    #[error("{}", describe_build_failure(step, *exit_code, *timed_out))]
    BuildFailed {
        step: String,
        exit_code: Option<i32>,
        timed_out: bool,
        /// Tail of the combined stdout/stderr of the failing step
        output: String,
    },

    /// Expected build artifact is absent after the build steps ran
    #[error("Build artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// Smoke test output lacks the expected substring
    #[error("Test `{command}` failed: expected output containing {expected:?}, got {actual:?}")]
    TestAssertionFailed {
        command: String,
        expected: String,
        actual: String,
    },

    /// Another install holds the destination bin directory
    #[error("Bin directory {} is locked by another install", path.display())]
    Locked { path: PathBuf },

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Raw I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe_build_failure(step: &str, exit_code: Option<i32>, timed_out: bool) -> String {
    if timed_out {
        format!("Build step `{}` timed out", step)
    } else {
        match exit_code {
            Some(code) => format!("Build step `{}` failed with exit code {}", step, code),
            None => format!("Build step `{}` was terminated by a signal", step),
        }
    }
}

impl Error {
    /// Pipeline stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Error::MalformedRecipe(_)
            | Error::UnsupportedDirective { .. }
            | Error::AmbiguousProvenance(_) => Stage::Load,
            Error::FetchFailed { .. }
            | Error::ChecksumMismatch { .. }
            | Error::ChecksumRequired { .. } => Stage::Fetch,
            Error::DependencyMissing { .. } => Stage::Resolve,
            Error::BuildFailed { .. } | Error::ArtifactNotFound { .. } => Stage::Install,
            Error::TestAssertionFailed { .. } => Stage::Test,
            Error::Locked { .. } | Error::IoError(_) | Error::Io(_) => Stage::Setup,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedRecipe(_) => 10,
            Error::UnsupportedDirective { .. } => 11,
            Error::AmbiguousProvenance(_) => 12,
            Error::FetchFailed { .. } => 20,
            Error::ChecksumMismatch { .. } => 21,
            Error::ChecksumRequired { .. } => 22,
            Error::DependencyMissing { .. } => 30,
            Error::BuildFailed { .. } => 40,
            Error::ArtifactNotFound { .. } => 41,
            Error::TestAssertionFailed { .. } => 50,
            Error::Locked { .. } => 60,
            Error::IoError(_) | Error::Io(_) => 1,
        }
    }
}

/// Result type for pantry operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            Error::MalformedRecipe("x".into()),
            Error::UnsupportedDirective {
                section: "install".into(),
                index: 0,
                directive: "patch".into(),
            },
            Error::AmbiguousProvenance("x".into()),
            Error::FetchFailed {
                url: "u".into(),
                reason: "r".into(),
            },
            Error::ChecksumMismatch {
                expected: "a".into(),
                actual: "b".into(),
            },
            Error::ChecksumRequired { name: "n".into() },
            Error::DependencyMissing {
                missing: vec!["curl".into()],
            },
            Error::BuildFailed {
                step: "make".into(),
                exit_code: Some(2),
                timed_out: false,
                output: String::new(),
            },
            Error::ArtifactNotFound {
                path: PathBuf::from("quote"),
            },
            Error::TestAssertionFailed {
                command: "c".into(),
                expected: "e".into(),
                actual: "a".into(),
            },
            Error::Locked {
                path: PathBuf::from("/bin"),
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_build_failed_message() {
        let err = Error::BuildFailed {
            step: "make".into(),
            exit_code: Some(2),
            timed_out: false,
            output: "boom".into(),
        };
        assert_eq!(err.to_string(), "Build step `make` failed with exit code 2");
        assert_eq!(err.stage(), Stage::Install);

        let err = Error::BuildFailed {
            step: "make".into(),
            exit_code: None,
            timed_out: true,
            output: String::new(),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_stages() {
        assert_eq!(
            Error::ChecksumMismatch {
                expected: "a".into(),
                actual: "b".into()
            }
            .stage(),
            Stage::Fetch
        );
        assert_eq!(Error::MalformedRecipe("x".into()).stage(), Stage::Load);
        assert_eq!(Stage::Test.to_string(), "test");
    }
}
