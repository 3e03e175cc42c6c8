// src/recipe/kitchen/smoke.rs

//! Smoke tests: run installed executables and check what they print

use crate::error::{Error, Result};
use crate::recipe::action::{Action, Section};
use crate::recipe::format::{BuildVars, Recipe};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

use super::process::run_shell;

/// Runs a recipe's `test` assertions against a bin directory
///
/// Only the combined output matters: `quote --help` may well exit non-zero
/// and still pass, as long as it prints what the recipe expects.
pub struct SmokeTester {
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl SmokeTester {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            env: Vec::new(),
        }
    }

    /// Extra environment for the test commands
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Run every assertion in order, stopping at the first mismatch
    ///
    /// Returns the number of assertions that passed. Commands run in a
    /// scratch directory so they cannot leave files in `bin_dir`.
    pub fn run(&self, recipe: &Recipe, bin_dir: &Path, vars: &BuildVars) -> Result<usize> {
        debug!("Smoke testing {} against {}", recipe.name, bin_dir.display());
        let scratch = TempDir::new()
            .map_err(|e| Error::IoError(format!("Failed to create test directory: {}", e)))?;
        let mut passed = 0;

        for (index, action) in recipe.test.iter().enumerate() {
            let Action::AssertOutputContains { command, expected } = action else {
                return Err(Error::UnsupportedDirective {
                    section: Section::Test.as_str().to_string(),
                    index,
                    directive: action.label(),
                });
            };

            let command = recipe.substitute(command, vars);
            let expected = recipe.substitute(expected, vars);
            info!("Testing: {}", command);

            let out = run_shell(&command, scratch.path(), &self.env, self.timeout)?;
            if out.timed_out() {
                return Err(Error::TestAssertionFailed {
                    command,
                    expected,
                    actual: format!(
                        "(timed out after {}s) {}",
                        self.timeout.as_secs(),
                        out.output.trim_end()
                    )
                    .trim_end()
                    .to_string(),
                });
            }

            if !out.output.contains(&expected) {
                return Err(Error::TestAssertionFailed {
                    command,
                    expected,
                    actual: out.output.trim_end().to_string(),
                });
            }

            debug!("Output of `{}` contains {:?}", command, expected);
            passed += 1;
        }

        Ok(passed)
    }
}
