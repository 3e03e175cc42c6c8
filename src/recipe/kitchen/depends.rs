// src/recipe/kitchen/depends.rs

//! Dependency resolution for recipe builds

use crate::error::Result;
use std::path::PathBuf;

/// Trait for checking and providing a recipe's `depends_on` list
///
/// This keeps the Kitchen decoupled from whatever actually provides tools
/// (a package manager, a container image, the host PATH).
pub trait DependencyResolver: Send + Sync {
    /// Return the dependencies that are not currently available
    fn check_missing(&self, deps: &[&str]) -> Result<Vec<String>>;

    /// Try to provide the given dependencies
    ///
    /// Returns the ones that were actually provided. Resolvers that cannot
    /// install anything keep the default.
    fn install(&self, _deps: &[String]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// A no-op resolver that assumes all dependencies are satisfied
///
/// Use this when the environment is known to be prepared (e.g. a build
/// container), or with `--no-deps`.
pub struct NoopResolver;

impl DependencyResolver for NoopResolver {
    fn check_missing(&self, _deps: &[&str]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Resolver that looks each dependency up as an executable on PATH
///
/// Extra directories are searched before the process PATH, matching the
/// PATH that install steps will see.
#[derive(Debug, Default)]
pub struct PathResolver {
    extra_paths: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search these directories before PATH
    pub fn with_paths(extra_paths: Vec<PathBuf>) -> Self {
        Self { extra_paths }
    }

    fn search_path(&self) -> Option<std::ffi::OsString> {
        let mut dirs = self.extra_paths.clone();
        if let Some(path) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&path));
        }
        std::env::join_paths(dirs).ok()
    }
}

impl DependencyResolver for PathResolver {
    fn check_missing(&self, deps: &[&str]) -> Result<Vec<String>> {
        let search = self.search_path();
        let cwd = std::env::current_dir()?;

        Ok(deps
            .iter()
            .filter(|dep| which::which_in(dep, search.as_ref(), &cwd).is_err())
            .map(|dep| dep.to_string())
            .collect())
    }
}

/// Outcome of dependency resolution
#[derive(Debug, Default, Clone)]
pub struct DependsResult {
    /// Dependencies that were already available
    pub already_present: Vec<String>,
    /// Dependencies the resolver provided for this build
    pub newly_installed: Vec<String>,
    /// Dependencies that could not be provided
    pub unresolved: Vec<String>,
}
