// src/recipe/kitchen/config.rs

//! Configuration and result types for the Kitchen

use crate::recipe::format::{BuildMode, Provenance};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Directory for downloaded, verified source archives
    pub source_cache: PathBuf,
    /// Parent directory for temporary build trees
    pub build_root: PathBuf,
    /// Directory holding per-bin-directory lock files
    pub lock_dir: PathBuf,
    /// Timeout for each install step
    pub timeout: Duration,
    /// Timeout for each smoke-test command
    pub test_timeout: Duration,
    /// Number of parallel jobs (exported as MAKEFLAGS and `%(jobs)s`)
    pub jobs: u32,
    /// Archive or head source
    pub mode: BuildMode,
    /// Refuse recipes whose source has no checksum
    pub require_checksum: bool,
    /// Skip the smoke test after installing
    pub skip_tests: bool,
    /// Keep the build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Show a progress bar while downloading
    pub show_progress: bool,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        let cache_root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("pantry");

        Self {
            source_cache: cache_root.join("sources"),
            build_root: cache_root.join("build"),
            lock_dir: cache_root.join("locks"),
            timeout: Duration::from_secs(3600), // 1 hour
            test_timeout: Duration::from_secs(60),
            jobs,
            mode: BuildMode::Stable,
            require_checksum: false,
            skip_tests: false,
            keep_builddir: false,
            show_progress: false,
        }
    }
}

impl KitchenConfig {
    /// Configuration rooted at a single cache directory
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            source_cache: cache_dir.join("sources"),
            build_root: cache_dir.join("build"),
            lock_dir: cache_dir.join("locks"),
            ..Self::default()
        }
    }
}

/// Result of cooking a recipe
#[derive(Debug)]
pub struct CookResult {
    /// Recipe name
    pub name: String,
    /// Built version (`HEAD-<commit>` for head builds)
    pub version: String,
    /// Source the build used
    pub provenance: Provenance,
    /// Executables placed in the bin directory
    pub installed: Vec<PathBuf>,
    /// Number of smoke-test assertions that passed
    pub tests_passed: usize,
    /// Degraded-safety and other non-fatal notices
    pub warnings: Vec<String>,
    /// Build log
    pub log: String,
}

/// Result of fetching a recipe's source without building
#[derive(Debug)]
pub struct FetchResult {
    /// Source that was fetched
    pub provenance: Provenance,
    /// Cached archive or head checkout
    pub path: PathBuf,
    /// Version of the fetched source
    pub version: String,
    /// Whether the archive was checked against a declared checksum
    pub verified: bool,
    /// Degraded-safety notices
    pub warnings: Vec<String>,
}
