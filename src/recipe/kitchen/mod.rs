// src/recipe/kitchen/mod.rs

//! Kitchen: where recipes are cooked
//!
//! The Kitchen runs the whole pipeline for one recipe:
//! - Prep: fetch the archive (verified and cached) or check out the head
//! - Dependencies: make sure every `depends_on` entry is available
//! - Simmer: run the install steps in a scoped build directory
//! - Plate: commit built executables into the bin directory
//! - Taste: run the smoke tests against the installed executables
//!
//! Every error aborts the pipeline at the stage that raised it. A failed
//! taste rolls the plate back, so the bin directory ends up as it started.

mod archive;
mod config;
mod cook;
pub mod depends;
pub mod fetch;
pub mod process;
pub mod smoke;

pub use config::{CookResult, FetchResult, KitchenConfig};
pub use cook::Cook;
pub use depends::{DependencyResolver, DependsResult, NoopResolver, PathResolver};
pub use fetch::{Fetcher, SourceFetcher};
pub use smoke::SmokeTester;

use crate::error::{Error, Result};
use crate::hash::{sha256_file, Checksum};
use crate::lock::BinDirLock;
use crate::recipe::format::{BuildVars, Provenance, Recipe};
use cook::sweep_stale_build_dirs;
use fetch::{copy_atomic, head_commit};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache subdirectory for archives that have no declared checksum
const UNVERIFIED_DIR: &str = "unverified";

/// Cache subdirectory for head checkouts made by `fetch`
const HEADS_DIR: &str = "heads";

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    fetcher: Arc<dyn Fetcher>,
    /// Optional resolver for dependencies (PATH lookup when unset)
    resolver: Option<Arc<dyn DependencyResolver>>,
}

impl Kitchen {
    /// Create a new Kitchen with the default source fetcher
    pub fn new(config: KitchenConfig) -> Result<Self> {
        let fetcher = SourceFetcher::new()?.with_progress(config.show_progress);
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            resolver: None,
        })
    }

    /// Replace the source fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Set the dependency resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Cook a recipe: fetch, resolve, build, install into `bin_dir`, test
    ///
    /// This is the main entry point. The bin directory is locked from the
    /// start of the build until the smoke tests finish.
    pub fn cook(&self, recipe: &Recipe, bin_dir: &Path) -> Result<CookResult> {
        let provenance = recipe.provenance(self.config.mode)?;
        info!("Cooking {} from {}", recipe.name, provenance.url());
        self.cook_from(recipe, provenance, bin_dir)
    }

    /// Build and install from an already-prepared source tree
    ///
    /// Skips fetching entirely; the tree is copied into the build directory
    /// so the original is never modified.
    pub fn install_from_source(
        &self,
        recipe: &Recipe,
        source_dir: &Path,
        bin_dir: &Path,
    ) -> Result<CookResult> {
        let provenance = Provenance::Local {
            path: source_dir.display().to_string(),
        };
        info!("Cooking {} from local tree {}", recipe.name, source_dir.display());
        self.cook_from(recipe, provenance, bin_dir)
    }

    fn cook_from(
        &self,
        recipe: &Recipe,
        provenance: Provenance,
        bin_dir: &Path,
    ) -> Result<CookResult> {
        let bin_dir = std::path::absolute(bin_dir)?;

        sweep_stale_build_dirs(&self.config.build_root);
        let mut cook = Cook::new(self, recipe)?;

        let outcome = self.run_pipeline(&mut cook, recipe, &provenance, &bin_dir);

        let log = std::mem::take(&mut cook.log);
        let warnings = std::mem::take(&mut cook.warnings);
        let version = cook.version.clone();

        if self.config.keep_builddir {
            let path = cook.keep();
            info!("Build directory kept at {}", path.display());
        }

        let (installed, tests_passed) = outcome?;
        info!(
            "Cooked {} {} ({} executable(s) installed)",
            recipe.name,
            version,
            installed.len()
        );

        Ok(CookResult {
            name: recipe.name.clone(),
            version,
            provenance,
            installed,
            tests_passed,
            warnings,
            log,
        })
    }

    fn run_pipeline(
        &self,
        cook: &mut Cook<'_>,
        recipe: &Recipe,
        provenance: &Provenance,
        bin_dir: &Path,
    ) -> Result<(Vec<PathBuf>, usize)> {
        // Phase 1: Prep - fetch ingredients
        info!("Prep: fetching source...");
        let archive = match provenance {
            Provenance::Archive { url, checksum } => {
                Some(self.fetch_source(recipe, url, checksum, &mut cook.warnings)?)
            }
            Provenance::Head { url, branch } => {
                self.fetcher
                    .clone_head(url, branch.as_deref(), cook.source_dir())?;
                cook.version = head_version(cook.source_dir());
                None
            }
            Provenance::Local { path } => {
                cook.copy_source(Path::new(path))?;
                None
            }
        };

        // Phase 2: Dependencies
        self.check_dependencies(recipe)?;

        // Phase 3: Simmer - unpack and run the install steps
        fs::create_dir_all(bin_dir)?;
        let _lock = BinDirLock::try_acquire(&self.config.lock_dir, bin_dir)?;

        if let Some(archive) = archive {
            cook.unpack(&archive)?;
        }
        info!("Simmering: running install steps...");
        cook.simmer(bin_dir)?;

        // Phase 4: Plate - install into the bin directory
        info!("Plating: installing executables...");
        let installed = cook.plate(bin_dir)?;

        // Phase 5: Taste - smoke test, rolling the plate back on failure
        let tests_passed = if self.config.skip_tests {
            info!("Skipping smoke tests");
            0
        } else {
            info!("Tasting: running smoke tests...");
            match self.run_tests(recipe, bin_dir, &cook.vars(bin_dir)) {
                Ok(passed) => passed,
                Err(e) => {
                    warn!("Smoke tests failed, restoring {}", bin_dir.display());
                    cook.unplate();
                    return Err(e);
                }
            }
        };

        Ok((installed, tests_passed))
    }

    /// Fetch sources for a recipe without building
    ///
    /// Archives are verified and cached in the source cache; head sources
    /// are checked out under the cache's `heads/` directory.
    pub fn fetch(&self, recipe: &Recipe) -> Result<FetchResult> {
        let provenance = recipe.provenance(self.config.mode)?;
        info!("Fetching source for {} from {}", recipe.name, provenance.url());

        let mut warnings = Vec::new();
        let (path, version, verified) = match &provenance {
            Provenance::Archive { url, checksum } => {
                let path = self.fetch_source(recipe, url, checksum, &mut warnings)?;
                let version = recipe.version.clone().unwrap_or_else(|| "HEAD".to_string());
                (path, version, checksum.is_verified())
            }
            Provenance::Head { url, branch } => {
                let dest = self.config.source_cache.join(HEADS_DIR).join(&recipe.name);
                if dest.exists() {
                    fs::remove_dir_all(&dest)?;
                }
                fs::create_dir_all(&dest)?;
                self.fetcher.clone_head(url, branch.as_deref(), &dest)?;
                let version = head_version(&dest);
                (dest, version, false)
            }
            Provenance::Local { path } => (PathBuf::from(path), "local".to_string(), false),
        };

        info!("Fetched {} {} to {}", recipe.name, version, path.display());

        Ok(FetchResult {
            provenance,
            path,
            version,
            verified,
            warnings,
        })
    }

    /// Check if the archive for a recipe is already in the source cache
    pub fn source_cached(&self, recipe: &Recipe) -> bool {
        recipe
            .sha256
            .cache_key()
            .is_some_and(|key| self.config.source_cache.join(key).exists())
    }

    /// Run a recipe's smoke tests against an existing bin directory
    pub fn test(&self, recipe: &Recipe, bin_dir: &Path) -> Result<usize> {
        let bin_dir = std::path::absolute(bin_dir)?;
        let vars = BuildVars {
            version: recipe.version.clone().unwrap_or_else(|| "HEAD".to_string()),
            bin_dir: bin_dir.display().to_string(),
            prefix: bin_dir
                .parent()
                .unwrap_or(&bin_dir)
                .display()
                .to_string(),
            jobs: self.config.jobs,
        };
        self.run_tests(recipe, &bin_dir, &vars)
    }

    fn run_tests(&self, recipe: &Recipe, bin_dir: &Path, vars: &BuildVars) -> Result<usize> {
        let passed = SmokeTester::new(self.config.test_timeout)
            .with_env(self.recipe_env(recipe, vars))
            .run(recipe, bin_dir, vars)?;
        info!("{} smoke test(s) passed for {}", passed, recipe.name);
        Ok(passed)
    }

    /// Check that a recipe's dependencies are available
    ///
    /// Missing dependencies are handed to the resolver's `install`; anything
    /// still missing afterwards fails with `DependencyMissing`.
    pub fn check_dependencies(&self, recipe: &Recipe) -> Result<DependsResult> {
        let deps: Vec<&str> = recipe.depends_on.iter().map(|s| s.as_str()).collect();

        if deps.is_empty() {
            debug!("No dependencies declared");
            return Ok(DependsResult::default());
        }
        info!("Checking dependencies: {}", deps.join(", "));

        let resolver: Arc<dyn DependencyResolver> = match &self.resolver {
            Some(r) => Arc::clone(r),
            None => Arc::new(PathResolver::with_paths(recipe_search_path(recipe))),
        };

        let missing = resolver.check_missing(&deps)?;
        let already_present: Vec<String> = recipe
            .depends_on
            .iter()
            .filter(|d| !missing.contains(d))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(DependsResult {
                already_present,
                ..Default::default()
            });
        }

        info!("Installing missing dependencies: {}", missing.join(", "));
        let newly_installed = resolver.install(&missing)?;
        let unresolved: Vec<String> = missing
            .into_iter()
            .filter(|d| !newly_installed.contains(d))
            .collect();

        if !unresolved.is_empty() {
            return Err(Error::DependencyMissing {
                missing: unresolved,
            });
        }

        Ok(DependsResult {
            already_present,
            newly_installed,
            unresolved,
        })
    }

    /// Recipe environment with `%(var)s` substituted
    pub(crate) fn recipe_env(&self, recipe: &Recipe, vars: &BuildVars) -> Vec<(String, String)> {
        recipe
            .env
            .iter()
            .map(|(k, v)| (k.clone(), recipe.substitute(v, vars)))
            .collect()
    }

    /// Fetch a source archive (with caching)
    ///
    /// Archives with a declared checksum are verified before anything else
    /// sees them and cached under their checksum. Archives without one are
    /// downloaded fresh every time and reported as unverified.
    pub(crate) fn fetch_source(
        &self,
        recipe: &Recipe,
        url: &str,
        checksum: &Checksum,
        warnings: &mut Vec<String>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.source_cache)?;

        let (Some(expected), Some(cache_key)) = (checksum.digest(), checksum.cache_key()) else {
            return self.fetch_unverified(recipe, url, warnings);
        };
        let cached_path = self.config.source_cache.join(&cache_key);

        // Check if already cached
        if cached_path.exists() {
            debug!("Using cached source: {}", cached_path.display());
            if sha256_file(&cached_path)? == expected {
                return Ok(cached_path);
            }
            warn!("Cached file checksum mismatch, re-downloading");
            fs::remove_file(&cached_path)?;
        }

        let download = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&self.config.source_cache)
            .map_err(|e| Error::IoError(format!("Failed to create download file: {}", e)))?;

        self.fetcher.fetch_archive(url, download.path())?;

        let actual = sha256_file(download.path())?;
        if actual != expected {
            return Err(Error::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        debug!("Verified sha256 of {}", url);

        download
            .persist(&cached_path)
            .map_err(|e| Error::IoError(format!("Failed to cache source: {}", e.error)))?;
        Ok(cached_path)
    }

    fn fetch_unverified(
        &self,
        recipe: &Recipe,
        url: &str,
        warnings: &mut Vec<String>,
    ) -> Result<PathBuf> {
        if self.config.require_checksum {
            return Err(Error::ChecksumRequired {
                name: recipe.name.clone(),
            });
        }

        let dir = self.config.source_cache.join(UNVERIFIED_DIR);
        fs::create_dir_all(&dir)?;

        let download = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&dir)
            .map_err(|e| Error::IoError(format!("Failed to create download file: {}", e)))?;
        self.fetcher.fetch_archive(url, download.path())?;

        let actual = sha256_file(download.path())?;
        let message = format!(
            "Source for {} is unverified: no sha256 declared (downloaded archive is sha256:{})",
            recipe.name, actual
        );
        warn!("{}", message);
        warnings.push(message);

        let path = dir.join(format!(
            "{}-{}",
            recipe.name,
            crate::recipe::format::archive_filename(url)
        ));
        copy_atomic(download.path(), &path)?;
        Ok(path)
    }
}

/// Version string for a head checkout
fn head_version(checkout: &Path) -> String {
    match head_commit(checkout) {
        Some(commit) => format!("HEAD-{}", commit),
        None => "HEAD".to_string(),
    }
}

/// Directories from the recipe's own PATH, searched before the process PATH
fn recipe_search_path(recipe: &Recipe) -> Vec<PathBuf> {
    recipe
        .env
        .get("PATH")
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default()
}
