// src/commands/cook.rs

//! Install, fetch and test commands

use super::{default_bin_dir, kitchen_config, load_recipe};
use anyhow::{Context, Result};
use pantry::recipe::{validate_recipe, BuildMode, Kitchen, NoopResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Fetch, build, install and smoke-test a recipe
///
/// # Arguments
/// * `recipe_path` - Path to the recipe file
/// * `bin_dir` - Install directory (None = ~/.local/bin)
/// * `head` - Build from the head repository
/// * `source_dir` - Build from a local tree instead of fetching
/// * `cache_dir` - Source and build cache root (None = user cache dir)
/// * `jobs` - Number of parallel build jobs (None = auto)
/// * `timeout` / `test_timeout` - Per-step timeouts in seconds
/// * `require_checksum` - Refuse unverified sources
/// * `skip_tests` - Do not run smoke tests
/// * `keep_builddir` - Keep build directory after completion
/// * `no_deps` - Skip dependency checking
#[allow(clippy::too_many_arguments)]
pub fn cmd_install(
    recipe_path: &str,
    bin_dir: Option<&str>,
    head: bool,
    source_dir: Option<&str>,
    cache_dir: Option<&str>,
    jobs: Option<u32>,
    timeout: Option<u64>,
    test_timeout: Option<u64>,
    require_checksum: bool,
    skip_tests: bool,
    keep_builddir: bool,
    no_deps: bool,
) -> Result<()> {
    println!("Reading recipe: {}", recipe_path);
    let recipe = load_recipe(recipe_path)?;
    println!(
        "Recipe: {} {}",
        recipe.name,
        recipe.version.as_deref().unwrap_or("HEAD")
    );

    for warning in validate_recipe(&recipe) {
        println!("Warning: {}", warning);
    }

    // Configure the kitchen
    let mut config = kitchen_config(cache_dir);
    config.mode = if head { BuildMode::Head } else { BuildMode::Stable };
    config.require_checksum = require_checksum;
    config.skip_tests = skip_tests;
    config.keep_builddir = keep_builddir;
    config.show_progress = true;

    if let Some(j) = jobs {
        config.jobs = j;
    }
    if let Some(secs) = timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = test_timeout {
        config.test_timeout = Duration::from_secs(secs);
    }

    let bin_dir = bin_dir.map(PathBuf::from).unwrap_or_else(default_bin_dir);
    println!(
        "Cooking {} with {} parallel jobs into {}...",
        recipe.name,
        config.jobs,
        bin_dir.display()
    );

    let mut kitchen = Kitchen::new(config)?;
    if no_deps {
        kitchen = kitchen.with_resolver(Arc::new(NoopResolver));
    }

    let result = match source_dir {
        Some(src) => kitchen.install_from_source(&recipe, Path::new(src), &bin_dir),
        None => kitchen.cook(&recipe, &bin_dir),
    }
    .with_context(|| format!("Failed to install {}", recipe.name))?;

    println!("\n[COMPLETE] Installed {} {}:", result.name, result.version);
    for path in &result.installed {
        println!("  - {}", path.display());
    }

    if skip_tests {
        println!("Smoke tests skipped");
    } else {
        println!("[OK] {} smoke test(s) passed", result.tests_passed);
    }

    if !result.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    info!(
        "Successfully installed {} from {}",
        result.name,
        result.provenance.url()
    );

    Ok(())
}

/// Fetch and verify a recipe's source without building
pub fn cmd_fetch(
    recipe_path: &str,
    head: bool,
    cache_dir: Option<&str>,
    require_checksum: bool,
) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;

    let mut config = kitchen_config(cache_dir);
    config.mode = if head { BuildMode::Head } else { BuildMode::Stable };
    config.require_checksum = require_checksum;
    config.show_progress = true;

    let kitchen = Kitchen::new(config)?;
    let result = kitchen
        .fetch(&recipe)
        .with_context(|| format!("Failed to fetch sources for {}", recipe.name))?;

    println!(
        "[COMPLETE] Fetched {} {}: {}",
        recipe.name,
        result.version,
        result.path.display()
    );

    if result.verified {
        println!("[OK] sha256 verified; source is cached for offline builds");
    }
    for warning in &result.warnings {
        println!("Warning: {}", warning);
    }

    Ok(())
}

/// Run a recipe's smoke tests against an existing bin directory
pub fn cmd_test(recipe_path: &str, bin_dir: &str, test_timeout: Option<u64>) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;

    let mut config = kitchen_config(None);
    if let Some(secs) = test_timeout {
        config.test_timeout = Duration::from_secs(secs);
    }

    let kitchen = Kitchen::new(config)?;
    let passed = kitchen
        .test(&recipe, Path::new(bin_dir))
        .with_context(|| format!("Smoke tests failed for {}", recipe.name))?;

    if passed == 0 {
        println!("{} declares no smoke tests", recipe.name);
    } else {
        println!("[OK] {} smoke test(s) passed for {}", passed, recipe.name);
    }

    Ok(())
}
