// src/commands/mod.rs
//! Command handlers for the pantry CLI

mod cook;
mod inspect;

pub use cook::{cmd_fetch, cmd_install, cmd_test};
pub use inspect::{cmd_info, cmd_validate};

use anyhow::{Context, Result};
use pantry::recipe::{parse_recipe_file, Recipe};
use pantry::KitchenConfig;
use std::path::{Path, PathBuf};

/// Load a recipe, keeping the loader's error in the chain
pub(crate) fn load_recipe(recipe_path: &str) -> Result<Recipe> {
    let path = Path::new(recipe_path);
    parse_recipe_file(path)
        .with_context(|| format!("Failed to load recipe: {}", path.display()))
}

/// Kitchen configuration with an optional cache directory override
pub(crate) fn kitchen_config(cache_dir: Option<&str>) -> KitchenConfig {
    match cache_dir {
        Some(dir) => KitchenConfig::with_cache_dir(dir),
        None => KitchenConfig::default(),
    }
}

/// Default install location for executables
pub(crate) fn default_bin_dir() -> PathBuf {
    dirs::executable_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("bin")))
        .unwrap_or_else(|| PathBuf::from("bin"))
}
