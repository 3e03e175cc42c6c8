// src/recipe/mod.rs

//! Recipe system for building command-line tools from source
//!
//! Recipes define how to build and install a tool, including:
//! - The source archive and its checksum, or a head repository
//! - Dependencies that must be available before building
//! - Install steps (shell commands and executables to install)
//! - Smoke tests run against the installed executables
//!
//! # Culinary Terminology
//!
//! - **Recipe**: The build specification (like a recipe card)
//! - **Cook**: Build and install a tool from a recipe
//! - **Kitchen**: The scoped build environment
//! - **Prep**: Fetch and verify sources
//! - **Simmer**: Run the install steps
//! - **Plate**: Place the built executables in the bin directory
//! - **Taste**: Smoke-test what was plated
//!
//! # Example Recipe
//!
//! ```toml
//! name = "quote"
//! desc = "Fast, real-time stock quotes in your terminal"
//! homepage = "https://github.com/Khurdhula-Harshavardhan/quote"
//! url = "https://github.com/Khurdhula-Harshavardhan/quote/archive/refs/tags/v0.0.3.tar.gz"
//! sha256 = ""
//! license = "MIT"
//! depends_on = ["curl"]
//! install = ["make", { bin = "quote" }]
//!
//! [head]
//! url = "https://github.com/Khurdhula-Harshavardhan/quote.git"
//! branch = "main"
//!
//! [[test]]
//! run = "%(bin)s/quote --help"
//! expect = "Usage:"
//! ```

pub mod action;
pub mod format;
pub mod kitchen;
pub mod parser;

pub use action::{Action, Section};
pub use format::{BuildMode, BuildVars, HeadRef, Provenance, Recipe};
pub use kitchen::{
    Cook, CookResult, DependencyResolver, FetchResult, Fetcher, Kitchen, KitchenConfig,
    NoopResolver, PathResolver, SmokeTester, SourceFetcher,
};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
