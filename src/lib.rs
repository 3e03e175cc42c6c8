// src/lib.rs

//! Pantry: recipe-driven source builds
//!
//! Pantry reads a declarative recipe for a command-line tool, fetches and
//! verifies its source, checks that its dependencies are available, runs
//! the recipe's build steps in a scoped build directory, installs the
//! resulting executables and smoke-tests them.
//!
//! # Architecture
//!
//! - Linear pipeline: Loader, Fetcher, Resolver, Installer, Test Runner
//! - Steps are data: every install and test step is an [`recipe::Action`]
//! - Collaborators behind traits: fetching and dependency lookup are
//!   [`recipe::Fetcher`] and [`recipe::DependencyResolver`]
//! - Failures leave the destination bin directory untouched

mod error;
pub mod hash;
pub mod lock;
pub mod recipe;

pub use error::{Error, Result, Stage};
pub use hash::Checksum;
pub use lock::BinDirLock;
pub use recipe::{
    parse_recipe, parse_recipe_file, validate_recipe, BuildMode, CookResult, Kitchen,
    KitchenConfig, Recipe,
};
