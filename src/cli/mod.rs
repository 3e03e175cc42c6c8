// src/cli/mod.rs
//! CLI definitions for pantry
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `install` - Fetch, build, install and smoke-test a recipe
//! - `fetch` - Fetch and verify a recipe's source only
//! - `test` - Run a recipe's smoke tests against a bin directory
//! - `validate` - Check a recipe for errors and warnings
//! - `info` - Show what a recipe declares

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pantry")]
#[command(version)]
#[command(about = "Build and install command-line tools from source recipes", long_about = None)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, build and install a recipe, then smoke-test it
    Install {
        /// Path to the recipe file
        recipe: String,

        /// Directory to install executables into (default: ~/.local/bin)
        #[arg(short, long)]
        bin_dir: Option<String>,

        /// Build the latest source from the recipe's head repository
        #[arg(long)]
        head: bool,

        /// Build from this local source tree instead of fetching
        #[arg(long, conflicts_with = "head")]
        source_dir: Option<String>,

        /// Cache directory for sources and build trees
        #[arg(long)]
        cache_dir: Option<String>,

        /// Number of parallel build jobs (default: CPU count)
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Timeout for each install step, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Timeout for each test command, in seconds
        #[arg(long)]
        test_timeout: Option<u64>,

        /// Refuse sources that have no declared sha256
        #[arg(long)]
        require_checksum: bool,

        /// Do not run the smoke tests after installing
        #[arg(long)]
        skip_tests: bool,

        /// Keep the build directory after completion
        #[arg(long)]
        keep_builddir: bool,

        /// Skip dependency checking
        #[arg(long)]
        no_deps: bool,
    },

    /// Fetch and verify a recipe's source without building
    Fetch {
        /// Path to the recipe file
        recipe: String,

        /// Check out the head repository instead of the archive
        #[arg(long)]
        head: bool,

        /// Cache directory for sources
        #[arg(long)]
        cache_dir: Option<String>,

        /// Refuse sources that have no declared sha256
        #[arg(long)]
        require_checksum: bool,
    },

    /// Run a recipe's smoke tests against installed executables
    Test {
        /// Path to the recipe file
        recipe: String,

        /// Directory holding the installed executables
        #[arg(short, long)]
        bin_dir: String,

        /// Timeout for each test command, in seconds
        #[arg(long)]
        test_timeout: Option<u64>,
    },

    /// Validate a recipe and report warnings
    Validate {
        /// Path to the recipe file
        recipe: String,
    },

    /// Show recipe details
    Info {
        /// Path to the recipe file
        recipe: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
