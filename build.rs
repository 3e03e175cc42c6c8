// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: recipe file
fn recipe_arg() -> Arg {
    Arg::new("recipe")
        .required(true)
        .value_name("RECIPE")
        .help("Path to the recipe file")
}

/// Common argument: cache directory
fn cache_dir_arg() -> Arg {
    Arg::new("cache_dir")
        .long("cache-dir")
        .value_name("DIR")
        .help("Cache directory for sources and build trees")
}

fn flag(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("pantry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build and install command-line tools from source recipes")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Show debug output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only show warnings and errors"),
        )
        .subcommand(
            Command::new("install")
                .about("Fetch, build and install a recipe, then smoke-test it")
                .arg(recipe_arg())
                .arg(
                    Arg::new("bin_dir")
                        .short('b')
                        .long("bin-dir")
                        .value_name("DIR")
                        .help("Directory to install executables into (default: ~/.local/bin)"),
                )
                .arg(flag("head", "head", "Build the latest source from the head repository"))
                .arg(
                    Arg::new("source_dir")
                        .long("source-dir")
                        .value_name("DIR")
                        .help("Build from this local source tree instead of fetching"),
                )
                .arg(cache_dir_arg())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Number of parallel build jobs"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .help("Timeout for each install step"),
                )
                .arg(
                    Arg::new("test_timeout")
                        .long("test-timeout")
                        .value_name("SECS")
                        .help("Timeout for each test command"),
                )
                .arg(flag("require_checksum", "require-checksum", "Refuse sources that have no declared sha256"))
                .arg(flag("skip_tests", "skip-tests", "Do not run the smoke tests after installing"))
                .arg(flag("keep_builddir", "keep-builddir", "Keep the build directory after completion"))
                .arg(flag("no_deps", "no-deps", "Skip dependency checking")),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch and verify a recipe's source without building")
                .arg(recipe_arg())
                .arg(flag("head", "head", "Check out the head repository instead of the archive"))
                .arg(cache_dir_arg())
                .arg(flag("require_checksum", "require-checksum", "Refuse sources that have no declared sha256")),
        )
        .subcommand(
            Command::new("test")
                .about("Run a recipe's smoke tests against installed executables")
                .arg(recipe_arg())
                .arg(
                    Arg::new("bin_dir")
                        .short('b')
                        .long("bin-dir")
                        .value_name("DIR")
                        .required(true)
                        .help("Directory holding the installed executables"),
                )
                .arg(
                    Arg::new("test_timeout")
                        .long("test-timeout")
                        .value_name("SECS")
                        .help("Timeout for each test command"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a recipe and report warnings")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Show recipe details")
                .arg(recipe_arg())
                .arg(flag("json", "json", "Output as JSON")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Man pages go to OUT_DIR
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = out_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pantry.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
