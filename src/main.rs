// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Install {
            recipe,
            bin_dir,
            head,
            source_dir,
            cache_dir,
            jobs,
            timeout,
            test_timeout,
            require_checksum,
            skip_tests,
            keep_builddir,
            no_deps,
        } => commands::cmd_install(
            &recipe,
            bin_dir.as_deref(),
            head,
            source_dir.as_deref(),
            cache_dir.as_deref(),
            jobs,
            timeout,
            test_timeout,
            require_checksum,
            skip_tests,
            keep_builddir,
            no_deps,
        ),
        Commands::Fetch {
            recipe,
            head,
            cache_dir,
            require_checksum,
        } => commands::cmd_fetch(&recipe, head, cache_dir.as_deref(), require_checksum),
        Commands::Test {
            recipe,
            bin_dir,
            test_timeout,
        } => commands::cmd_test(&recipe, &bin_dir, test_timeout),
        Commands::Validate { recipe } => commands::cmd_validate(&recipe),
        Commands::Info { recipe, json } => commands::cmd_info(&recipe, json),
    }
}

/// Print the failure with its stage and captured diagnostics
fn report(err: &anyhow::Error) -> i32 {
    eprintln!("Error: {}", err);

    let Some(cause) = err.downcast_ref::<pantry::Error>() else {
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        return 1;
    };

    eprintln!("  stage: {}", cause.stage());
    eprintln!("  cause: {}", cause);

    match cause {
        pantry::Error::BuildFailed { output, .. } if !output.is_empty() => {
            eprintln!("  output (last lines):");
            for line in output.lines() {
                eprintln!("    {}", line);
            }
        }
        pantry::Error::ChecksumMismatch { expected, actual } => {
            eprintln!("  expected: sha256:{}", expected);
            eprintln!("  actual:   sha256:{}", actual);
        }
        pantry::Error::TestAssertionFailed { actual, .. } => {
            eprintln!("  output:");
            for line in actual.lines() {
                eprintln!("    {}", line);
            }
        }
        _ => {}
    }

    cause.exit_code()
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli.command) {
        std::process::exit(report(&err));
    }
}
