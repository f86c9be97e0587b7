//! Tabula CLI - fit, sample and inspect Gaussian-copula synthesizers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "tabula=debug,warn" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let result = match cli.command {
        Commands::Fit { args, output, seed } => commands::fit::run(args, output, seed, cli.verbose),

        Commands::Sample {
            model,
            rows,
            output,
            conditional_output,
            conditions,
            seed,
        } => commands::sample::run(
            model,
            rows,
            output,
            conditional_output,
            conditions,
            seed,
            cli.verbose,
        ),

        Commands::Synth {
            args,
            rows,
            output,
            conditional_output,
            save_model,
            seed,
        } => commands::synth::run(
            args,
            rows,
            output,
            conditional_output,
            save_model,
            seed,
            cli.verbose,
        ),

        Commands::Inspect { model, format } => commands::inspect::run(model, format, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
