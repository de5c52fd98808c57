use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

use commands::{example::ExampleCommand, run::RunCommand, smoke::SmokeCommand};

#[derive(Parser)]
#[command(name = "marmoset", version, about = "QuickJS bindings: smoke tests, examples and a script runner")]
struct Cli {
    /// Configuration file (default: marmoset.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the smoke suites and report their timings
    Smoke(SmokeCommand),
    /// Run the usage examples
    Example(ExampleCommand),
    /// Evaluate a script file and print its result
    Run(RunCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    marmoset_core::init();
    info!(version = %marmoset_core::version(), "engine initialized");

    let result = match &cli.command {
        Commands::Smoke(cmd) => cmd.run(&config),
        Commands::Example(cmd) => cmd.run(&config),
        Commands::Run(cmd) => cmd.run(&config),
    };

    marmoset_core::shutdown();
    result
}
