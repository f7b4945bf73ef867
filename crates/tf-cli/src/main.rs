//! tffit CLI

use anyhow::Result;
use clap::{Parser, Subcommand};

mod build;
mod plot;

#[derive(Parser)]
#[command(name = "tffit")]
#[command(about = "tffit - transfer-factor fit models and diagnostic plots")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stacked diagnostic plots from a shapes file
    Plot(plot::PlotArgs),

    /// Assemble the binned fit model from a template store
    Build(build::BuildArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Plot(args) => plot::run(&args),
        Commands::Build(args) => build::run(&args),
    }
}
