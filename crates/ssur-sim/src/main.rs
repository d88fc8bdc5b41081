use std::error::Error;

use clap::{Parser, Subcommand};
use ssur_sim::commands::{
    run::{self, RunArgs},
    simulate::{self, SimulateArgs},
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ssur-sim", about = "Sparse SUR / HESS sampler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample a dataset and write posterior summaries plus a manifest.
    Run(RunArgs),
    /// Write a simulated dataset with known active predictors.
    Simulate(SimulateArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Simulate(args) => simulate::run(&args),
    }
}
