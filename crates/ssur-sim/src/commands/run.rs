use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use ssur_mcmc::{run_to_directory, RunConfig, RunOptions};

use crate::io::load_dataset;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration describing the sampler run.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Whitespace-separated data matrix (one observation per line).
    #[arg(long)]
    pub data: PathBuf,
    /// Column roles: 0 outcome, 1 selectable, 2 fixed, -1 ignored.
    #[arg(long)]
    pub blocks: PathBuf,
    /// Optional p×p 0/1 structure graph over the selectable predictors.
    #[arg(long = "structure-graph")]
    pub structure_graph: Option<PathBuf>,
    /// Output directory for the summary streams and manifest.
    #[arg(long)]
    pub out: PathBuf,
    /// Master seed overriding the configuration.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Iteration count overriding the configuration.
    #[arg(long)]
    pub iterations: Option<usize>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = Some(seed);
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    let dataset = load_dataset(&args.data, &args.blocks, args.structure_graph.as_deref())?;
    let (summary, manifest) =
        run_to_directory(&dataset, &config, &args.data, &args.out, &RunOptions::default())?;
    tracing::info!(manifest = %manifest.display(), "manifest written");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
