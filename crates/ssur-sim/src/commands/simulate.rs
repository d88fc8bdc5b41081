use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use nalgebra::DMatrix;
use ssur_mcmc::SyntheticScenario;

use crate::io::write_matrix;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Output directory.
    #[arg(long)]
    pub out: PathBuf,
    /// File stem of the generated files.
    #[arg(long, default_value = "synthetic")]
    pub name: String,
    #[arg(long, default_value_t = 50)]
    pub n: usize,
    #[arg(long, default_value_t = 10)]
    pub p: usize,
    #[arg(long, default_value_t = 2)]
    pub s: usize,
    /// Active selectable predictors.
    #[arg(long, default_value_t = 3)]
    pub active: usize,
    #[arg(long, default_value_t = 1.5)]
    pub effect: f64,
    #[arg(long, default_value_t = 20_240_601)]
    pub seed: u64,
}

/// Writes `<name>.txt` (outcomes, intercept, predictors), `<name>_blocks.txt`
/// and `<name>_truth.txt` (generating indicators).
pub fn run(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    let scenario = SyntheticScenario {
        n: args.n,
        p: args.p,
        s: args.s,
        active: args.active,
        effect: args.effect,
        seed: args.seed,
        ..SyntheticScenario::default()
    };
    let data = scenario.generate()?;
    fs::create_dir_all(&args.out)?;
    let dataset = &data.dataset;
    let (s, q, p) = (dataset.n_outcomes(), dataset.n_fixed(), dataset.n_selectable());
    let mut matrix = DMatrix::<f64>::zeros(dataset.n_observations(), s + q + p);
    matrix.columns_mut(0, s).copy_from(&dataset.outcomes());
    matrix.columns_mut(s, q).copy_from(&dataset.fixed_predictors());
    matrix.columns_mut(s + q, p).copy_from(&dataset.selectable_predictors());
    write_matrix(&args.out.join(format!("{}.txt", args.name)), &matrix)?;

    let blocks: Vec<&str> = std::iter::repeat("0")
        .take(s)
        .chain(std::iter::repeat("2").take(q))
        .chain(std::iter::repeat("1").take(p))
        .collect();
    fs::write(
        args.out.join(format!("{}_blocks.txt", args.name)),
        format!("{}\n", blocks.join(" ")),
    )?;
    write_matrix(
        &args.out.join(format!("{}_truth.txt", args.name)),
        &data.true_gamma.map(f64::from),
    )?;
    tracing::info!(
        out = %args.out.display(),
        n = args.n,
        p = args.p,
        s = args.s,
        "synthetic data written"
    );
    Ok(())
}
