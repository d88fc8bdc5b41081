//! Run driver: configuration to finished summary streams.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ssur_core::{time_seed, Dataset, RngHandle, SsurError};

use crate::chain::{ChainModel, HessModel, ProposalVariances, SurModel};
use crate::config::{CovarianceKind, ModelKind, ResolvedConfig, RunConfig};
use crate::determinism;
use crate::init::{initial_indicators, InitialIndicators};
use crate::manifest::{dataset_hash, Dimensions, RunManifest};
use crate::sampler::Sampler;
use crate::sink::{FileSink, Stream, SummarySink};
use crate::summary::SummaryAccumulator;

/// Caller-side controls of a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Raised to stop the run at the next checkpoint.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Model that ran.
    pub model: ModelKind,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Last iteration stepped.
    pub last_iteration: usize,
    /// Whether the run stopped on the cancellation flag.
    pub cancelled: bool,
    /// States summarised.
    pub samples: usize,
    /// Graph states summarised.
    pub graph_samples: usize,
    /// Final coefficient prior variance.
    pub final_w: f64,
    /// Final covariance prior scale (SUR).
    pub final_tau: Option<f64>,
    /// Final edge probability (SUR).
    pub final_eta: Option<f64>,
    /// Final adaptive proposal variances.
    pub proposal_variances: ProposalVariances,
    /// `sum(o·piᵀ) / (p·s)` of the cold chain.
    pub average_omega: f64,
    /// Temperature of the first tempered chain, when more than one chain ran.
    pub final_temperature_ratio: Option<f64>,
    /// Trailing indicator acceptance rate of the cold chain.
    pub gamma_acceptance: f64,
    /// Trailing graph acceptance rate of the cold chain.
    pub jt_acceptance: f64,
    /// Trailing exchange acceptance rate.
    pub exchange_acceptance: f64,
    /// Exchange attempts.
    pub exchange_attempts: usize,
}

/// Runs the sampler described by `config` and writes summaries to `sink`.
pub fn run(
    dataset: &Dataset,
    config: &RunConfig,
    sink: &mut dyn SummarySink,
    options: &RunOptions,
) -> Result<RunSummary, SsurError> {
    let resolved = config.resolve()?;
    run_resolved(dataset, &resolved, sink, options)
}

fn run_resolved(
    dataset: &Dataset,
    resolved: &ResolvedConfig,
    sink: &mut dyn SummarySink,
    options: &RunOptions,
) -> Result<RunSummary, SsurError> {
    let master_seed = resolved.master_seed.unwrap_or_else(time_seed);
    tracing::info!(
        model = resolved.model.label(),
        iterations = resolved.iterations,
        burn_in = resolved.burn_in,
        chains = resolved.settings.chains,
        master_seed,
        "starting run"
    );
    let mut init_rng = RngHandle::from_seed(determinism::init_seed(master_seed));
    let init = initial_indicators(resolved.gamma_init, dataset, &mut init_rng)?;
    match resolved.model {
        ModelKind::Sur => drive::<SurModel>(dataset, resolved, master_seed, &init, sink, options),
        ModelKind::Hess => drive::<HessModel>(dataset, resolved, master_seed, &init, sink, options),
    }
}

fn drive<M: ChainModel>(
    dataset: &Dataset,
    resolved: &ResolvedConfig,
    master_seed: u64,
    init: &InitialIndicators,
    sink: &mut dyn SummarySink,
    options: &RunOptions,
) -> Result<RunSummary, SsurError> {
    let mut sampler = Sampler::<M>::new(dataset, resolved.settings.clone(), master_seed)?;
    sampler.set_jt_start_iteration(resolved.jt_start);
    sampler.initialize(init)?;

    let mut accumulator = SummaryAccumulator::new(
        M::KIND,
        dataset.n_fixed(),
        dataset.n_selectable(),
        dataset.n_outcomes(),
        resolved.burn_in,
        resolved.jt_start,
    );
    accumulator.observe(0, &sampler[0].state());
    if resolved.burn_in == 0 {
        accumulator.checkpoint(&sampler[0].log_components(), sink)?;
    }

    let interval = resolved.checkpoint_interval;
    let mut last_iteration = 0;
    let mut cancelled = false;
    for iteration in 1..resolved.iterations {
        sampler.step()?;
        accumulator.observe(iteration, &sampler[0].state());
        last_iteration = iteration;
        if iteration % interval == 0 {
            tracing::info!(
                iteration,
                gamma_acceptance = sampler[0].gamma_acceptance_rate(),
                jt_acceptance = sampler[0].jt_acceptance_rate(),
                global_acceptance = sampler.global_acc_rate(),
                "progress"
            );
        }
        if iteration >= resolved.burn_in && (iteration - resolved.burn_in + 1) % interval == 0 {
            accumulator.checkpoint(&sampler[0].log_components(), sink)?;
            if options.cancelled() {
                tracing::warn!(iteration, "run cancelled");
                cancelled = true;
                break;
            }
        }
    }
    accumulator.finalize(&sampler[0].log_components(), sink)?;

    let cold = &sampler[0];
    let (p, s) = (cold.p(), cold.s());
    let omega_total: f64 = cold
        .o()
        .iter()
        .map(|o| cold.pi().iter().map(|pi| o * pi).sum::<f64>())
        .sum();
    let average_omega = if p * s == 0 {
        0.0
    } else {
        omega_total / (p * s) as f64
    };
    let summary = RunSummary {
        model: M::KIND,
        master_seed,
        last_iteration,
        cancelled,
        samples: accumulator.samples(),
        graph_samples: accumulator.graph_samples(),
        final_w: cold.w(),
        final_tau: cold.tau(),
        final_eta: cold.eta(),
        proposal_variances: cold.proposal_variances(),
        average_omega,
        final_temperature_ratio: (sampler.n_chains() > 1).then(|| sampler[1].temperature()),
        gamma_acceptance: cold.gamma_acceptance_rate(),
        jt_acceptance: cold.jt_acceptance_rate(),
        exchange_acceptance: sampler.global_acc_rate(),
        exchange_attempts: sampler.exchange_attempts(),
    };
    tracing::info!(
        samples = summary.samples,
        final_w = summary.final_w,
        average_omega = summary.average_omega,
        "run finished"
    );
    Ok(summary)
}

/// File name prefix of a run: `<stem>_SSUR_`, `<stem>_dSUR_` or
/// `<stem>_HESS_`.
pub fn output_prefix(data_stem: &str, model: ModelKind, covariance: CovarianceKind) -> String {
    let tag = match (model, covariance) {
        (ModelKind::Sur, CovarianceKind::Sparse) => "SSUR",
        (ModelKind::Sur, CovarianceKind::Dense) => "dSUR",
        (ModelKind::Hess, _) => "HESS",
    };
    format!("{data_stem}_{tag}_")
}

/// Runs with a [`FileSink`] under `out_dir` and writes a JSON manifest next
/// to the streams. Returns the summary and the manifest path.
pub fn run_to_directory(
    dataset: &Dataset,
    config: &RunConfig,
    data_path: &Path,
    out_dir: &Path,
    options: &RunOptions,
) -> Result<(RunSummary, PathBuf), SsurError> {
    let resolved = config.resolve()?;
    let stem = data_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let prefix = output_prefix(&stem, resolved.model, resolved.settings.covariance);
    let streams = Stream::for_model(resolved.model);
    let mut sink = FileSink::create(out_dir, prefix.clone(), streams)?;
    let summary = run_resolved(dataset, &resolved, &mut sink, options)?;

    let manifest = RunManifest {
        config: config.clone(),
        master_seed: summary.master_seed,
        seed_label: config.seed_policy.label.clone(),
        dimensions: Dimensions::of(dataset),
        data_hash: dataset_hash(dataset),
        structure_graph: dataset.structure_graph().is_some(),
        streams: streams
            .iter()
            .map(|stream| PathBuf::from(format!("{prefix}{}", stream.file_name())))
            .collect(),
        summary: summary.clone(),
    };
    let manifest_path = out_dir.join(format!("{prefix}manifest.json"));
    manifest.write(&manifest_path)?;
    Ok((summary, manifest_path))
}
