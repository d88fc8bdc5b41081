#![deny(missing_docs)]

//! Evolutionary stochastic search over sparse SUR and HESS regression
//! models: a population of tempered chains with adaptive indicator
//! proposals, streaming posterior summaries and a run driver.

/// Chain contract and the SUR / HESS models.
pub mod chain;
/// YAML configuration schema and defaults.
pub mod config;
/// Prior log densities.
pub mod density;
/// Shared design matrices.
pub mod design;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Run driver and `run` / `run_to_directory` entry points.
pub mod drive;
/// Indicator initialisation policies.
pub mod init;
/// Run manifest serialization helpers.
pub mod manifest;
/// Adaptive indicator proposals.
pub mod proposal;
/// Chain population coordinator.
pub mod sampler;
/// Summary output streams.
pub mod sink;
/// Streaming posterior summaries.
pub mod summary;
/// Simulated problems with known structure.
pub mod synthetic;
/// Parallel tempering ladder helpers.
pub mod tempering;

pub use chain::{Chain, ChainModel, HessModel, SurModel};
pub use config::{
    CheckpointConfig, CovarianceKind, GammaInit, GammaPriorKind, GammaSamplerKind, LadderConfig,
    ModelKind, MoveConfig, PriorConfig, ResolvedConfig, RunConfig, SamplerSettings, SeedPolicy,
    ThreadConfig,
};
pub use drive::{run, run_to_directory, RunOptions, RunSummary};
pub use init::{initial_indicators, InitialIndicators};
pub use sampler::Sampler;
pub use sink::{FileSink, MemorySink, Stream, SummarySink};
pub use summary::SummaryAccumulator;
pub use synthetic::{SyntheticData, SyntheticScenario};
