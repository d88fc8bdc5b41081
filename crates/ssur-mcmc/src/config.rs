use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ssur_core::errors::ErrorInfo;
use ssur_core::SsurError;

/// YAML-configurable parameters governing a sampler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total number of iterations, including the initial state (iteration 0).
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Number of initial iterations excluded from the posterior summaries.
    #[serde(default)]
    pub burn_in: usize,
    /// Temperature ladder settings.
    #[serde(default)]
    pub ladder: LadderConfig,
    /// Model variant name (`SUR` or `HESS`).
    #[serde(default = "default_model")]
    pub model: String,
    /// Covariance factorisation (`sparse` or `dense`); only SUR honours it.
    #[serde(default = "default_covariance")]
    pub covariance: String,
    /// Indicator proposal variant (`Bandit` or `MC3`).
    #[serde(default = "default_gamma_sampler")]
    pub gamma_sampler: String,
    /// Indicator prior variant (`hotspot` or `hierarchical`).
    #[serde(default = "default_gamma_prior")]
    pub gamma_prior: String,
    /// Coefficient prior variant (`independent`; `gprior` is rejected).
    #[serde(default = "default_beta_prior")]
    pub beta_prior: String,
    /// Indicator initialisation policy (`0`, `1`, `R` or `MLE`).
    #[serde(default = "default_gamma_init")]
    pub gamma_init: String,
    /// Iteration at which graph moves start; defaults to `iterations / 10`.
    #[serde(default)]
    pub jt_start: Option<usize>,
    /// Local move tuning.
    #[serde(default)]
    pub moves: MoveConfig,
    /// Prior hyperparameters.
    #[serde(default)]
    pub priors: PriorConfig,
    /// Worker pool sizing.
    #[serde(default)]
    pub threads: ThreadConfig,
    /// Checkpoint cadence.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Master seed policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

fn default_iterations() -> usize {
    10
}

fn default_model() -> String {
    "SUR".to_string()
}

fn default_covariance() -> String {
    "sparse".to_string()
}

fn default_gamma_sampler() -> String {
    "Bandit".to_string()
}

fn default_gamma_prior() -> String {
    "hotspot".to_string()
}

fn default_beta_prior() -> String {
    "independent".to_string()
}

fn default_gamma_init() -> String {
    "MLE".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            burn_in: 0,
            ladder: LadderConfig::default(),
            model: default_model(),
            covariance: default_covariance(),
            gamma_sampler: default_gamma_sampler(),
            gamma_prior: default_gamma_prior(),
            beta_prior: default_beta_prior(),
            gamma_init: default_gamma_init(),
            jt_start: None,
            moves: MoveConfig::default(),
            priors: PriorConfig::default(),
            threads: ThreadConfig::default(),
            checkpoint: CheckpointConfig::default(),
            seed_policy: SeedPolicy::default(),
        }
    }
}

/// Temperature ladder construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Number of chains; chain 0 is the cold chain.
    #[serde(default = "default_chains")]
    pub chains: usize,
    /// Geometric ratio between adjacent temperatures.
    #[serde(default = "default_ratio")]
    pub temperature_ratio: f64,
    /// Iterations between exchange attempts.
    #[serde(default = "default_exchange_period")]
    pub exchange_period: usize,
}

fn default_chains() -> usize {
    1
}

fn default_ratio() -> f64 {
    1.2
}

fn default_exchange_period() -> usize {
    1
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            temperature_ratio: default_ratio(),
            exchange_period: default_exchange_period(),
        }
    }
}

/// Tuning of the within-chain moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveConfig {
    /// Indicator proposals per outcome per sweep.
    #[serde(default = "default_proposals_per_outcome")]
    pub proposals_per_outcome: usize,
    /// Cells flipped by one MC3 proposal.
    #[serde(default = "default_mc3_subset")]
    pub mc3_subset: usize,
    /// Reward added to a bandit arm after each decision.
    #[serde(default = "default_bandit_increment")]
    pub bandit_increment: f64,
    /// Cap on alpha + beta of a bandit arm; older evidence is rescaled away.
    #[serde(default = "default_bandit_memory")]
    pub bandit_memory: f64,
    /// Length of the trailing acceptance windows.
    #[serde(default = "default_acceptance_window")]
    pub acceptance_window: usize,
}

fn default_proposals_per_outcome() -> usize {
    4
}

fn default_mc3_subset() -> usize {
    1
}

fn default_bandit_increment() -> f64 {
    1.0
}

fn default_bandit_memory() -> f64 {
    100.0
}

fn default_acceptance_window() -> usize {
    1000
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            proposals_per_outcome: default_proposals_per_outcome(),
            mc3_subset: default_mc3_subset(),
            bandit_increment: default_bandit_increment(),
            bandit_memory: default_bandit_memory(),
            acceptance_window: default_acceptance_window(),
        }
    }
}

/// Prior hyperparameters. Gamma priors use the shape/rate convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorConfig {
    /// Beta shape `a` of the per-predictor propensity `o`.
    #[serde(default = "default_a_o")]
    pub a_o: f64,
    /// Beta shape `b` of `o`; defaults to `max(p - a_o, 1)`.
    #[serde(default)]
    pub b_o: Option<f64>,
    /// Gamma shape of the per-outcome propensity `pi`.
    #[serde(default = "default_two")]
    pub a_pi: f64,
    /// Gamma rate of `pi`.
    #[serde(default = "default_two")]
    pub b_pi: f64,
    /// Inverse-gamma shape of the coefficient variance `w`.
    #[serde(default = "default_two")]
    pub a_w: f64,
    /// Inverse-gamma scale of `w`.
    #[serde(default = "default_b_w")]
    pub b_w: f64,
    /// Prior variance of fixed-predictor coefficients.
    #[serde(default = "default_w_fixed")]
    pub w_fixed: f64,
    /// Inverse-gamma shape of residual variances.
    #[serde(default = "default_a_sigma")]
    pub a_sigma: f64,
    /// Inverse-gamma scale of residual variances (HESS).
    #[serde(default = "default_two")]
    pub b_sigma: f64,
    /// Gamma shape of the covariance scale `tau` (SUR).
    #[serde(default = "default_two")]
    pub a_tau: f64,
    /// Gamma rate of `tau` (SUR).
    #[serde(default = "default_one")]
    pub b_tau: f64,
    /// Beta shape `a` of the graph edge probability `eta` (SUR).
    #[serde(default = "default_one")]
    pub a_eta: f64,
    /// Beta shape `b` of `eta` (SUR).
    #[serde(default = "default_one")]
    pub b_eta: f64,
}

fn default_a_o() -> f64 {
    2.0
}

fn default_one() -> f64 {
    1.0
}

fn default_two() -> f64 {
    2.0
}

fn default_b_w() -> f64 {
    5.0
}

fn default_w_fixed() -> f64 {
    100.0
}

fn default_a_sigma() -> f64 {
    3.0
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            a_o: default_a_o(),
            b_o: None,
            a_pi: default_two(),
            b_pi: default_two(),
            a_w: default_two(),
            b_w: default_b_w(),
            w_fixed: default_w_fixed(),
            a_sigma: default_a_sigma(),
            b_sigma: default_two(),
            a_tau: default_two(),
            b_tau: default_one(),
            a_eta: default_one(),
            b_eta: default_one(),
        }
    }
}

impl PriorConfig {
    /// Beta `b` parameter of `o` for a problem with `p` selectable predictors.
    pub fn b_o_for(&self, p: usize) -> f64 {
        self.b_o.unwrap_or_else(|| (p as f64 - self.a_o).max(1.0))
    }

    fn validate(&self) -> Result<(), SsurError> {
        let positive = [
            ("a_o", self.a_o),
            ("a_pi", self.a_pi),
            ("b_pi", self.b_pi),
            ("a_w", self.a_w),
            ("b_w", self.b_w),
            ("w_fixed", self.w_fixed),
            ("a_sigma", self.a_sigma),
            ("b_sigma", self.b_sigma),
            ("a_tau", self.a_tau),
            ("b_tau", self.b_tau),
            ("a_eta", self.a_eta),
            ("b_eta", self.b_eta),
        ];
        for (name, value) in positive
            .into_iter()
            .chain(self.b_o.map(|b| ("b_o", b)))
        {
            if !(value.is_finite() && value > 0.0) {
                return Err(SsurError::Configuration(
                    ErrorInfo::new("prior-non-positive", "prior parameters must be positive")
                        .with_context("parameter", name)
                        .with_context("value", value),
                ));
            }
        }
        Ok(())
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// Upper bound on worker threads regardless of hardware parallelism.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

fn default_max_threads() -> usize {
    16
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
        }
    }
}

/// Checkpoint cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Iterations between progress reports and summary flushes.
    #[serde(default = "default_interval")]
    pub interval: usize,
}

fn default_interval() -> usize {
    1000
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

/// Seeding configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Explicit master seed; a time-based seed is drawn when absent.
    #[serde(default)]
    pub master_seed: Option<u64>,
    /// Optional label recorded in the manifest.
    #[serde(default)]
    pub label: Option<String>,
}

fn unrecognised(option: &str, value: &str, accepted: &str) -> SsurError {
    SsurError::Configuration(
        ErrorInfo::new("unrecognised-option", "unrecognised option value")
            .with_context("option", option)
            .with_context("value", value)
            .with_hint(format!("accepted values: {accepted}")),
    )
}

/// Model variant driven by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Explicit coefficients and residual covariance.
    Sur,
    /// Coefficients and variances integrated out.
    Hess,
}

impl ModelKind {
    /// Parses a model name; anything other than `HESS` runs the SUR model.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "HESS" => ModelKind::Hess,
            "SUR" | "SSUR" => ModelKind::Sur,
            _ => {
                tracing::warn!(model = name, "unrecognised model name, running SUR");
                ModelKind::Sur
            }
        }
    }

    /// Canonical label used in file prefixes and manifests.
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::Sur => "SUR",
            ModelKind::Hess => "HESS",
        }
    }
}

/// Residual covariance factorisation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceKind {
    /// Sparse outcome graph, innovation-form likelihood.
    Sparse,
    /// Complete graph, Cholesky of the full precision matrix.
    Dense,
}

impl FromStr for CovarianceKind {
    type Err = SsurError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sparse" | "s" => Ok(CovarianceKind::Sparse),
            "dense" | "d" => Ok(CovarianceKind::Dense),
            _ => Err(unrecognised("covariance", value, "sparse, dense")),
        }
    }
}

/// Indicator proposal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaSamplerKind {
    /// Thompson-sampling bandit proposals.
    Bandit,
    /// Uniform random-subset proposals.
    Mc3,
}

impl FromStr for GammaSamplerKind {
    type Err = SsurError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bandit" => Ok(GammaSamplerKind::Bandit),
            "mc3" => Ok(GammaSamplerKind::Mc3),
            _ => Err(unrecognised("gamma_sampler", value, "Bandit, MC3")),
        }
    }
}

/// Indicator prior variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaPriorKind {
    /// `omega_jl = o_j * pi_l`.
    Hotspot,
    /// `omega_jl = o_j`; `pi` is pinned to one.
    Hierarchical,
}

impl FromStr for GammaPriorKind {
    type Err = SsurError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hotspot" => Ok(GammaPriorKind::Hotspot),
            "hierarchical" => Ok(GammaPriorKind::Hierarchical),
            _ => Err(unrecognised("gamma_prior", value, "hotspot, hierarchical")),
        }
    }
}

/// Coefficient prior variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetaPriorKind {
    /// Independent normal priors.
    Independent,
    /// Zellner g-prior (recognised, not implemented).
    GPrior,
}

impl FromStr for BetaPriorKind {
    type Err = SsurError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(BetaPriorKind::Independent),
            "gprior" | "g-prior" => Ok(BetaPriorKind::GPrior),
            _ => Err(unrecognised("beta_prior", value, "independent, gprior")),
        }
    }
}

/// Indicator initialisation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaInit {
    /// Every indicator off.
    Zero,
    /// Every indicator on.
    One,
    /// Independent Bernoulli(0.5) draws.
    Random,
    /// Thresholded least-squares coefficients.
    Mle,
}

impl FromStr for GammaInit {
    type Err = SsurError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "zero" => Ok(GammaInit::Zero),
            "1" | "one" => Ok(GammaInit::One),
            "r" | "random" => Ok(GammaInit::Random),
            "mle" => Ok(GammaInit::Mle),
            _ => Err(unrecognised("gamma_init", value, "0, 1, R, MLE")),
        }
    }
}

impl fmt::Display for GammaInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GammaInit::Zero => "0",
            GammaInit::One => "1",
            GammaInit::Random => "R",
            GammaInit::Mle => "MLE",
        };
        f.write_str(label)
    }
}

/// Everything the sampler needs at construction time.
#[derive(Debug, Clone)]
pub struct SamplerSettings {
    /// Number of chains in the ladder.
    pub chains: usize,
    /// Geometric temperature ratio.
    pub temperature_ratio: f64,
    /// Iterations between exchange attempts.
    pub exchange_period: usize,
    /// Indicator proposal variant.
    pub gamma_sampler: GammaSamplerKind,
    /// Indicator prior variant.
    pub gamma_prior: GammaPriorKind,
    /// Coefficient prior variant.
    pub beta_prior: BetaPriorKind,
    /// Covariance factorisation strategy.
    pub covariance: CovarianceKind,
    /// Local move tuning.
    pub moves: MoveConfig,
    /// Prior hyperparameters.
    pub priors: PriorConfig,
    /// Worker thread cap.
    pub max_threads: usize,
    /// Iterations the run plans; spreads the worker seeds apart.
    pub planned_iterations: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            temperature_ratio: default_ratio(),
            exchange_period: default_exchange_period(),
            gamma_sampler: GammaSamplerKind::Bandit,
            gamma_prior: GammaPriorKind::Hotspot,
            beta_prior: BetaPriorKind::Independent,
            covariance: CovarianceKind::Sparse,
            moves: MoveConfig::default(),
            priors: PriorConfig::default(),
            max_threads: default_max_threads(),
            planned_iterations: 1,
        }
    }
}

impl SamplerSettings {
    /// Rejects unsupported or inconsistent settings before any sampling.
    pub fn validate(&self) -> Result<(), SsurError> {
        if self.beta_prior == BetaPriorKind::GPrior {
            return Err(SsurError::Configuration(
                ErrorInfo::new("beta-prior-gprior", "g-prior is not implemented")
                    .with_hint("use beta_prior: independent"),
            ));
        }
        if self.chains == 0 {
            return Err(SsurError::configuration(
                "ladder-no-chains",
                "at least one chain is required",
            ));
        }
        if !(self.temperature_ratio.is_finite() && self.temperature_ratio >= 1.0) {
            return Err(SsurError::Configuration(
                ErrorInfo::new("ladder-ratio", "temperature ratio must be >= 1")
                    .with_context("ratio", self.temperature_ratio),
            ));
        }
        if self.exchange_period == 0 {
            return Err(SsurError::configuration(
                "ladder-exchange-period",
                "exchange period must be positive",
            ));
        }
        if self.max_threads == 0 {
            return Err(SsurError::configuration(
                "threads-zero",
                "max_threads must be positive",
            ));
        }
        if self.moves.mc3_subset == 0 || self.moves.acceptance_window == 0 {
            return Err(SsurError::configuration(
                "moves-zero",
                "mc3_subset and acceptance_window must be positive",
            ));
        }
        if !(self.moves.bandit_increment > 0.0 && self.moves.bandit_memory > 1.0) {
            return Err(SsurError::configuration(
                "moves-bandit",
                "bandit increment must be positive and memory above one",
            ));
        }
        self.priors.validate()
    }
}

/// Fully typed run configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Model variant (after the SUR fallback).
    pub model: ModelKind,
    /// Sampler construction settings.
    pub settings: SamplerSettings,
    /// Indicator initialisation policy.
    pub gamma_init: GammaInit,
    /// Total iterations.
    pub iterations: usize,
    /// Burn-in iterations.
    pub burn_in: usize,
    /// Iteration at which graph moves start.
    pub jt_start: usize,
    /// Checkpoint cadence.
    pub checkpoint_interval: usize,
    /// Explicit master seed, if any.
    pub master_seed: Option<u64>,
}

impl RunConfig {
    /// Parses a YAML document; absent fields take their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SsurError> {
        serde_yaml::from_str(contents).map_err(|err| {
            SsurError::Configuration(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, SsurError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| SsurError::io("config-read", err, path.display()))?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            SsurError::Configuration(info) => {
                SsurError::Configuration(info.with_context("path", path.display()))
            }
            other => other,
        })
    }

    /// Parses every option into its typed form, failing on the first
    /// unrecognised or inconsistent value.
    pub fn resolve(&self) -> Result<ResolvedConfig, SsurError> {
        let model = ModelKind::from_name(&self.model);
        let mut covariance: CovarianceKind = self.covariance.parse()?;
        if model == ModelKind::Hess && covariance == CovarianceKind::Sparse {
            tracing::debug!("sparse covariance only applies to SUR; HESS runs dense");
            covariance = CovarianceKind::Dense;
        }
        let settings = SamplerSettings {
            chains: self.ladder.chains,
            temperature_ratio: self.ladder.temperature_ratio,
            exchange_period: self.ladder.exchange_period,
            gamma_sampler: self.gamma_sampler.parse()?,
            gamma_prior: self.gamma_prior.parse()?,
            beta_prior: self.beta_prior.parse()?,
            covariance,
            moves: self.moves.clone(),
            priors: self.priors.clone(),
            max_threads: self.threads.max_threads,
            planned_iterations: self.iterations,
        };
        settings.validate()?;
        let gamma_init: GammaInit = self.gamma_init.parse()?;
        if self.iterations == 0 || self.burn_in >= self.iterations {
            return Err(SsurError::Configuration(
                ErrorInfo::new("burn-in-range", "burn-in must be smaller than iterations")
                    .with_context("iterations", self.iterations)
                    .with_context("burn_in", self.burn_in),
            ));
        }
        if self.checkpoint.interval == 0 {
            return Err(SsurError::configuration(
                "checkpoint-interval",
                "checkpoint interval must be positive",
            ));
        }
        Ok(ResolvedConfig {
            model,
            settings,
            gamma_init,
            iterations: self.iterations,
            burn_in: self.burn_in,
            jt_start: self.jt_start.unwrap_or(self.iterations / 10),
            checkpoint_interval: self.checkpoint.interval,
            master_seed: self.seed_policy.master_seed,
        })
    }
}
