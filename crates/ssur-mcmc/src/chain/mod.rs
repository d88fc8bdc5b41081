//! A single tempered replica and the contract its model implements.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use ssur_core::errors::ErrorInfo;
use ssur_core::{RngHandle, SsurError};

use crate::config::{ModelKind, SamplerSettings};
use crate::design::Design;
use crate::init::InitialIndicators;

pub mod adapt;
pub mod hess;
pub mod hotspot;
pub mod sur;

pub use hess::HessModel;
pub use hotspot::IndicatorState;
pub use sur::SurModel;

/// Per-sweep inputs handed to a model.
pub struct SweepContext<'a> {
    /// Generator owned by the executing worker.
    pub rng: &'a mut RngHandle,
    /// Temperature of the chain slot; divides the log-likelihood.
    pub temperature: f64,
    /// Whether outcome-graph moves are enabled.
    pub graph_active: bool,
}

/// Borrowed view of the quantities the summary accumulator tracks.
#[derive(Debug, Clone, Copy)]
pub struct ChainState<'a> {
    /// Indicators (p×s).
    pub gamma: &'a DMatrix<u8>,
    /// Per-predictor propensities.
    pub o: &'a DVector<f64>,
    /// Per-outcome propensities.
    pub pi: &'a DVector<f64>,
    /// Coefficient prior variance.
    pub w: f64,
    /// Coefficients ((q+p)×s), SUR only.
    pub beta: Option<&'a DMatrix<f64>>,
    /// Variances and partial regressions (s×s), SUR only.
    pub sigma_rho: Option<&'a DMatrix<f64>>,
    /// Outcome graph (s×s), SUR only.
    pub graph: Option<&'a DMatrix<u8>>,
    /// Covariance prior scale, SUR only.
    pub tau: Option<f64>,
    /// Graph edge probability, SUR only.
    pub eta: Option<f64>,
}

/// Log prior and likelihood terms, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogComponents {
    /// `tau` prior (SUR).
    pub tau: Option<f64>,
    /// `eta` prior (SUR).
    pub eta: Option<f64>,
    /// Graph prior (SUR).
    pub jt: Option<f64>,
    /// Variance and partial regression priors (SUR).
    pub sigma_rho: Option<f64>,
    /// `o` prior.
    pub o: f64,
    /// `pi` prior.
    pub pi: f64,
    /// Indicator prior.
    pub gamma: f64,
    /// `w` prior.
    pub w: f64,
    /// Coefficient prior (SUR).
    pub beta: Option<f64>,
    /// Untempered log-likelihood.
    pub likelihood: f64,
}

impl LogComponents {
    /// Present terms in output order.
    pub fn entries(&self) -> Vec<f64> {
        let mut entries: Vec<f64> = [self.tau, self.eta, self.jt, self.sigma_rho]
            .into_iter()
            .flatten()
            .collect();
        entries.extend([self.o, self.pi, self.gamma, self.w]);
        entries.extend(self.beta);
        entries.push(self.likelihood);
        entries
    }
}

/// Current variances of the adaptive random-walk proposals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProposalVariances {
    /// `o` proposal variance.
    pub o: f64,
    /// `pi` proposal variance.
    pub pi: f64,
    /// `w` proposal variance (HESS; SUR draws `w` by Gibbs).
    pub w: Option<f64>,
    /// `tau` proposal variance (SUR).
    pub tau: Option<f64>,
}

/// Model-specific state and moves of one replica.
pub trait ChainModel: Clone + Send {
    /// Variant tag.
    const KIND: ModelKind;

    /// Fresh state at the documented starting values.
    fn build(design: Arc<Design>, settings: &SamplerSettings) -> Self;

    /// Indicator state and hotspot propensities.
    fn indicators(&self) -> &IndicatorState;

    /// Mutable indicator state.
    fn indicators_mut(&mut self) -> &mut IndicatorState;

    /// Installs starting coefficients ((q+p)×s).
    fn set_coefficients(&mut self, beta: &DMatrix<f64>) -> Result<(), SsurError>;

    /// Draws the remaining starting state once indicators are set.
    fn initial_draw(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError>;

    /// Recomputes residuals, marginals and the cached log-likelihood.
    fn refresh(&mut self) -> Result<(), SsurError>;

    /// Cached untempered log-likelihood.
    fn log_likelihood(&self) -> f64;

    /// One full sweep of local moves.
    fn sweep(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError>;

    /// Snapshot for summaries.
    fn state(&self) -> ChainState<'_>;

    /// Log prior and likelihood terms.
    fn log_components(&self) -> LogComponents;

    /// Adaptive proposal variances.
    fn proposal_variances(&self) -> ProposalVariances;

    /// Trailing indicator acceptance rate.
    fn gamma_acceptance_rate(&self) -> f64;

    /// Trailing graph-move acceptance rate; 0 for models without a graph.
    fn jt_acceptance_rate(&self) -> f64 {
        0.0
    }
}

/// A replica: model state plus its temperature slot and move schedule.
#[derive(Debug, Clone)]
pub struct Chain<M> {
    model: M,
    temperature: f64,
    iteration: usize,
    jt_start: usize,
    graph_active: bool,
    initialized: bool,
}

impl<M: ChainModel> Chain<M> {
    /// Builds an uninitialised chain at `temperature`.
    pub fn new(design: Arc<Design>, settings: &SamplerSettings, temperature: f64) -> Self {
        Self {
            model: M::build(design, settings),
            temperature,
            iteration: 0,
            jt_start: 0,
            graph_active: false,
            initialized: false,
        }
    }

    /// Seeds the indicator matrix.
    pub fn initialize_indicators(&mut self, gamma: &DMatrix<u8>) -> Result<(), SsurError> {
        self.model.indicators_mut().set_gamma(gamma)
    }

    /// Seeds the coefficients (masked by the indicators where relevant).
    pub fn initialize_coefficients(&mut self, beta: &DMatrix<f64>) -> Result<(), SsurError> {
        self.model.set_coefficients(beta)
    }

    /// Applies a full starting state and draws what the model derives from
    /// it; the chain becomes ready to step.
    pub fn initialize(
        &mut self,
        init: &InitialIndicators,
        rng: &mut RngHandle,
    ) -> Result<(), SsurError> {
        self.initialize_indicators(&init.gamma)?;
        self.initialize_coefficients(&init.beta)?;
        let mut ctx = SweepContext {
            rng,
            temperature: self.temperature,
            graph_active: self.graph_active,
        };
        self.model.initial_draw(&mut ctx)?;
        self.model.refresh()?;
        self.initialized = true;
        Ok(())
    }

    /// Recomputes every cached derived quantity.
    pub fn recompute_derived_quantities(&mut self) -> Result<(), SsurError> {
        self.model.refresh()
    }

    /// Recomputes and returns the untempered log-likelihood.
    pub fn log_likelihood(&mut self) -> Result<f64, SsurError> {
        self.model.refresh()?;
        Ok(self.model.log_likelihood())
    }

    /// Log-likelihood cached by the last sweep or refresh.
    pub fn cached_log_likelihood(&self) -> f64 {
        self.model.log_likelihood()
    }

    /// One sweep of local moves.
    pub fn step_local_move(&mut self, rng: &mut RngHandle) -> Result<(), SsurError> {
        if !self.initialized {
            return Err(SsurError::Configuration(
                ErrorInfo::new("chain-uninitialised", "chain stepped before initialisation")
                    .with_hint("call initialize before stepping"),
            ));
        }
        self.iteration += 1;
        if !self.graph_active && self.iteration >= self.jt_start {
            self.graph_active = true;
            tracing::debug!(iteration = self.iteration, "graph moves enabled");
        }
        let mut ctx = SweepContext {
            rng,
            temperature: self.temperature,
            graph_active: self.graph_active,
        };
        self.model.sweep(&mut ctx)
    }

    /// Iteration from which outcome-graph moves run.
    pub fn set_jt_start_iteration(&mut self, iteration: usize) {
        self.jt_start = iteration;
    }

    /// Exchanges model state with another chain; temperatures and schedules
    /// stay in place.
    pub fn swap_state(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.model, &mut other.model);
    }

    /// Underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable model access.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Whether outcome-graph moves have been enabled.
    pub fn graph_active(&self) -> bool {
        self.graph_active
    }

    /// Whether `initialize` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sweeps completed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Temperature of this slot.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Snapshot of the summarised quantities.
    pub fn state(&self) -> ChainState<'_> {
        self.model.state()
    }

    /// Indicators (p×s).
    pub fn gamma(&self) -> &DMatrix<u8> {
        self.model.indicators().gamma()
    }

    /// Outcome graph, when the model has one.
    pub fn graph(&self) -> Option<&DMatrix<u8>> {
        self.model.state().graph
    }

    /// Coefficients, when explicit.
    pub fn beta(&self) -> Option<&DMatrix<f64>> {
        self.model.state().beta
    }

    /// Variance / partial regression matrix, when explicit.
    pub fn sigma_rho(&self) -> Option<&DMatrix<f64>> {
        self.model.state().sigma_rho
    }

    /// Per-outcome propensities.
    pub fn pi(&self) -> &DVector<f64> {
        self.model.indicators().pi()
    }

    /// Per-predictor propensities.
    pub fn o(&self) -> &DVector<f64> {
        self.model.indicators().o()
    }

    /// Coefficient prior variance.
    pub fn w(&self) -> f64 {
        self.model.state().w
    }

    /// Covariance prior scale, SUR only.
    pub fn tau(&self) -> Option<f64> {
        self.model.state().tau
    }

    /// Edge probability, SUR only.
    pub fn eta(&self) -> Option<f64> {
        self.model.state().eta
    }

    /// Adaptive proposal variances.
    pub fn proposal_variances(&self) -> ProposalVariances {
        self.model.proposal_variances()
    }

    /// Log prior and likelihood terms.
    pub fn log_components(&self) -> LogComponents {
        self.model.log_components()
    }

    /// Trailing indicator acceptance rate.
    pub fn gamma_acceptance_rate(&self) -> f64 {
        self.model.gamma_acceptance_rate()
    }

    /// Trailing graph-move acceptance rate.
    pub fn jt_acceptance_rate(&self) -> f64 {
        self.model.jt_acceptance_rate()
    }

    /// Selectable predictors.
    pub fn p(&self) -> usize {
        self.gamma().nrows()
    }

    /// Outcomes.
    pub fn s(&self) -> usize {
        self.gamma().ncols()
    }
}
