//! HESS model: independent outcomes with coefficients and residual
//! variances integrated out analytically.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use ssur_core::linalg::{cholesky, log_det};
use ssur_core::SsurError;

use super::adapt::AdaptiveScale;
use super::hotspot::IndicatorState;
use super::{ChainModel, ChainState, LogComponents, ProposalVariances, SweepContext};
use crate::config::{ModelKind, PriorConfig, SamplerSettings};
use crate::density::{inv_gamma_collapse, log_inv_gamma, LN_2PI};
use crate::design::Design;
use crate::proposal::AdaptiveProposal;

/// Untempered log marginal likelihood of outcome `l` given its active
/// predictor columns.
pub fn outcome_log_marginal(
    design: &Design,
    priors: &PriorConfig,
    l: usize,
    active: &[usize],
    w: f64,
) -> Result<f64, SsurError> {
    let n = design.n() as f64;
    let yty = design.yty()[l];
    let mut log_prior_det = 0.0;
    let mut log_det_precision = 0.0;
    let mut fit = 0.0;
    if !active.is_empty() {
        let q = design.q();
        let mut precision = design.gram(active);
        for (slot, &column) in active.iter().enumerate() {
            let variance = if column < q { priors.w_fixed } else { w };
            precision[(slot, slot)] += 1.0 / variance;
            log_prior_det += variance.ln();
        }
        let h = DVector::from_iterator(active.len(), active.iter().map(|c| design.xty()[(*c, l)]));
        let chol = cholesky(precision, "hess-precision")?;
        fit = h.dot(&chol.solve(&h));
        log_det_precision = log_det(&chol);
    }
    let resid = (yty - fit).max(0.0);
    Ok(-0.5 * n * LN_2PI - 0.5 * log_prior_det - 0.5 * log_det_precision
        + inv_gamma_collapse(priors.a_sigma, priors.b_sigma, 0.5 * n, 0.5 * resid))
}

/// HESS chain state.
#[derive(Debug, Clone)]
pub struct HessModel {
    design: Arc<Design>,
    priors: PriorConfig,
    proposals_per_outcome: usize,
    indicators: IndicatorState,
    proposal: AdaptiveProposal,
    w: f64,
    w_scale: AdaptiveScale,
    marginals: Vec<f64>,
    log_likelihood: f64,
}

impl HessModel {
    fn active(&self, l: usize) -> Vec<usize> {
        self.design
            .active_columns((0..self.design.p()).map(|j| self.indicators.is_active(j, l)))
    }

    /// Cached per-outcome log marginals.
    pub fn marginals(&self) -> &[f64] {
        &self.marginals
    }

    fn all_marginals(&self, w: f64) -> Result<Vec<f64>, SsurError> {
        (0..self.design.s())
            .map(|l| outcome_log_marginal(&self.design, &self.priors, l, &self.active(l), w))
            .collect()
    }
}

impl ChainModel for HessModel {
    const KIND: ModelKind = ModelKind::Hess;

    fn build(design: Arc<Design>, settings: &SamplerSettings) -> Self {
        let (p, s) = (design.p(), design.s());
        let priors = settings.priors.clone();
        let w = if priors.a_w > 1.0 {
            priors.b_w / (priors.a_w - 1.0)
        } else {
            priors.b_w
        };
        Self {
            indicators: IndicatorState::new(p, s, settings.gamma_prior, &priors),
            proposal: AdaptiveProposal::new(settings.gamma_sampler, p, s, &settings.moves),
            w,
            w_scale: AdaptiveScale::default(),
            marginals: vec![f64::NEG_INFINITY; s],
            log_likelihood: f64::NEG_INFINITY,
            proposals_per_outcome: settings.moves.proposals_per_outcome,
            priors,
            design,
        }
    }

    fn indicators(&self) -> &IndicatorState {
        &self.indicators
    }

    fn indicators_mut(&mut self) -> &mut IndicatorState {
        &mut self.indicators
    }

    fn set_coefficients(&mut self, _beta: &DMatrix<f64>) -> Result<(), SsurError> {
        Ok(())
    }

    fn initial_draw(&mut self, _ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), SsurError> {
        self.marginals = self.all_marginals(self.w)?;
        self.log_likelihood = self.marginals.iter().sum();
        Ok(())
    }

    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn sweep(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        self.indicators.update_propensities(ctx.rng)?;
        let temperature = ctx.temperature;
        for l in 0..self.design.s() {
            let (design, priors, w) = (&self.design, &self.priors, self.w);
            self.indicators.update_column(
                &mut self.proposal,
                l,
                self.proposals_per_outcome,
                ctx.rng,
                |column| {
                    let active = design.active_columns(column.iter().map(|g| *g == 1));
                    outcome_log_marginal(design, priors, l, &active, w).map(|m| m / temperature)
                },
            )?;
            let active = self.active(l);
            self.marginals[l] =
                outcome_log_marginal(&self.design, &self.priors, l, &active, self.w)?;
        }
        let mut scale = self.w_scale.clone();
        let w = scale.log_scale_step(self.w, ctx.rng, |w| {
            if !(w > 0.0) {
                return Ok(f64::NEG_INFINITY);
            }
            let likelihood: f64 = self.all_marginals(w)?.iter().sum();
            Ok(log_inv_gamma(w, self.priors.a_w, self.priors.b_w) + likelihood / temperature)
        })?;
        self.w_scale = scale;
        self.w = w;
        self.refresh()
    }

    fn state(&self) -> ChainState<'_> {
        ChainState {
            gamma: self.indicators.gamma(),
            o: self.indicators.o(),
            pi: self.indicators.pi(),
            w: self.w,
            beta: None,
            sigma_rho: None,
            graph: None,
            tau: None,
            eta: None,
        }
    }

    fn log_components(&self) -> LogComponents {
        LogComponents {
            tau: None,
            eta: None,
            jt: None,
            sigma_rho: None,
            o: self.indicators.log_prior_o(),
            pi: self.indicators.log_prior_pi(),
            gamma: self.indicators.log_prior_gamma(),
            w: log_inv_gamma(self.w, self.priors.a_w, self.priors.b_w),
            beta: None,
            likelihood: self.log_likelihood,
        }
    }

    fn proposal_variances(&self) -> ProposalVariances {
        let (o, pi) = self.indicators.variances();
        ProposalVariances {
            o,
            pi,
            w: Some(self.w_scale.variance()),
            tau: None,
        }
    }

    fn gamma_acceptance_rate(&self) -> f64 {
        self.proposal.acceptance_rate()
    }
}
