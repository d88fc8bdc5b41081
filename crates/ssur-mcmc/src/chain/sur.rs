//! SUR model: explicit coefficients and a residual covariance factorised
//! as `Σ⁻¹ = Uᵀ D⁻¹ U` over the outcome graph.

use std::sync::Arc;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::Rng;
use ssur_core::linalg::{cholesky, log_det, whiten_draw};
use ssur_core::SsurError;

use super::adapt::{draw_beta, draw_inv_gamma, standard_normal, AdaptiveScale};
use super::hotspot::IndicatorState;
use super::{ChainModel, ChainState, LogComponents, ProposalVariances, SweepContext};
use crate::config::{CovarianceKind, ModelKind, PriorConfig, SamplerSettings};
use crate::density::{
    inv_gamma_collapse, log_bernoulli, log_beta, log_gamma_rate, log_inv_gamma, log_normal0,
    LN_2PI,
};
use crate::design::Design;
use crate::proposal::{AcceptanceWindow, AdaptiveProposal};

/// Precision-weighted Gaussian full conditional of one coefficient column.
struct ColumnPosterior {
    active: Vec<usize>,
    chol: Option<Cholesky<f64, Dyn>>,
    h: DVector<f64>,
    log_marginal: f64,
}

/// Collapsed terms of one outcome's coefficients over a set of active
/// predictor columns. `a` and `xt_b` are the untempered precision scalar and
/// the projected residual target.
fn column_posterior(
    design: &Design,
    active: Vec<usize>,
    a: f64,
    xt_b: &DVector<f64>,
    temperature: f64,
    w: f64,
    w_fixed: f64,
) -> Result<ColumnPosterior, SsurError> {
    if active.is_empty() {
        return Ok(ColumnPosterior {
            active,
            chol: None,
            h: DVector::zeros(0),
            log_marginal: 0.0,
        });
    }
    let q = design.q();
    let mut precision = design.gram(&active) * (a / temperature);
    let mut log_prior_det = 0.0;
    for (slot, &column) in active.iter().enumerate() {
        let variance = if column < q { w_fixed } else { w };
        precision[(slot, slot)] += 1.0 / variance;
        log_prior_det += variance.ln();
    }
    let h = DVector::from_iterator(active.len(), active.iter().map(|c| xt_b[*c] / temperature));
    let chol = cholesky(precision, "coefficient-precision")?;
    let mean = chol.solve(&h);
    let log_marginal = -0.5 * log_prior_det - 0.5 * log_det(&chol) + 0.5 * h.dot(&mean);
    Ok(ColumnPosterior {
        active,
        chol: Some(chol),
        h,
        log_marginal,
    })
}

/// SUR chain state.
#[derive(Debug, Clone)]
pub struct SurModel {
    design: Arc<Design>,
    covariance: CovarianceKind,
    priors: PriorConfig,
    proposals_per_outcome: usize,
    indicators: IndicatorState,
    proposal: AdaptiveProposal,
    beta: DMatrix<f64>,
    sigma_rho: DMatrix<f64>,
    graph: DMatrix<u8>,
    w: f64,
    tau: f64,
    eta: f64,
    tau_scale: AdaptiveScale,
    jt_window: AcceptanceWindow,
    residuals: DMatrix<f64>,
    log_likelihood: f64,
}

impl SurModel {
    /// Parents of outcome `l`: earlier outcomes adjacent in the graph.
    pub fn parents(&self, l: usize) -> Vec<usize> {
        (0..l).filter(|k| self.graph[(l, *k)] == 1).collect()
    }

    /// Covariance factorisation in use.
    pub fn covariance(&self) -> CovarianceKind {
        self.covariance
    }

    fn refresh_residuals(&mut self) {
        self.residuals = self.design.y() - self.design.x() * &self.beta;
    }

    fn refresh_residual_column(&mut self, l: usize) {
        let fitted = self.design.x() * self.beta.column(l);
        let column = self.design.y().column(l) - fitted;
        self.residuals.set_column(l, &column);
    }

    /// Innovation residuals `u_l = e_l − Σ_k rho_lk e_k`.
    fn innovations(&self) -> DMatrix<f64> {
        let mut innovations = self.residuals.clone();
        for l in 1..self.design.s() {
            for k in self.parents(l) {
                let rho = self.sigma_rho[(l, k)];
                let shifted = innovations.column(l) - self.residuals.column(k) * rho;
                innovations.set_column(l, &shifted);
            }
        }
        innovations
    }

    /// Log-likelihood of the current state under either factorisation.
    pub fn evaluate_likelihood(&self, strategy: CovarianceKind) -> Result<f64, SsurError> {
        let n = self.design.n() as f64;
        let s = self.design.s();
        match strategy {
            CovarianceKind::Sparse => {
                let innovations = self.innovations();
                Ok((0..s)
                    .map(|l| {
                        let variance = self.sigma_rho[(l, l)];
                        -0.5 * n * (LN_2PI + variance.ln())
                            - innovations.column(l).norm_squared() / (2.0 * variance)
                    })
                    .sum())
            }
            CovarianceKind::Dense => {
                let mut unit = DMatrix::<f64>::identity(s, s);
                for l in 1..s {
                    for k in self.parents(l) {
                        unit[(l, k)] = -self.sigma_rho[(l, k)];
                    }
                }
                let inv_d = DMatrix::from_diagonal(&DVector::from_fn(s, |l, _| {
                    1.0 / self.sigma_rho[(l, l)]
                }));
                let omega = unit.transpose() * inv_d * &unit;
                let chol = cholesky(omega.clone(), "residual-precision")?;
                let scatter = self.residuals.tr_mul(&self.residuals);
                let trace = omega.component_mul(&scatter).sum();
                Ok(-0.5 * n * s as f64 * LN_2PI + 0.5 * n * log_det(&chol) - 0.5 * trace)
            }
        }
    }

    /// Untempered precision scalar and `Xᵀ b` target for outcome `l`'s
    /// coefficients given everything else.
    fn column_terms(&self, l: usize, innovations: &DMatrix<f64>) -> (f64, DVector<f64>) {
        let fitted = self.design.x() * self.beta.column(l);
        let variance = self.sigma_rho[(l, l)];
        let mut a = 1.0 / variance;
        let mut target = (innovations.column(l) + &fitted) / variance;
        for m in (l + 1)..self.design.s() {
            if self.graph[(m, l)] == 0 {
                continue;
            }
            let weight = -self.sigma_rho[(m, l)];
            let variance = self.sigma_rho[(m, m)];
            let partial = innovations.column(m) + &fitted * weight;
            a += weight * weight / variance;
            target += partial * (weight / variance);
        }
        (a, self.design.x().tr_mul(&target))
    }

    fn posterior_for(
        &self,
        l: usize,
        a: f64,
        xt_b: &DVector<f64>,
        temperature: f64,
    ) -> Result<ColumnPosterior, SsurError> {
        let active = self
            .design
            .active_columns((0..self.design.p()).map(|j| self.indicators.is_active(j, l)));
        column_posterior(&self.design, active, a, xt_b, temperature, self.w, self.priors.w_fixed)
    }

    fn draw_column(
        &mut self,
        l: usize,
        posterior: ColumnPosterior,
        ctx: &mut SweepContext<'_>,
    ) -> Result<(), SsurError> {
        let mut column = DVector::zeros(self.beta.nrows());
        if let Some(chol) = posterior.chol {
            let mean = chol.solve(&posterior.h);
            let noise = whiten_draw(&chol, &standard_normal(posterior.active.len(), ctx.rng))?;
            for (slot, &row) in posterior.active.iter().enumerate() {
                column[row] = mean[slot] + noise[slot];
            }
        }
        self.beta.set_column(l, &column);
        self.refresh_residual_column(l);
        Ok(())
    }

    /// Indicator moves for outcome `l` collapsed over its coefficients,
    /// followed by a coefficient draw.
    fn update_outcome(&mut self, l: usize, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        let innovations = self.innovations();
        let (a, xt_b) = self.column_terms(l, &innovations);
        let temperature = ctx.temperature;
        let (w, w_fixed) = (self.w, self.priors.w_fixed);
        let design = &self.design;
        self.indicators.update_column(
            &mut self.proposal,
            l,
            self.proposals_per_outcome,
            ctx.rng,
            |column| {
                let active = design.active_columns(column.iter().map(|g| *g == 1));
                column_posterior(design, active, a, &xt_b, temperature, w, w_fixed)
                    .map(|posterior| posterior.log_marginal)
            },
        )?;
        let posterior = self.posterior_for(l, a, &xt_b, temperature)?;
        self.draw_column(l, posterior, ctx)
    }

    /// Collapsed covariance terms of outcome `l` for a parent set.
    fn covariance_terms(
        &self,
        l: usize,
        parents: &[usize],
        temperature: f64,
    ) -> Result<(Option<Cholesky<f64, Dyn>>, DVector<f64>, f64), SsurError> {
        let e = self.residuals.column(l);
        let ete = e.norm_squared() / temperature;
        if parents.is_empty() {
            return Ok((None, DVector::zeros(0), ete));
        }
        let z = self.residuals.select_columns(parents.iter());
        let mut precision = z.tr_mul(&z) / temperature;
        for d in 0..parents.len() {
            precision[(d, d)] += self.tau;
        }
        let rhs = z.tr_mul(&e) / temperature;
        let chol = cholesky(precision, "covariance-precision")?;
        let mean = chol.solve(&rhs);
        let resid = (ete - mean.dot(&rhs)).max(0.0);
        Ok((Some(chol), mean, resid))
    }

    /// Gibbs draw of `sigma²_l` and `rho_l` given the current graph.
    fn update_covariance_row(
        &mut self,
        l: usize,
        ctx: &mut SweepContext<'_>,
    ) -> Result<(), SsurError> {
        let parents = self.parents(l);
        let (chol, mean, resid) = self.covariance_terms(l, &parents, ctx.temperature)?;
        let n_eff = self.design.n() as f64 / ctx.temperature;
        let variance = draw_inv_gamma(
            self.priors.a_sigma + 0.5 * n_eff,
            0.5 * self.tau + 0.5 * resid,
            ctx.rng,
        )?;
        self.sigma_rho[(l, l)] = variance;
        for k in 0..l {
            self.sigma_rho[(l, k)] = 0.0;
            self.sigma_rho[(k, l)] = 0.0;
        }
        if let Some(chol) = chol {
            let noise = whiten_draw(&chol, &standard_normal(parents.len(), ctx.rng))?;
            let rho = mean + noise * variance.sqrt();
            for (slot, &k) in parents.iter().enumerate() {
                self.sigma_rho[(l, k)] = rho[slot];
                self.sigma_rho[(k, l)] = rho[slot];
            }
        }
        Ok(())
    }

    /// Log marginal of outcome `l`'s innovation with `(sigma², rho)`
    /// integrated out, up to terms shared by every parent set.
    fn collapsed_graph_marginal(
        &self,
        l: usize,
        parents: &[usize],
        temperature: f64,
    ) -> Result<f64, SsurError> {
        let (chol, _, resid) = self.covariance_terms(l, parents, temperature)?;
        let n_eff = self.design.n() as f64 / temperature;
        let log_det_precision = chol.as_ref().map(log_det).unwrap_or(0.0);
        let scale = 0.5 * self.tau;
        Ok(-0.5 * n_eff * LN_2PI + 0.5 * parents.len() as f64 * self.tau.ln()
            - 0.5 * log_det_precision
            + inv_gamma_collapse(self.priors.a_sigma, scale, 0.5 * n_eff, 0.5 * resid))
    }

    /// One edge-flip move on the outcome graph.
    fn graph_move(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        let s = self.design.s();
        if s < 2 {
            return Ok(());
        }
        let pairs = s * (s - 1) / 2;
        let mut pick = ctx.rng.gen_range(0..pairs);
        let mut l = 1;
        while pick >= l {
            pick -= l;
            l += 1;
        }
        let k = pick;
        let current = self.parents(l);
        let was_edge = self.graph[(l, k)] == 1;
        let proposed: Vec<usize> = if was_edge {
            current.iter().copied().filter(|m| *m != k).collect()
        } else {
            let mut parents = current.clone();
            parents.push(k);
            parents.sort_unstable();
            parents
        };
        let log_alpha = self.collapsed_graph_marginal(l, &proposed, ctx.temperature)?
            - self.collapsed_graph_marginal(l, &current, ctx.temperature)?
            + log_bernoulli(!was_edge, self.eta)
            - log_bernoulli(was_edge, self.eta);
        let accepted = ctx.rng.log_uniform() < log_alpha;
        self.jt_window.push(accepted);
        if accepted {
            let value = u8::from(!was_edge);
            self.graph[(l, k)] = value;
            self.graph[(k, l)] = value;
            self.update_covariance_row(l, ctx)?;
        }
        Ok(())
    }

    fn update_w(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        let q = self.design.q();
        let mut count = 0.0;
        let mut squares = 0.0;
        for l in 0..self.design.s() {
            for j in 0..self.design.p() {
                if self.indicators.is_active(j, l) {
                    count += 1.0;
                    squares += self.beta[(q + j, l)].powi(2);
                }
            }
        }
        self.w = draw_inv_gamma(
            self.priors.a_w + 0.5 * count,
            self.priors.b_w + 0.5 * squares,
            ctx.rng,
        )?;
        Ok(())
    }

    fn covariance_log_prior(&self, tau: f64) -> f64 {
        let mut total = 0.0;
        for l in 0..self.design.s() {
            let variance = self.sigma_rho[(l, l)];
            total += log_inv_gamma(variance, self.priors.a_sigma, 0.5 * tau);
            for k in self.parents(l) {
                total += log_normal0(self.sigma_rho[(l, k)], variance / tau);
            }
        }
        total
    }

    fn update_tau(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        let mut scale = self.tau_scale.clone();
        let tau = scale.log_scale_step(self.tau, ctx.rng, |tau| {
            Ok(log_gamma_rate(tau, self.priors.a_tau, self.priors.b_tau)
                + self.covariance_log_prior(tau))
        })?;
        self.tau_scale = scale;
        self.tau = tau;
        Ok(())
    }

    fn update_eta(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        let s = self.design.s();
        let pairs = (s * s.saturating_sub(1) / 2) as f64;
        let edges = (1..s)
            .flat_map(|l| (0..l).map(move |k| (l, k)))
            .filter(|(l, k)| self.graph[(*l, *k)] == 1)
            .count() as f64;
        self.eta = draw_beta(
            self.priors.a_eta + edges,
            self.priors.b_eta + pairs - edges,
            ctx.rng,
        )?;
        Ok(())
    }

    fn graph_log_prior(&self) -> f64 {
        let s = self.design.s();
        (1..s)
            .flat_map(|l| (0..l).map(move |k| (l, k)))
            .map(|(l, k)| log_bernoulli(self.graph[(l, k)] == 1, self.eta))
            .sum()
    }

    fn beta_log_prior(&self) -> f64 {
        let q = self.design.q();
        let mut total = 0.0;
        for l in 0..self.design.s() {
            for row in 0..q {
                total += log_normal0(self.beta[(row, l)], self.priors.w_fixed);
            }
            for j in 0..self.design.p() {
                if self.indicators.is_active(j, l) {
                    total += log_normal0(self.beta[(q + j, l)], self.w);
                }
            }
        }
        total
    }
}

impl ChainModel for SurModel {
    const KIND: ModelKind = ModelKind::Sur;

    fn build(design: Arc<Design>, settings: &SamplerSettings) -> Self {
        let (n, q, p, s) = (design.n(), design.q(), design.p(), design.s());
        let priors = settings.priors.clone();
        let graph = match settings.covariance {
            CovarianceKind::Sparse => DMatrix::zeros(s, s),
            CovarianceKind::Dense => DMatrix::from_fn(s, s, |a, b| u8::from(a != b)),
        };
        let w = if priors.a_w > 1.0 {
            priors.b_w / (priors.a_w - 1.0)
        } else {
            priors.b_w
        };
        Self {
            indicators: IndicatorState::new(p, s, settings.gamma_prior, &priors),
            proposal: AdaptiveProposal::new(settings.gamma_sampler, p, s, &settings.moves),
            beta: DMatrix::zeros(q + p, s),
            sigma_rho: DMatrix::identity(s, s),
            graph,
            w,
            tau: 1.0,
            eta: priors.a_eta / (priors.a_eta + priors.b_eta),
            tau_scale: AdaptiveScale::default(),
            jt_window: AcceptanceWindow::new(settings.moves.acceptance_window),
            residuals: DMatrix::zeros(n, s),
            log_likelihood: f64::NEG_INFINITY,
            covariance: settings.covariance,
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

    fn set_coefficients(&mut self, beta: &DMatrix<f64>) -> Result<(), SsurError> {
        if beta.shape() != self.beta.shape() {
            return Err(SsurError::DataShape(
                ssur_core::ErrorInfo::new("beta-shape", "initial coefficients have the wrong shape")
                    .with_context("rows", beta.nrows())
                    .with_context("cols", beta.ncols()),
            ));
        }
        let q = self.design.q();
        self.beta = DMatrix::from_fn(beta.nrows(), beta.ncols(), |row, l| {
            if row < q || self.indicators.is_active(row - q, l) {
                beta[(row, l)]
            } else {
                0.0
            }
        });
        self.refresh_residuals();
        Ok(())
    }

    fn initial_draw(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        self.refresh_residuals();
        for l in 0..self.design.s() {
            self.update_covariance_row(l, ctx)?;
        }
        for l in 0..self.design.s() {
            let innovations = self.innovations();
            let (a, xt_b) = self.column_terms(l, &innovations);
            let posterior = self.posterior_for(l, a, &xt_b, ctx.temperature)?;
            self.draw_column(l, posterior, ctx)?;
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), SsurError> {
        self.refresh_residuals();
        self.log_likelihood = self.evaluate_likelihood(self.covariance)?;
        Ok(())
    }

    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn sweep(&mut self, ctx: &mut SweepContext<'_>) -> Result<(), SsurError> {
        self.indicators.update_propensities(ctx.rng)?;
        for l in 0..self.design.s() {
            self.update_outcome(l, ctx)?;
        }
        for l in 0..self.design.s() {
            self.update_covariance_row(l, ctx)?;
        }
        self.update_w(ctx)?;
        self.update_tau(ctx)?;
        if self.covariance == CovarianceKind::Sparse {
            self.update_eta(ctx)?;
            if ctx.graph_active {
                self.graph_move(ctx)?;
            }
        }
        self.refresh()
    }

    fn state(&self) -> ChainState<'_> {
        ChainState {
            gamma: self.indicators.gamma(),
            o: self.indicators.o(),
            pi: self.indicators.pi(),
            w: self.w,
            beta: Some(&self.beta),
            sigma_rho: Some(&self.sigma_rho),
            graph: Some(&self.graph),
            tau: Some(self.tau),
            eta: Some(self.eta),
        }
    }

    fn log_components(&self) -> LogComponents {
        LogComponents {
            tau: Some(log_gamma_rate(self.tau, self.priors.a_tau, self.priors.b_tau)),
            eta: Some(log_beta(self.eta, self.priors.a_eta, self.priors.b_eta)),
            jt: Some(self.graph_log_prior()),
            sigma_rho: Some(self.covariance_log_prior(self.tau)),
            o: self.indicators.log_prior_o(),
            pi: self.indicators.log_prior_pi(),
            gamma: self.indicators.log_prior_gamma(),
            w: log_inv_gamma(self.w, self.priors.a_w, self.priors.b_w),
            beta: Some(self.beta_log_prior()),
            likelihood: self.log_likelihood,
        }
    }

    fn proposal_variances(&self) -> ProposalVariances {
        let (o, pi) = self.indicators.variances();
        ProposalVariances {
            o,
            pi,
            w: None,
            tau: Some(self.tau_scale.variance()),
        }
    }

    fn gamma_acceptance_rate(&self) -> f64 {
        self.proposal.acceptance_rate()
    }

    fn jt_acceptance_rate(&self) -> f64 {
        self.jt_window.rate()
    }
}
