//! Inclusion indicators and the hotspot prior `omega_jl = o_j * pi_l`.

use nalgebra::{DMatrix, DVector};
use ssur_core::errors::ErrorInfo;
use ssur_core::{RngHandle, SsurError};

use super::adapt::AdaptiveScale;
use crate::config::{GammaPriorKind, PriorConfig};
use crate::density::{log_bernoulli, log_beta, log_gamma_rate};
use crate::proposal::AdaptiveProposal;

/// Indicator matrix plus the propensities that set its prior.
#[derive(Debug, Clone)]
pub struct IndicatorState {
    gamma: DMatrix<u8>,
    o: DVector<f64>,
    pi: DVector<f64>,
    prior: GammaPriorKind,
    a_o: f64,
    b_o: f64,
    a_pi: f64,
    b_pi: f64,
    o_scale: AdaptiveScale,
    pi_scale: AdaptiveScale,
}

impl IndicatorState {
    /// All indicators off, `o` at its prior mean and `pi` at one.
    pub fn new(p: usize, s: usize, prior: GammaPriorKind, priors: &PriorConfig) -> Self {
        let b_o = priors.b_o_for(p);
        Self {
            gamma: DMatrix::zeros(p, s),
            o: DVector::from_element(p, priors.a_o / (priors.a_o + b_o)),
            pi: DVector::from_element(s, 1.0),
            prior,
            a_o: priors.a_o,
            b_o,
            a_pi: priors.a_pi,
            b_pi: priors.b_pi,
            o_scale: AdaptiveScale::default(),
            pi_scale: AdaptiveScale::default(),
        }
    }

    /// Replaces the indicator matrix.
    pub fn set_gamma(&mut self, gamma: &DMatrix<u8>) -> Result<(), SsurError> {
        if gamma.shape() != self.gamma.shape() {
            return Err(SsurError::DataShape(
                ErrorInfo::new("gamma-shape", "initial indicators have the wrong shape")
                    .with_context("rows", gamma.nrows())
                    .with_context("cols", gamma.ncols())
                    .with_context("expected_rows", self.gamma.nrows())
                    .with_context("expected_cols", self.gamma.ncols()),
            ));
        }
        if gamma.iter().any(|g| *g > 1) {
            return Err(SsurError::DataShape(ErrorInfo::new(
                "gamma-not-binary",
                "indicators must be 0 or 1",
            )));
        }
        self.gamma.copy_from(gamma);
        Ok(())
    }

    /// Indicator matrix (p×s).
    pub fn gamma(&self) -> &DMatrix<u8> {
        &self.gamma
    }

    /// Per-predictor propensities.
    pub fn o(&self) -> &DVector<f64> {
        &self.o
    }

    /// Per-outcome propensities.
    pub fn pi(&self) -> &DVector<f64> {
        &self.pi
    }

    /// Proposal variances of the `o` and `pi` random walks.
    pub fn variances(&self) -> (f64, f64) {
        (self.o_scale.variance(), self.pi_scale.variance())
    }

    /// Prior inclusion probability of cell `(j, l)`.
    pub fn omega(&self, j: usize, l: usize) -> f64 {
        self.o[j] * self.pi[l]
    }

    /// Whether cell `(j, l)` is switched on.
    pub fn is_active(&self, j: usize, l: usize) -> bool {
        self.gamma[(j, l)] == 1
    }

    fn row_log_prior(&self, j: usize, o: f64) -> f64 {
        let pi_max = self.pi.max();
        if !(o > 0.0 && o < 1.0) || o * pi_max >= 1.0 {
            return f64::NEG_INFINITY;
        }
        let indicators: f64 = (0..self.gamma.ncols())
            .map(|l| log_bernoulli(self.is_active(j, l), o * self.pi[l]))
            .sum();
        log_beta(o, self.a_o, self.b_o) + indicators
    }

    fn column_log_prior(&self, l: usize, pi: f64) -> f64 {
        let o_max = self.o.max();
        if !(pi > 0.0) || pi * o_max >= 1.0 {
            return f64::NEG_INFINITY;
        }
        let indicators: f64 = (0..self.gamma.nrows())
            .map(|j| log_bernoulli(self.is_active(j, l), self.o[j] * pi))
            .sum();
        log_gamma_rate(pi, self.a_pi, self.b_pi) + indicators
    }

    /// MH updates of every `o_j`, then (hotspot prior only) every `pi_l`.
    pub fn update_propensities(&mut self, rng: &mut RngHandle) -> Result<(), SsurError> {
        for j in 0..self.o.len() {
            let mut scale = self.o_scale.clone();
            let next = scale.log_scale_step(self.o[j], rng, |o| Ok(self.row_log_prior(j, o)))?;
            self.o_scale = scale;
            self.o[j] = next;
        }
        if self.prior == GammaPriorKind::Hierarchical {
            return Ok(());
        }
        for l in 0..self.pi.len() {
            let mut scale = self.pi_scale.clone();
            let next =
                scale.log_scale_step(self.pi[l], rng, |pi| Ok(self.column_log_prior(l, pi)))?;
            self.pi_scale = scale;
            self.pi[l] = next;
        }
        Ok(())
    }

    /// Log prior of `o`.
    pub fn log_prior_o(&self) -> f64 {
        self.o.iter().map(|o| log_beta(*o, self.a_o, self.b_o)).sum()
    }

    /// Log prior of `pi`; zero when `pi` is pinned.
    pub fn log_prior_pi(&self) -> f64 {
        match self.prior {
            GammaPriorKind::Hierarchical => 0.0,
            GammaPriorKind::Hotspot => self
                .pi
                .iter()
                .map(|pi| log_gamma_rate(*pi, self.a_pi, self.b_pi))
                .sum(),
        }
    }

    /// Log prior of the indicator matrix given `o` and `pi`.
    pub fn log_prior_gamma(&self) -> f64 {
        let mut total = 0.0;
        for l in 0..self.gamma.ncols() {
            for j in 0..self.gamma.nrows() {
                total += log_bernoulli(self.is_active(j, l), self.omega(j, l));
            }
        }
        total
    }

    /// Runs `proposals` MH indicator moves on column `outcome`.
    ///
    /// `log_marginal` maps a candidate column to its tempered log marginal
    /// likelihood.
    pub fn update_column<F>(
        &mut self,
        proposal: &mut AdaptiveProposal,
        outcome: usize,
        proposals: usize,
        rng: &mut RngHandle,
        mut log_marginal: F,
    ) -> Result<(), SsurError>
    where
        F: FnMut(&[u8]) -> Result<f64, SsurError>,
    {
        if self.gamma.nrows() == 0 {
            return Ok(());
        }
        let mut column: Vec<u8> = self.gamma.column(outcome).iter().copied().collect();
        let mut current = log_marginal(&column)?;
        for _ in 0..proposals {
            let draw = proposal.propose(&self.gamma, outcome, rng)?;
            let mut candidate = column.clone();
            let mut prior_delta = 0.0;
            for &row in &draw.rows {
                let omega = self.omega(row, outcome);
                let was_on = candidate[row] == 1;
                candidate[row] ^= 1;
                prior_delta += log_bernoulli(!was_on, omega) - log_bernoulli(was_on, omega);
            }
            let proposed = log_marginal(&candidate)?;
            let log_alpha = proposed - current + prior_delta + draw.log_q_ratio;
            let accepted = rng.log_uniform() < log_alpha;
            if accepted {
                for &row in &draw.rows {
                    self.gamma[(row, outcome)] = candidate[row];
                }
                column = candidate;
                current = proposed;
            }
            proposal.record(&draw, outcome, &self.gamma, accepted);
        }
        Ok(())
    }
}
