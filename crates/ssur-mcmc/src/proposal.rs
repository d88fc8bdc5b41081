use std::collections::VecDeque;

use nalgebra::DMatrix;
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::Beta;
use serde::{Deserialize, Serialize};
use ssur_core::errors::ErrorInfo;
use ssur_core::{RngHandle, SsurError};

use crate::config::{GammaSamplerKind, MoveConfig};

/// Lower bound on the probability of proposing any single cell.
const BANDIT_EPSILON: f64 = 1e-3;

/// Initial Beta parameters of every bandit arm.
const BANDIT_PRIOR: f64 = 0.5;

/// A set of indicator rows to flip within one outcome column, with the log
/// ratio `ln q(reverse) − ln q(forward)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Selectable predictor rows to flip.
    pub rows: Vec<usize>,
    /// Log proposal ratio entering the MH acceptance.
    pub log_q_ratio: f64,
}

/// Fixed-length trailing window of accept/reject decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceWindow {
    capacity: usize,
    decisions: VecDeque<bool>,
}

impl AcceptanceWindow {
    /// Empty window retaining the last `capacity` decisions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            decisions: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Records one decision, evicting the oldest when full.
    pub fn push(&mut self, accepted: bool) {
        if self.decisions.len() == self.capacity {
            self.decisions.pop_front();
        }
        self.decisions.push_back(accepted);
    }

    /// Fraction of accepted decisions in the window; 0 when empty.
    pub fn rate(&self) -> f64 {
        if self.decisions.is_empty() {
            return 0.0;
        }
        let accepted = self.decisions.iter().filter(|d| **d).count();
        accepted as f64 / self.decisions.len() as f64
    }

    /// Decisions currently held.
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// True before the first decision.
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Thompson-sampling proposal over the cells of one outcome column.
#[derive(Debug, Clone)]
pub struct BanditProposal {
    alpha: DMatrix<f64>,
    beta: DMatrix<f64>,
    increment: f64,
    memory: f64,
}

impl BanditProposal {
    fn new(p: usize, s: usize, increment: f64, memory: f64) -> Self {
        Self {
            alpha: DMatrix::from_element(p, s, BANDIT_PRIOR),
            beta: DMatrix::from_element(p, s, BANDIT_PRIOR),
            increment,
            memory,
        }
    }

    /// Reward accumulators `(alpha, beta)` of one cell.
    pub fn arm(&self, row: usize, outcome: usize) -> (f64, f64) {
        (self.alpha[(row, outcome)], self.beta[(row, outcome)])
    }

    fn propose(
        &self,
        gamma: &DMatrix<u8>,
        outcome: usize,
        rng: &mut RngHandle,
    ) -> Result<Proposal, SsurError> {
        let p = gamma.nrows();
        let mut weights = Vec::with_capacity(p);
        for j in 0..p {
            let arm = Beta::new(self.alpha[(j, outcome)], self.beta[(j, outcome)]).map_err(|err| {
                SsurError::Numerical(
                    ErrorInfo::new("bandit-arm", err.to_string())
                        .with_context("row", j)
                        .with_context("outcome", outcome),
                )
            })?;
            let theta: f64 = rng.sample(arm);
            let wrong = if gamma[(j, outcome)] == 1 {
                1.0 - theta
            } else {
                theta
            };
            weights.push(wrong.clamp(BANDIT_EPSILON, 1.0 - BANDIT_EPSILON));
        }
        let total: f64 = weights.iter().sum();
        let index = WeightedIndex::new(&weights).map_err(|err| {
            SsurError::Numerical(
                ErrorInfo::new("bandit-weights", err.to_string()).with_context("outcome", outcome),
            )
        })?;
        let row = rng.sample(&index);
        let forward = weights[row];
        let reverse = 1.0 - forward;
        let reverse_total = total - forward + reverse;
        Ok(Proposal {
            rows: vec![row],
            log_q_ratio: (reverse / reverse_total).ln() - (forward / total).ln(),
        })
    }

    fn absorb(&mut self, row: usize, outcome: usize, value: u8) {
        let on = f64::from(value);
        let alpha = &mut self.alpha[(row, outcome)];
        *alpha += self.increment * on;
        let beta = &mut self.beta[(row, outcome)];
        *beta += self.increment * (1.0 - on);
        let mass = self.alpha[(row, outcome)] + self.beta[(row, outcome)];
        if mass > self.memory {
            let scale = self.memory / mass;
            self.alpha[(row, outcome)] *= scale;
            self.beta[(row, outcome)] *= scale;
        }
    }
}

/// Uniform random-subset flip proposal.
#[derive(Debug, Clone)]
pub struct Mc3Proposal {
    subset: usize,
}

impl Mc3Proposal {
    fn propose(&self, p: usize, rng: &mut RngHandle) -> Proposal {
        let amount = self.subset.min(p);
        let mut rows = rand::seq::index::sample(rng.inner_mut(), p, amount).into_vec();
        rows.sort_unstable();
        Proposal {
            rows,
            log_q_ratio: 0.0,
        }
    }
}

/// Indicator proposal used by a chain, chosen once at construction.
#[derive(Debug, Clone)]
pub enum GammaProposal {
    /// Adaptive Thompson-sampling proposal.
    Bandit(BanditProposal),
    /// Symmetric uniform proposal.
    Mc3(Mc3Proposal),
}

/// Proposal plus its acceptance bookkeeping.
#[derive(Debug, Clone)]
pub struct AdaptiveProposal {
    kind: GammaProposal,
    window: AcceptanceWindow,
}

impl AdaptiveProposal {
    /// Builds the proposal for a p×s indicator matrix.
    pub fn new(kind: GammaSamplerKind, p: usize, s: usize, moves: &MoveConfig) -> Self {
        let kind = match kind {
            GammaSamplerKind::Bandit => GammaProposal::Bandit(BanditProposal::new(
                p,
                s,
                moves.bandit_increment,
                moves.bandit_memory,
            )),
            GammaSamplerKind::Mc3 => GammaProposal::Mc3(Mc3Proposal {
                subset: moves.mc3_subset,
            }),
        };
        Self {
            kind,
            window: AcceptanceWindow::new(moves.acceptance_window),
        }
    }

    /// Draws the rows to flip in column `outcome`. `gamma` must have at
    /// least one row.
    pub fn propose(
        &self,
        gamma: &DMatrix<u8>,
        outcome: usize,
        rng: &mut RngHandle,
    ) -> Result<Proposal, SsurError> {
        match &self.kind {
            GammaProposal::Bandit(bandit) => bandit.propose(gamma, outcome, rng),
            GammaProposal::Mc3(mc3) => Ok(mc3.propose(gamma.nrows(), rng)),
        }
    }

    /// Feeds the MH decision back; `gamma` is the state after the decision.
    pub fn record(
        &mut self,
        proposal: &Proposal,
        outcome: usize,
        gamma: &DMatrix<u8>,
        accepted: bool,
    ) {
        self.window.push(accepted);
        if let GammaProposal::Bandit(bandit) = &mut self.kind {
            for &row in &proposal.rows {
                bandit.absorb(row, outcome, gamma[(row, outcome)]);
            }
        }
    }

    /// Trailing acceptance rate.
    pub fn acceptance_rate(&self) -> f64 {
        self.window.rate()
    }

    /// Underlying proposal variant.
    pub fn kind(&self) -> &GammaProposal {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves() -> MoveConfig {
        MoveConfig {
            mc3_subset: 2,
            bandit_memory: 4.0,
            ..MoveConfig::default()
        }
    }

    #[test]
    fn window_keeps_trailing_decisions() {
        let mut window = AcceptanceWindow::new(3);
        assert_eq!(window.rate(), 0.0);
        for accepted in [true, true, false, false] {
            window.push(accepted);
        }
        assert_eq!(window.len(), 3);
        assert!((window.rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn bandit_ratio_matches_reverse_weights() {
        let proposal = AdaptiveProposal::new(GammaSamplerKind::Bandit, 5, 1, &moves());
        let gamma = DMatrix::<u8>::zeros(5, 1);
        let mut rng = RngHandle::from_seed(11);
        let draw = proposal.propose(&gamma, 0, &mut rng).unwrap();
        assert_eq!(draw.rows.len(), 1);
        assert!(draw.log_q_ratio.is_finite());
    }

    #[test]
    fn bandit_memory_rescales_arms() {
        let mut proposal = AdaptiveProposal::new(GammaSamplerKind::Bandit, 2, 1, &moves());
        let mut gamma = DMatrix::<u8>::zeros(2, 1);
        gamma[(1, 0)] = 1;
        let flip = Proposal {
            rows: vec![1],
            log_q_ratio: 0.0,
        };
        for _ in 0..10 {
            proposal.record(&flip, 0, &gamma, true);
        }
        let GammaProposal::Bandit(bandit) = proposal.kind() else {
            panic!("expected bandit");
        };
        let (alpha, beta) = bandit.arm(1, 0);
        assert!((alpha + beta - 4.0).abs() < 1e-9);
        assert!(alpha > beta);
        assert_eq!(bandit.arm(0, 0), (0.5, 0.5));
        assert_eq!(proposal.acceptance_rate(), 1.0);
    }

    #[test]
    fn mc3_flips_distinct_rows_symmetrically() {
        let proposal = AdaptiveProposal::new(GammaSamplerKind::Mc3, 6, 2, &moves());
        let gamma = DMatrix::<u8>::zeros(6, 2);
        let mut rng = RngHandle::from_seed(3);
        let draw = proposal.propose(&gamma, 1, &mut rng).unwrap();
        assert_eq!(draw.rows.len(), 2);
        assert_ne!(draw.rows[0], draw.rows[1]);
        assert_eq!(draw.log_q_ratio, 0.0);
    }
}
