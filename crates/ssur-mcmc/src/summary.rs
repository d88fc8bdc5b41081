//! Streaming posterior means of the cold chain.

use nalgebra::{DMatrix, DVector};
use ssur_core::SsurError;

use crate::chain::{ChainState, LogComponents};
use crate::config::ModelKind;
use crate::sink::{format_matrix, format_row, Stream, SummarySink};

/// Running sums with explicit divisor counters.
///
/// Every quantity is summed from the burn-in iteration onwards and divided
/// by `samples`. The outcome graph is only summed from
/// `max(burn_in, jt_start)` and is divided by `graph_samples`, so frozen
/// pre-move graphs never dilute the edge probabilities.
#[derive(Debug, Clone)]
pub struct SummaryAccumulator {
    model: ModelKind,
    burn_in: usize,
    jt_start: usize,
    gamma: DMatrix<f64>,
    beta: DMatrix<f64>,
    sigma_rho: DMatrix<f64>,
    graph: DMatrix<f64>,
    pi: DVector<f64>,
    tail: DVector<f64>,
    samples: usize,
    graph_samples: usize,
}

impl SummaryAccumulator {
    /// Zeroed sums for a problem with `q` fixed, `p` selectable predictors
    /// and `s` outcomes.
    pub fn new(
        model: ModelKind,
        q: usize,
        p: usize,
        s: usize,
        burn_in: usize,
        jt_start: usize,
    ) -> Self {
        Self {
            model,
            burn_in,
            jt_start,
            gamma: DMatrix::zeros(p, s),
            beta: DMatrix::zeros(q + p, s),
            sigma_rho: DMatrix::zeros(s, s),
            graph: DMatrix::zeros(s, s),
            pi: DVector::zeros(s),
            tail: DVector::zeros(s),
            samples: 0,
            graph_samples: 0,
        }
    }

    /// Adds one state to the sums when `iteration` is past burn-in.
    pub fn observe(&mut self, iteration: usize, state: &ChainState<'_>) {
        if iteration < self.burn_in {
            return;
        }
        self.samples += 1;
        self.gamma += state.gamma.map(f64::from);
        if let Some(beta) = state.beta {
            self.beta += beta;
        }
        if let Some(sigma_rho) = state.sigma_rho {
            self.sigma_rho += sigma_rho;
        }
        self.pi += state.pi;
        self.tail += state.pi.map(|pi| if pi > 1.0 { 1.0 } else { 0.0 });
        if iteration >= self.jt_start {
            if let Some(graph) = state.graph {
                self.graph_samples += 1;
                self.graph += graph.map(f64::from);
            }
        }
    }

    /// States summed so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Graph states summed so far.
    pub fn graph_samples(&self) -> usize {
        self.graph_samples
    }

    /// Raw indicator sum.
    pub fn gamma_sum(&self) -> &DMatrix<f64> {
        &self.gamma
    }

    /// Raw graph sum.
    pub fn graph_sum(&self) -> &DMatrix<f64> {
        &self.graph
    }

    /// Raw `pi` sum.
    pub fn pi_sum(&self) -> &DVector<f64> {
        &self.pi
    }

    /// Posterior inclusion probabilities, once anything was observed.
    pub fn gamma_mean(&self) -> Option<DMatrix<f64>> {
        mean(&self.gamma, self.samples)
    }

    /// Posterior edge probabilities, once any graph was observed.
    pub fn graph_mean(&self) -> Option<DMatrix<f64>> {
        mean(&self.graph, self.graph_samples)
    }

    /// Posterior mean coefficients.
    pub fn beta_mean(&self) -> Option<DMatrix<f64>> {
        mean(&self.beta, self.samples)
    }

    /// Rewrites the running mean streams and appends one log line. The sums
    /// are left untouched.
    pub fn checkpoint(
        &self,
        components: &LogComponents,
        sink: &mut dyn SummarySink,
    ) -> Result<(), SsurError> {
        if let Some(gamma) = self.gamma_mean() {
            sink.rewrite(Stream::Gamma, &format_matrix(&gamma))?;
        }
        if self.model == ModelKind::Sur {
            if let Some(graph) = self.graph_mean() {
                sink.rewrite(Stream::Graph, &format_matrix(&graph))?;
            }
        }
        if self.samples > 0 {
            let count = self.samples as f64;
            sink.rewrite(Stream::Pi, &column(self.pi.iter().map(|v| v / count)))?;
            sink.rewrite(Stream::HotspotTail, &column(self.tail.iter().map(|v| v / count)))?;
        }
        sink.append(Stream::LogP, &format_row(components.entries()))
    }

    /// Final checkpoint plus the coefficient and covariance means.
    pub fn finalize(
        &self,
        components: &LogComponents,
        sink: &mut dyn SummarySink,
    ) -> Result<(), SsurError> {
        self.checkpoint(components, sink)?;
        if self.model == ModelKind::Sur {
            if let Some(beta) = self.beta_mean() {
                sink.rewrite(Stream::Beta, &format_matrix(&beta))?;
            }
            if let Some(sigma_rho) = mean(&self.sigma_rho, self.samples) {
                sink.rewrite(Stream::SigmaRho, &format_matrix(&sigma_rho))?;
            }
        }
        Ok(())
    }
}

fn mean(sum: &DMatrix<f64>, count: usize) -> Option<DMatrix<f64>> {
    (count > 0).then(|| sum / count as f64)
}

/// One value per line, as a column vector.
fn column(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(|value| format_row([value]) + "\n")
        .collect()
}
