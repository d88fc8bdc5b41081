//! Population of tempered chains with parallel local moves and adjacent
//! state exchanges.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use ssur_core::errors::ErrorInfo;
use ssur_core::{Dataset, RngHandle, RngPool, SsurError};

use crate::chain::{Chain, ChainModel};
use crate::config::SamplerSettings;
use crate::design::Design;
use crate::determinism;
use crate::init::InitialIndicators;
use crate::proposal::AcceptanceWindow;
use crate::tempering;

/// Coordinator of the chain population.
pub struct Sampler<M: ChainModel> {
    chains: Vec<Chain<M>>,
    design: Arc<Design>,
    settings: SamplerSettings,
    pool: rayon::ThreadPool,
    rngs: RngPool,
    exchange_rng: RngHandle,
    exchange_window: AcceptanceWindow,
    exchange_attempts: usize,
    iteration: usize,
}

impl<M: ChainModel> Sampler<M> {
    /// Validates the settings and builds the ladder, worker pool and
    /// generators. Chains start uninitialised.
    pub fn new(
        dataset: &Dataset,
        settings: SamplerSettings,
        master_seed: u64,
    ) -> Result<Self, SsurError> {
        settings.validate()?;
        let design = Arc::new(Design::from_dataset(dataset));
        let ladder = tempering::build_ladder(settings.chains, settings.temperature_ratio);
        let chains = ladder
            .iter()
            .map(|&temperature| Chain::new(Arc::clone(&design), &settings, temperature))
            .collect();
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = available.min(settings.max_threads).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| {
                SsurError::Configuration(
                    ErrorInfo::new("thread-pool", err.to_string())
                        .with_context("workers", workers),
                )
            })?;
        let stride =
            determinism::worker_stride(design.s(), design.p(), settings.planned_iterations);
        tracing::debug!(
            model = M::KIND.label(),
            chains = settings.chains,
            workers,
            master_seed,
            "sampler constructed"
        );
        Ok(Self {
            chains,
            design,
            rngs: RngPool::seeded(master_seed, workers, stride),
            exchange_rng: RngHandle::from_seed(determinism::exchange_seed(master_seed)),
            exchange_window: AcceptanceWindow::new(settings.moves.acceptance_window),
            exchange_attempts: 0,
            iteration: 0,
            pool,
            settings,
        })
    }

    /// Applies the starting state to every chain.
    pub fn initialize(&mut self, init: &InitialIndicators) -> Result<(), SsurError> {
        let workers = self.rngs.len();
        for (index, chain) in self.chains.iter_mut().enumerate() {
            self.rngs
                .with_slot(index % workers, |rng| chain.initialize(init, rng))?;
        }
        Ok(())
    }

    /// Forwards the graph-move start iteration to every chain.
    pub fn set_jt_start_iteration(&mut self, iteration: usize) {
        for chain in &mut self.chains {
            chain.set_jt_start_iteration(iteration);
        }
    }

    /// One iteration: a local sweep on every chain in parallel, then at most
    /// one adjacent exchange.
    pub fn step(&mut self) -> Result<(), SsurError> {
        self.iteration += 1;
        let rngs = &self.rngs;
        let workers = rngs.len();
        let chains = &mut self.chains;
        self.pool.install(|| {
            chains
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(index, chain)| {
                    rngs.with_slot(index % workers, |rng| chain.step_local_move(rng))
                })
        })?;
        if self.chains.len() > 1 && self.iteration % self.settings.exchange_period == 0 {
            self.exchange();
        }
        Ok(())
    }

    fn exchange(&mut self) {
        let first = self.exchange_rng.gen_range(0..self.chains.len() - 1);
        let (left, right) = self.chains.split_at_mut(first + 1);
        let (a, b) = (&mut left[first], &mut right[0]);
        let (accepted, probability) = tempering::attempt_exchange(
            a.cached_log_likelihood(),
            a.temperature(),
            b.cached_log_likelihood(),
            b.temperature(),
            &mut self.exchange_rng,
        );
        if accepted {
            a.swap_state(b);
        }
        self.exchange_attempts += 1;
        self.exchange_window.push(accepted);
        tracing::trace!(pair = first, accepted, probability, "exchange attempt");
    }

    /// Trailing exchange acceptance rate; 0 before any attempt.
    pub fn global_acc_rate(&self) -> f64 {
        self.exchange_window.rate()
    }

    /// Exchange attempts so far.
    pub fn exchange_attempts(&self) -> usize {
        self.exchange_attempts
    }

    /// Number of chains.
    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    /// Worker threads in the pool.
    pub fn workers(&self) -> usize {
        self.rngs.len()
    }

    /// Iterations stepped so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Temperatures by slot.
    pub fn temperatures(&self) -> Vec<f64> {
        self.chains.iter().map(Chain::temperature).collect()
    }

    /// Shared design matrices.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Settings the sampler was built with.
    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }
}

impl<M: ChainModel> Index<usize> for Sampler<M> {
    type Output = Chain<M>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.chains[index]
    }
}

impl<M: ChainModel> IndexMut<usize> for Sampler<M> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.chains[index]
    }
}
