//! Simulated SUR problems with a known set of active predictors.

use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use ssur_core::linalg::qr_least_squares;
use ssur_core::{Dataset, RngHandle, SsurError};

/// Parameters of a simulated problem.
///
/// The fixed block is an intercept column. The first `active` selectable
/// predictors affect every outcome with coefficient `effect`. Noise columns
/// are correlated across outcomes. With `orthogonal_noise` they are also
/// projected orthogonal to the predictors, so inactive predictors carry no
/// signal at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticScenario {
    /// Observations.
    pub n: usize,
    /// Selectable predictors.
    pub p: usize,
    /// Outcomes.
    pub s: usize,
    /// Active selectable predictors.
    pub active: usize,
    /// Coefficient of every active predictor.
    pub effect: f64,
    /// Correlation between consecutive outcome noises.
    pub noise_correlation: f64,
    /// Project the noise off the design columns.
    pub orthogonal_noise: bool,
    /// Generator seed.
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            n: 50,
            p: 10,
            s: 2,
            active: 3,
            effect: 1.5,
            noise_correlation: 0.5,
            orthogonal_noise: true,
            seed: 20_240_601,
        }
    }
}

/// A simulated dataset with its generating indicators.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    /// Outcomes, intercept and selectable predictors.
    pub dataset: Dataset,
    /// Indicators used to generate the outcomes (p×s).
    pub true_gamma: DMatrix<u8>,
}

impl SyntheticScenario {
    /// Draws the dataset.
    pub fn generate(&self) -> Result<SyntheticData, SsurError> {
        let mut rng = RngHandle::from_seed(self.seed);
        let (n, p, s) = (self.n, self.p, self.s);
        let intercept = DMatrix::from_element(n, 1, 1.0);
        let x = DMatrix::from_fn(n, p, |_, _| rng.sample::<f64, _>(StandardNormal));
        let true_gamma = DMatrix::from_fn(p, s, |j, _| u8::from(j < self.active));

        let mut noise = DMatrix::<f64>::zeros(n, s);
        let rho = self.noise_correlation;
        for i in 0..n {
            let mut previous: f64 = rng.sample(StandardNormal);
            noise[(i, 0)] = previous;
            for l in 1..s {
                let fresh: f64 = rng.sample(StandardNormal);
                previous = rho * previous + (1.0 - rho * rho).sqrt() * fresh;
                noise[(i, l)] = previous;
            }
        }
        let mut design = DMatrix::<f64>::zeros(n, 1 + p);
        design.columns_mut(0, 1).copy_from(&intercept);
        design.columns_mut(1, p).copy_from(&x);
        if self.orthogonal_noise {
            let projection = qr_least_squares(&design, &noise)?;
            noise -= &design * projection;
        }

        let coefficients = true_gamma.map(|g| f64::from(g) * self.effect);
        let y = DMatrix::from_element(n, s, 1.0) + &x * coefficients + noise;
        let dataset = Dataset::from_blocks(&y, &intercept, &x)?;
        Ok(SyntheticData {
            dataset,
            true_gamma,
        })
    }
}
