//! Adaptive random-walk scales and the draws shared by both chain models.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Gamma, StandardNormal};
use serde::{Deserialize, Serialize};
use ssur_core::errors::ErrorInfo;
use ssur_core::{RngHandle, SsurError};

/// Acceptance probability the Robbins–Monro recursion steers towards.
const TARGET_ACCEPTANCE: f64 = 0.44;
const LOG_VARIANCE_MIN: f64 = -9.2;
const LOG_VARIANCE_MAX: f64 = 4.6;

/// Log-scale random-walk proposal variance tuned by Robbins–Monro.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveScale {
    log_variance: f64,
    updates: u64,
}

impl Default for AdaptiveScale {
    fn default() -> Self {
        Self {
            log_variance: 0.0,
            updates: 0,
        }
    }
}

impl AdaptiveScale {
    /// Current proposal variance.
    pub fn variance(&self) -> f64 {
        self.log_variance.exp()
    }

    fn increment(&self, rng: &mut RngHandle) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        z * (0.5 * self.log_variance).exp()
    }

    fn adapt(&mut self, acceptance: f64) {
        self.updates += 1;
        let gain = (self.updates as f64).powf(-0.6);
        self.log_variance = (self.log_variance + gain * (acceptance - TARGET_ACCEPTANCE))
            .clamp(LOG_VARIANCE_MIN, LOG_VARIANCE_MAX);
    }

    /// One multiplicative MH step for a positive parameter.
    ///
    /// `target` is the log density on the natural scale; the Jacobian of the
    /// log transform is added here. Returns the new value.
    pub fn log_scale_step<F>(
        &mut self,
        current: f64,
        rng: &mut RngHandle,
        mut target: F,
    ) -> Result<f64, SsurError>
    where
        F: FnMut(f64) -> Result<f64, SsurError>,
    {
        let proposed = current * self.increment(rng).exp();
        let log_alpha = target(proposed)? - target(current)? + proposed.ln() - current.ln();
        let acceptance = if log_alpha.is_nan() {
            0.0
        } else {
            log_alpha.min(0.0).exp()
        };
        self.adapt(acceptance);
        if rng.log_uniform() < log_alpha {
            Ok(proposed)
        } else {
            Ok(current)
        }
    }
}

/// Inverse-gamma draw with shape/scale parameterisation.
pub fn draw_inv_gamma(shape: f64, scale: f64, rng: &mut RngHandle) -> Result<f64, SsurError> {
    let gamma = Gamma::new(shape, 1.0 / scale).map_err(|err| {
        SsurError::Numerical(
            ErrorInfo::new("inv-gamma-parameters", err.to_string())
                .with_context("shape", shape)
                .with_context("scale", scale),
        )
    })?;
    let draw: f64 = rng.sample(gamma);
    Ok(1.0 / draw)
}

/// Beta draw.
pub fn draw_beta(a: f64, b: f64, rng: &mut RngHandle) -> Result<f64, SsurError> {
    let beta = rand_distr::Beta::new(a, b).map_err(|err| {
        SsurError::Numerical(
            ErrorInfo::new("beta-parameters", err.to_string())
                .with_context("a", a)
                .with_context("b", b),
        )
    })?;
    Ok(rng.sample(beta))
}

/// Vector of independent standard normal draws.
pub fn standard_normal(len: usize, rng: &mut RngHandle) -> DVector<f64> {
    DVector::from_fn(len, |_, _| rng.sample(StandardNormal))
}
