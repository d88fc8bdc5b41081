//! Starting values for the indicator matrix and coefficients.

use nalgebra::DMatrix;
use rand::Rng;
use ssur_core::linalg::qr_least_squares;
use ssur_core::{Dataset, RngHandle, SsurError};

use crate::config::GammaInit;

/// Indicators (p×s) and coefficients ((q+p)×s) applied to every chain.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialIndicators {
    /// Selectable-predictor inclusion indicators.
    pub gamma: DMatrix<u8>,
    /// Starting coefficients; rows of excluded predictors are zero.
    pub beta: DMatrix<f64>,
}

/// Builds the starting state for `policy`.
///
/// MLE fits every outcome on `[fixed | selectable]` by least squares and
/// switches on the selectable cells whose signed coefficient exceeds half the
/// standard deviation of all coefficients. Negative coefficients stay off.
pub fn initial_indicators(
    policy: GammaInit,
    dataset: &Dataset,
    rng: &mut RngHandle,
) -> Result<InitialIndicators, SsurError> {
    let (q, p, s) = (dataset.n_fixed(), dataset.n_selectable(), dataset.n_outcomes());
    let gamma = match policy {
        GammaInit::Zero => DMatrix::zeros(p, s),
        GammaInit::One => DMatrix::from_element(p, s, 1),
        GammaInit::Random => DMatrix::from_fn(p, s, |_, _| u8::from(rng.gen_bool(0.5))),
        GammaInit::Mle => {
            let coefficients = qr_least_squares(&dataset.predictors(), &dataset.outcomes())?;
            let threshold = 0.5 * sample_sd(coefficients.as_slice());
            let gamma =
                DMatrix::from_fn(p, s, |j, l| u8::from(coefficients[(q + j, l)] > threshold));
            let beta = DMatrix::from_fn(q + p, s, |row, l| {
                if row < q || gamma[(row - q, l)] == 1 {
                    coefficients[(row, l)]
                } else {
                    0.0
                }
            });
            tracing::debug!(
                threshold,
                active = gamma.iter().filter(|g| **g == 1).count(),
                "MLE indicator initialisation"
            );
            return Ok(InitialIndicators { gamma, beta });
        }
    };
    Ok(InitialIndicators {
        gamma,
        beta: DMatrix::zeros(q + p, s),
    })
}

fn sample_sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_policies_fill_every_cell() {
        let data = DMatrix::from_fn(6, 4, |i, j| (i * 3 + j * j) as f64 + 0.1 * (i * j) as f64);
        let dataset = Dataset::new(data, vec![0], vec![], vec![1, 2, 3]).unwrap();
        let mut rng = RngHandle::from_seed(1);
        let ones = initial_indicators(GammaInit::One, &dataset, &mut rng).unwrap();
        assert!(ones.gamma.iter().all(|g| *g == 1));
        assert_eq!(ones.beta.shape(), (3, 1));
        let zeros = initial_indicators(GammaInit::Zero, &dataset, &mut rng).unwrap();
        assert!(zeros.gamma.iter().all(|g| *g == 0));
    }

    #[test]
    fn mle_leaves_strongly_negative_coefficients_off() {
        // y = -3 x0 + 2 x1 + 0 x2, fitted exactly
        let data = DMatrix::from_fn(8, 4, |i, j| {
            let t = (i + 1) as f64;
            let x2 = ((i + 1) * 7 % 5) as f64;
            match j {
                0 => -3.0 * t + 2.0 * t * t,
                1 => t,
                2 => t * t,
                _ => x2,
            }
        });
        let dataset = Dataset::new(data, vec![0], vec![], vec![1, 2, 3]).unwrap();
        let init =
            initial_indicators(GammaInit::Mle, &dataset, &mut RngHandle::from_seed(0)).unwrap();
        assert_eq!(init.gamma, DMatrix::from_column_slice(3, 1, &[0, 1, 0]));
        assert!((init.beta[(1, 0)] - 2.0).abs() < 1e-8);
        assert_eq!(init.beta[(0, 0)], 0.0);
        assert_eq!(init.beta[(2, 0)], 0.0);
    }

    #[test]
    fn sd_of_constant_is_zero() {
        assert_eq!(sample_sd(&[2.0, 2.0, 2.0]), 0.0);
        assert!((sample_sd(&[1.0, 3.0]) - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
