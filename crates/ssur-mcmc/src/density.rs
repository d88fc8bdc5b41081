//! Log densities of the priors used by the chain models.

use statrs::function::beta::ln_beta;
use statrs::function::gamma::ln_gamma;

/// `ln 2π`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Beta(a, b) log density at `x` in (0, 1).
pub fn log_beta(x: f64, a: f64, b: f64) -> f64 {
    if !(x > 0.0 && x < 1.0) {
        return f64::NEG_INFINITY;
    }
    (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln() - ln_beta(a, b)
}

/// Gamma(shape, rate) log density at `x > 0`.
pub fn log_gamma_rate(x: f64, shape: f64, rate: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NEG_INFINITY;
    }
    shape * rate.ln() - ln_gamma(shape) + (shape - 1.0) * x.ln() - rate * x
}

/// InverseGamma(shape, scale) log density at `x > 0`.
pub fn log_inv_gamma(x: f64, shape: f64, scale: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NEG_INFINITY;
    }
    shape * scale.ln() - ln_gamma(shape) - (shape + 1.0) * x.ln() - scale / x
}

/// Zero-mean normal log density with variance `var`.
pub fn log_normal0(x: f64, var: f64) -> f64 {
    -0.5 * (LN_2PI + var.ln() + x * x / var)
}

/// Bernoulli log mass.
pub fn log_bernoulli(on: bool, prob: f64) -> f64 {
    if on {
        prob.ln()
    } else {
        (1.0 - prob).ln()
    }
}

/// Normalising piece shared by collapsed inverse-gamma marginals:
/// `a ln b − lnΓ(a) + lnΓ(a + m) − (a + m) ln(b + r)`.
pub fn inv_gamma_collapse(shape: f64, scale: f64, half_count: f64, half_resid: f64) -> f64 {
    shape * scale.ln() - ln_gamma(shape) + ln_gamma(shape + half_count)
        - (shape + half_count) * (scale + half_resid).ln()
}
