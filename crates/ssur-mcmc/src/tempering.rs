use rand::Rng;
use ssur_core::RngHandle;

/// Geometric ladder `ratio^i`; chain 0 is the cold chain at temperature 1.
pub fn build_ladder(chains: usize, ratio: f64) -> Vec<f64> {
    let mut ladder = Vec::with_capacity(chains.max(1));
    let mut temperature = 1.0;
    for _ in 0..chains.max(1) {
        ladder.push(temperature);
        temperature *= ratio;
    }
    ladder
}

/// Metropolis probability of swapping the states held at two temperatures.
///
/// Tempering acts on the likelihood only, so only log-likelihoods enter:
/// `min(1, exp((1/T_a − 1/T_b)(L_b − L_a)))`.
pub fn exchange_acceptance(
    log_likelihood_a: f64,
    temp_a: f64,
    log_likelihood_b: f64,
    temp_b: f64,
) -> f64 {
    let beta_a = 1.0 / temp_a;
    let beta_b = 1.0 / temp_b;
    let log_ratio = (beta_a - beta_b) * (log_likelihood_b - log_likelihood_a);
    if log_ratio.is_nan() {
        return 0.0;
    }
    log_ratio.min(0.0).exp()
}

/// Attempts an exchange; returns the decision and its acceptance probability.
pub fn attempt_exchange(
    log_likelihood_a: f64,
    temp_a: f64,
    log_likelihood_b: f64,
    temp_b: f64,
    rng: &mut RngHandle,
) -> (bool, f64) {
    let acceptance = exchange_acceptance(log_likelihood_a, temp_a, log_likelihood_b, temp_b);
    let draw: f64 = rng.gen();
    (draw < acceptance, acceptance)
}
