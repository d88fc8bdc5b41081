use ssur_core::RngHandle;
use ssur_mcmc::tempering;

#[test]
fn better_cold_state_swaps_with_reduced_probability() {
    let acceptance = tempering::exchange_acceptance(-10.0, 1.0, -12.0, 2.0);
    let expected = ((1.0 - 0.5) * (-12.0 - -10.0_f64)).exp();
    assert!((acceptance - expected).abs() < 1e-12);
    assert!(acceptance > 0.3 && acceptance < 0.4);
}

#[test]
fn hotter_chain_with_better_likelihood_always_swaps() {
    assert_eq!(tempering::exchange_acceptance(-12.0, 1.0, -10.0, 2.0), 1.0);
    assert_eq!(tempering::exchange_acceptance(-5.0, 1.0, -5.0, 1.44), 1.0);
}

#[test]
fn attempt_reports_the_same_probability() {
    let acceptance = tempering::exchange_acceptance(-10.0, 1.0, -12.0, 2.0);
    let mut rng = RngHandle::from_seed(0xDEAD_BEEF);
    let mut accepted = 0;
    for _ in 0..2000 {
        let (swap, prob) = tempering::attempt_exchange(-10.0, 1.0, -12.0, 2.0, &mut rng);
        assert!((prob - acceptance).abs() < 1e-12);
        accepted += usize::from(swap);
    }
    let rate = accepted as f64 / 2000.0;
    assert!((rate - acceptance).abs() < 0.05, "rate {rate} vs {acceptance}");
}

#[test]
fn ladder_is_geometric_from_one() {
    let ladder = tempering::build_ladder(4, 1.5);
    assert_eq!(ladder.len(), 4);
    assert_eq!(ladder[0], 1.0);
    assert!((ladder[3] - 3.375).abs() < 1e-12);
    assert_eq!(tempering::build_ladder(0, 2.0), vec![1.0]);
}
