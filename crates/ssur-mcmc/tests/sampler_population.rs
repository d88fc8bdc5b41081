use ssur_core::{RngHandle, SsurError};
use ssur_mcmc::config::{BetaPriorKind, CovarianceKind, GammaInit, SamplerSettings};
use ssur_mcmc::{
    initial_indicators, run, HessModel, MemorySink, RunConfig, RunOptions, Sampler, Stream,
    SurModel, SyntheticScenario,
};

fn scenario() -> SyntheticScenario {
    SyntheticScenario {
        n: 30,
        p: 6,
        s: 3,
        active: 2,
        ..SyntheticScenario::default()
    }
}

fn settings(chains: usize) -> SamplerSettings {
    SamplerSettings {
        chains,
        max_threads: 2,
        planned_iterations: 20,
        ..SamplerSettings::default()
    }
}

#[test]
fn single_chain_never_attempts_exchanges() {
    let data = scenario().generate().unwrap();
    let mut sampler = Sampler::<SurModel>::new(&data.dataset, settings(1), 17).unwrap();
    let mut rng = RngHandle::from_seed(1);
    let init = initial_indicators(GammaInit::Zero, &data.dataset, &mut rng).unwrap();
    sampler.initialize(&init).unwrap();
    for _ in 0..15 {
        sampler.step().unwrap();
    }
    assert_eq!(sampler.exchange_attempts(), 0);
    assert_eq!(sampler.global_acc_rate(), 0.0);
}

#[test]
fn population_attempts_one_exchange_per_period() {
    let data = scenario().generate().unwrap();
    let mut config = settings(3);
    config.exchange_period = 2;
    let mut sampler = Sampler::<HessModel>::new(&data.dataset, config, 5).unwrap();
    let mut rng = RngHandle::from_seed(2);
    let init = initial_indicators(GammaInit::Random, &data.dataset, &mut rng).unwrap();
    sampler.initialize(&init).unwrap();
    for _ in 0..10 {
        sampler.step().unwrap();
    }
    assert_eq!(sampler.exchange_attempts(), 5);
    let rate = sampler.global_acc_rate();
    assert!((0.0..=1.0).contains(&rate));
    assert_eq!(sampler.temperatures(), vec![1.0, 1.2, 1.2 * 1.2]);
    assert_eq!(sampler[2].temperature(), 1.2 * 1.2);
}

#[test]
fn stepping_before_initialisation_is_a_configuration_error() {
    let data = scenario().generate().unwrap();
    let mut sampler = Sampler::<SurModel>::new(&data.dataset, settings(2), 3).unwrap();
    let err = sampler.step().unwrap_err();
    assert!(matches!(err, SsurError::Configuration(_)));
    assert_eq!(err.info().code, "chain-uninitialised");
}

#[test]
fn g_prior_is_rejected_before_any_iteration() {
    let data = scenario().generate().unwrap();
    let mut config = settings(1);
    config.beta_prior = BetaPriorKind::GPrior;
    let err = Sampler::<SurModel>::new(&data.dataset, config, 3).err().unwrap();
    assert_eq!(err.info().code, "beta-prior-gprior");

    let run_config = RunConfig {
        beta_prior: "gprior".to_string(),
        ..RunConfig::default()
    };
    let mut sink = MemorySink::new();
    let err = run(&data.dataset, &run_config, &mut sink, &RunOptions::default()).unwrap_err();
    assert!(matches!(err, SsurError::Configuration(_)));
    assert!(sink.get(Stream::LogP).is_none());
}

#[test]
fn graph_is_frozen_until_the_start_iteration() {
    let data = scenario().generate().unwrap();
    let mut config = settings(1);
    config.covariance = CovarianceKind::Sparse;
    let mut sampler = Sampler::<SurModel>::new(&data.dataset, config, 99).unwrap();
    sampler.set_jt_start_iteration(6);
    let mut rng = RngHandle::from_seed(4);
    let init = initial_indicators(GammaInit::Mle, &data.dataset, &mut rng).unwrap();
    sampler.initialize(&init).unwrap();
    let before = sampler[0].graph().unwrap().clone();
    for iteration in 1..6 {
        sampler.step().unwrap();
        assert!(!sampler[0].graph_active(), "active at {iteration}");
        assert_eq!(sampler[0].graph().unwrap(), &before);
    }
    sampler.step().unwrap();
    assert!(sampler[0].graph_active());
}

#[test]
fn dense_graph_is_complete_and_fixed() {
    let data = scenario().generate().unwrap();
    let mut config = settings(1);
    config.covariance = CovarianceKind::Dense;
    let mut sampler = Sampler::<SurModel>::new(&data.dataset, config, 8).unwrap();
    let mut rng = RngHandle::from_seed(4);
    let init = initial_indicators(GammaInit::One, &data.dataset, &mut rng).unwrap();
    sampler.initialize(&init).unwrap();
    for _ in 0..5 {
        sampler.step().unwrap();
    }
    let graph = sampler[0].graph().unwrap();
    for a in 0..3 {
        for b in 0..3 {
            assert_eq!(graph[(a, b)], u8::from(a != b));
        }
    }
}
