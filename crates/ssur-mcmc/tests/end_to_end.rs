use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use nalgebra::DMatrix;
use ssur_core::{Dataset, RngHandle, SsurError};
use ssur_mcmc::config::GammaInit;
use ssur_mcmc::manifest::RunManifest;
use ssur_mcmc::{
    initial_indicators, run, run_to_directory, LadderConfig, MemorySink, ModelKind, RunConfig,
    RunOptions, Stream, SyntheticScenario,
};

fn recovery_config(chains: usize) -> RunConfig {
    let mut config = RunConfig {
        iterations: 500,
        burn_in: 100,
        model: "SUR".to_string(),
        covariance: "dense".to_string(),
        gamma_sampler: "Bandit".to_string(),
        gamma_init: "MLE".to_string(),
        ladder: LadderConfig {
            chains,
            ..LadderConfig::default()
        },
        ..RunConfig::default()
    };
    config.checkpoint.interval = 100;
    config.seed_policy.master_seed = Some(20_240_601);
    config
}

fn parse(text: &str) -> Vec<Vec<f64>> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split(' ').map(|v| v.parse().unwrap()).collect())
        .collect()
}

fn assert_recovered(sink: &MemorySink, truth: &DMatrix<u8>) {
    let gamma = parse(sink.get(Stream::Gamma).unwrap());
    assert_eq!(gamma.len(), truth.nrows());
    for (j, row) in gamma.iter().enumerate() {
        for (l, prob) in row.iter().enumerate() {
            if truth[(j, l)] == 1 {
                assert!(*prob > 0.7, "true cell ({j},{l}) at {prob}");
            } else {
                assert!(*prob < 0.3, "null cell ({j},{l}) at {prob}");
            }
        }
    }
}

#[test]
fn single_chain_recovers_the_active_predictors() {
    let data = SyntheticScenario::default().generate().unwrap();
    assert_eq!(data.dataset.n_observations(), 50);
    assert_eq!(data.dataset.n_fixed(), 1);
    let mut sink = MemorySink::new();
    let summary =
        run(&data.dataset, &recovery_config(1), &mut sink, &RunOptions::default()).unwrap();
    assert_eq!(summary.samples, 400);
    assert_eq!(summary.exchange_attempts, 0);
    assert_eq!(summary.exchange_acceptance, 0.0);
    assert_eq!(summary.final_temperature_ratio, None);
    assert_recovered(&sink, &data.true_gamma);
    assert_eq!(parse(sink.get(Stream::Beta).unwrap()).len(), 11);
    assert_eq!(parse(sink.get(Stream::SigmaRho).unwrap()).len(), 2);
    // checkpoints at 199, 299, 399, 499 plus the final one
    assert_eq!(sink.lines(Stream::LogP).len(), 5);
}

#[test]
fn single_chain_recovers_with_unprojected_noise() {
    for seed in [11, 12, 13] {
        let data = SyntheticScenario {
            orthogonal_noise: false,
            seed,
            ..SyntheticScenario::default()
        }
        .generate()
        .unwrap();
        let mut sink = MemorySink::new();
        run(&data.dataset, &recovery_config(1), &mut sink, &RunOptions::default()).unwrap();
        assert_recovered(&sink, &data.true_gamma);
    }
}

#[test]
fn tempered_pair_recovers_the_active_predictors() {
    let data = SyntheticScenario::default().generate().unwrap();
    let mut sink = MemorySink::new();
    let summary =
        run(&data.dataset, &recovery_config(2), &mut sink, &RunOptions::default()).unwrap();
    assert_eq!(summary.samples, 400);
    assert_eq!(summary.final_temperature_ratio, Some(1.2));
    assert_eq!(summary.exchange_attempts, 499);
    assert_recovered(&sink, &data.true_gamma);
}

#[test]
fn same_seed_single_thread_runs_are_byte_identical() {
    let data = SyntheticScenario {
        n: 30,
        p: 5,
        ..SyntheticScenario::default()
    }
    .generate()
    .unwrap();
    let mut config = RunConfig {
        iterations: 60,
        burn_in: 10,
        ladder: LadderConfig {
            chains: 3,
            ..LadderConfig::default()
        },
        ..RunConfig::default()
    };
    config.threads.max_threads = 1;
    config.checkpoint.interval = 20;
    config.seed_policy.master_seed = Some(77);

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let data_path = std::path::Path::new("synthetic.txt");
    let options = RunOptions::default();
    let (summary_a, manifest_a) =
        run_to_directory(&data.dataset, &config, data_path, first.path(), &options).unwrap();
    let (summary_b, _) =
        run_to_directory(&data.dataset, &config, data_path, second.path(), &options).unwrap();
    assert_eq!(summary_a, summary_b);

    let manifest = RunManifest::load(&manifest_a).unwrap();
    assert_eq!(manifest.master_seed, 77);
    assert_eq!(manifest.streams.len(), 7);
    assert_eq!(manifest.data_hash.len(), 64);
    for stream in &manifest.streams {
        assert!(stream.to_string_lossy().starts_with("synthetic_SSUR_"));
        let a = fs::read(first.path().join(stream)).unwrap();
        let b = fs::read(second.path().join(stream)).unwrap();
        assert!(!a.is_empty(), "{} is empty", stream.display());
        assert_eq!(a, b, "{} differs", stream.display());
    }
}

#[test]
fn hess_run_writes_only_its_streams() {
    let data = SyntheticScenario {
        n: 40,
        p: 6,
        s: 3,
        ..SyntheticScenario::default()
    }
    .generate()
    .unwrap();
    let mut config = RunConfig {
        iterations: 40,
        model: "HESS".to_string(),
        gamma_sampler: "MC3".to_string(),
        ..RunConfig::default()
    };
    config.seed_policy.master_seed = Some(3);
    let out = tempfile::tempdir().unwrap();
    let (summary, _) = run_to_directory(
        &data.dataset,
        &config,
        std::path::Path::new("hess_case.txt"),
        out.path(),
        &RunOptions::default(),
    )
    .unwrap();
    assert_eq!(summary.model, ModelKind::Hess);
    assert!(summary.final_tau.is_none());
    assert!(summary.proposal_variances.w.is_some());
    assert!(out.path().join("hess_case_HESS_gamma_out.txt").exists());
    assert!(out.path().join("hess_case_HESS_logP_out.txt").exists());
    assert!(!out.path().join("hess_case_HESS_G_out.txt").exists());
    assert!(!out.path().join("hess_case_HESS_beta_out.txt").exists());
    let log = fs::read_to_string(out.path().join("hess_case_HESS_logP_out.txt")).unwrap();
    let first = log.lines().next().unwrap();
    assert_eq!(first.split(' ').count(), 5);
}

#[test]
fn cancellation_stops_at_the_next_checkpoint() {
    let data = SyntheticScenario {
        n: 30,
        p: 4,
        ..SyntheticScenario::default()
    }
    .generate()
    .unwrap();
    let mut config = RunConfig {
        iterations: 200,
        ..RunConfig::default()
    };
    config.checkpoint.interval = 10;
    config.seed_policy.master_seed = Some(1);
    let options = RunOptions {
        cancel: Some(Arc::new(AtomicBool::new(true))),
    };
    let mut sink = MemorySink::new();
    let summary = run(&data.dataset, &config, &mut sink, &options).unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.last_iteration, 9);
    assert_eq!(summary.samples, 10);
    assert!(sink.get(Stream::SigmaRho).is_some());
}

#[test]
fn mle_with_collinear_fixed_predictors_is_numerical_error() {
    let n = 12;
    let data = DMatrix::from_fn(n, 5, |i, j| match j {
        0 => (i as f64).sin(),
        1 => 1.0,
        2 => 2.0,
        _ => ((i * j) as f64).cos(),
    });
    let dataset = Dataset::new(data, vec![0], vec![1, 2], vec![3, 4]).unwrap();
    let err =
        initial_indicators(GammaInit::Mle, &dataset, &mut RngHandle::from_seed(0)).unwrap_err();
    assert!(matches!(err, SsurError::Numerical(_)));

    let config = RunConfig {
        gamma_init: "MLE".to_string(),
        ..RunConfig::default()
    };
    let err = run(&dataset, &config, &mut MemorySink::new(), &RunOptions::default()).unwrap_err();
    assert_eq!(err.info().code, "qr-rank-deficient");
}
