use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ssur_core::RngHandle;
use ssur_mcmc::config::{CovarianceKind, GammaInit, SamplerSettings};
use ssur_mcmc::{initial_indicators, HessModel, Sampler, SurModel, SyntheticScenario};

fn scenario() -> SyntheticScenario {
    SyntheticScenario {
        n: 200,
        p: 40,
        s: 4,
        active: 5,
        ..SyntheticScenario::default()
    }
}

fn settings(covariance: CovarianceKind) -> SamplerSettings {
    SamplerSettings {
        chains: 4,
        covariance,
        planned_iterations: 1000,
        ..SamplerSettings::default()
    }
}

fn bench_sweeps(c: &mut Criterion) {
    let data = scenario().generate().expect("scenario");
    let init = initial_indicators(GammaInit::Mle, &data.dataset, &mut RngHandle::from_seed(1))
        .expect("init");
    let mut group = c.benchmark_group("sweep_throughput");
    for covariance in [CovarianceKind::Sparse, CovarianceKind::Dense] {
        let mut sampler = Sampler::<SurModel>::new(&data.dataset, settings(covariance), 4242)
            .expect("sampler");
        sampler.initialize(&init).expect("initialise");
        group.bench_function(BenchmarkId::new("sur", format!("{covariance:?}")), |b| {
            b.iter(|| sampler.step().expect("step"));
        });
    }
    let mut hess = Sampler::<HessModel>::new(&data.dataset, settings(CovarianceKind::Dense), 4242)
        .expect("sampler");
    hess.initialize(&init).expect("initialise");
    group.bench_function("hess", |b| {
        b.iter(|| hess.step().expect("step"));
    });
    group.finish();
}

criterion_group!(benches, bench_sweeps);
criterion_main!(benches);
