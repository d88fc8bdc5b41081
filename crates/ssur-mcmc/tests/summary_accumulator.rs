use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use ssur_mcmc::chain::{ChainState, LogComponents};
use ssur_mcmc::{MemorySink, ModelKind, Stream, SummaryAccumulator};

fn components() -> LogComponents {
    LogComponents {
        tau: Some(-1.0),
        eta: Some(0.0),
        jt: Some(-0.5),
        sigma_rho: Some(-2.0),
        o: -0.25,
        pi: -0.75,
        gamma: -3.0,
        w: -1.5,
        beta: Some(-4.0),
        likelihood: -100.0,
    }
}

struct Snapshot {
    gamma: DMatrix<u8>,
    o: DVector<f64>,
    pi: DVector<f64>,
    beta: DMatrix<f64>,
    sigma_rho: DMatrix<f64>,
    graph: DMatrix<u8>,
}

impl Snapshot {
    fn uniform(p: usize, s: usize, on: u8, pi: f64) -> Self {
        Self {
            gamma: DMatrix::from_element(p, s, on),
            o: DVector::from_element(p, 0.2),
            pi: DVector::from_element(s, pi),
            beta: DMatrix::from_element(p + 1, s, f64::from(on)),
            sigma_rho: DMatrix::identity(s, s),
            graph: DMatrix::from_fn(s, s, |a, b| u8::from(a != b)),
        }
    }

    fn state(&self) -> ChainState<'_> {
        ChainState {
            gamma: &self.gamma,
            o: &self.o,
            pi: &self.pi,
            w: 1.0,
            beta: Some(&self.beta),
            sigma_rho: Some(&self.sigma_rho),
            graph: Some(&self.graph),
            tau: Some(1.0),
            eta: Some(0.5),
        }
    }
}

fn parse(text: &str) -> Vec<Vec<f64>> {
    text.lines()
        .map(|line| line.split(' ').map(|v| v.parse().unwrap()).collect())
        .collect()
}

#[test]
fn burn_in_and_graph_start_gate_the_counters() {
    let mut accumulator = SummaryAccumulator::new(ModelKind::Sur, 1, 3, 2, 2, 5);
    let snapshot = Snapshot::uniform(3, 2, 1, 0.5);
    for iteration in 0..10 {
        accumulator.observe(iteration, &snapshot.state());
    }
    assert_eq!(accumulator.samples(), 8);
    assert_eq!(accumulator.graph_samples(), 5);
    assert_eq!(accumulator.graph_sum()[(0, 1)], 5.0);
    assert_eq!(accumulator.graph_mean().unwrap()[(1, 0)], 1.0);
}

#[test]
fn checkpoint_is_read_only_on_the_sums() {
    let mut accumulator = SummaryAccumulator::new(ModelKind::Sur, 1, 3, 2, 0, 0);
    let on = Snapshot::uniform(3, 2, 1, 1.5);
    let off = Snapshot::uniform(3, 2, 0, 0.5);
    accumulator.observe(0, &on.state());
    accumulator.observe(1, &off.state());
    accumulator.observe(2, &on.state());
    accumulator.observe(3, &off.state());

    let mut sink = MemorySink::new();
    accumulator.checkpoint(&components(), &mut sink).unwrap();
    let first = sink.get(Stream::Gamma).unwrap().to_string();
    accumulator.checkpoint(&components(), &mut sink).unwrap();
    assert_eq!(sink.get(Stream::Gamma).unwrap(), first);
    assert_eq!(accumulator.samples(), 4);

    let gamma = parse(&first);
    assert_eq!(gamma.len(), 3);
    assert!(gamma.iter().flatten().all(|v| (*v - 0.5).abs() < 1e-12));
    assert_eq!(parse(sink.get(Stream::Pi).unwrap()), vec![vec![1.0], vec![1.0]]);
    assert_eq!(parse(sink.get(Stream::HotspotTail).unwrap()), vec![vec![0.5], vec![0.5]]);

    let log = sink.lines(Stream::LogP);
    assert_eq!(log.len(), 2);
    assert_eq!(parse(log[0])[0].len(), 10);
    assert!(sink.get(Stream::Beta).is_none());
}

#[test]
fn finalize_adds_coefficient_and_covariance_means() {
    let mut accumulator = SummaryAccumulator::new(ModelKind::Sur, 1, 2, 2, 0, 0);
    let snapshot = Snapshot::uniform(2, 2, 1, 0.5);
    accumulator.observe(0, &snapshot.state());
    let mut sink = MemorySink::new();
    accumulator.finalize(&components(), &mut sink).unwrap();
    assert_eq!(parse(sink.get(Stream::Beta).unwrap()).len(), 3);
    assert_eq!(
        parse(sink.get(Stream::SigmaRho).unwrap()),
        vec![vec![1.0, 0.0], vec![0.0, 1.0]]
    );
}

#[test]
fn nothing_observed_writes_only_the_log_line() {
    let accumulator = SummaryAccumulator::new(ModelKind::Hess, 0, 2, 1, 5, 0);
    let mut sink = MemorySink::new();
    accumulator.finalize(&components(), &mut sink).unwrap();
    assert!(sink.get(Stream::Gamma).is_none());
    assert!(sink.get(Stream::Pi).is_none());
    assert_eq!(sink.lines(Stream::LogP).len(), 1);
}

proptest! {
    #[test]
    fn sums_match_observed_snapshots(
        cells in prop::collection::vec(prop::collection::vec(0u8..2, 6), 1..30),
        burn_in in 0usize..10,
    ) {
        let (p, s) = (3, 2);
        let mut accumulator = SummaryAccumulator::new(ModelKind::Hess, 0, p, s, burn_in, 0);
        let mut expected = DMatrix::<f64>::zeros(p, s);
        let mut expected_pi = 0.0;
        for (iteration, values) in cells.iter().enumerate() {
            let gamma = DMatrix::from_column_slice(p, s, values);
            let pi_value = 0.1 * (iteration % 7) as f64 + 0.05;
            let o = DVector::from_element(p, 0.3);
            let pi = DVector::from_element(s, pi_value);
            let state = ChainState {
                gamma: &gamma,
                o: &o,
                pi: &pi,
                w: 1.0,
                beta: None,
                sigma_rho: None,
                graph: None,
                tau: None,
                eta: None,
            };
            accumulator.observe(iteration, &state);
            if iteration >= burn_in {
                expected += gamma.map(f64::from);
                expected_pi += pi_value;
            }
        }
        let last = cells.len() - 1;
        let count = (last + 1).saturating_sub(burn_in);
        prop_assert_eq!(accumulator.samples(), count);
        prop_assert_eq!(accumulator.gamma_sum(), &expected);
        prop_assert!((accumulator.pi_sum()[0] - expected_pi).abs() < 1e-9);
        prop_assert_eq!(accumulator.graph_samples(), 0);
        match accumulator.gamma_mean() {
            Some(mean) => prop_assert!((mean - expected / count as f64).abs().max() < 1e-12),
            None => prop_assert_eq!(count, 0),
        }
    }
}
