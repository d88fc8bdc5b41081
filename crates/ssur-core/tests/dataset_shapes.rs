use nalgebra::DMatrix;
use ssur_core::errors::SsurError;
use ssur_core::linalg;
use ssur_core::Dataset;

fn data() -> DMatrix<f64> {
    DMatrix::from_fn(6, 5, |i, j| (i * 5 + j) as f64 + 0.5 * (i as f64).sin())
}

#[test]
fn partitions_columns() {
    let dataset = Dataset::new(data(), vec![0, 1], vec![2], vec![3, 4]).unwrap();
    assert_eq!(dataset.n_observations(), 6);
    assert_eq!(dataset.n_outcomes(), 2);
    assert_eq!(dataset.n_fixed(), 1);
    assert_eq!(dataset.n_selectable(), 2);
    assert_eq!(dataset.predictors().ncols(), 3);
    assert_eq!(dataset.predictors().column(0), data().column(2));
    assert_eq!(dataset.predictors().column(2), data().column(4));
}

#[test]
fn overlapping_columns_are_rejected() {
    let err = Dataset::new(data(), vec![0, 1], vec![1], vec![3]).unwrap_err();
    assert!(matches!(err, SsurError::DataShape(_)));
    assert_eq!(err.info().code, "dataset-index-overlap");
}

#[test]
fn out_of_range_columns_are_rejected() {
    let err = Dataset::new(data(), vec![0], vec![], vec![9]).unwrap_err();
    assert_eq!(err.info().code, "dataset-index-range");
}

#[test]
fn blocks_must_share_rows() {
    let y = DMatrix::<f64>::zeros(4, 1);
    let fixed = DMatrix::<f64>::from_element(4, 1, 1.0);
    let x = DMatrix::<f64>::zeros(3, 2);
    let err = Dataset::from_blocks(&y, &fixed, &x).unwrap_err();
    assert_eq!(err.info().code, "dataset-row-mismatch");
}

#[test]
fn structure_graph_must_be_square_over_predictors() {
    let dataset = Dataset::new(data(), vec![0], vec![1], vec![2, 3, 4]).unwrap();
    let err = dataset
        .clone()
        .with_structure_graph(DMatrix::<u8>::zeros(2, 2))
        .unwrap_err();
    assert_eq!(err.info().code, "structure-graph-shape");
    let mut graph = DMatrix::<u8>::zeros(3, 3);
    graph[(0, 1)] = 1;
    graph[(1, 0)] = 1;
    let with_graph = dataset.with_structure_graph(graph.clone()).unwrap();
    assert_eq!(with_graph.structure_graph(), Some(&graph));
}

#[test]
fn qr_rejects_collinear_design() {
    let design = DMatrix::from_fn(8, 2, |i, j| if j == 0 { 1.0 } else { 2.0 + 0.0 * i as f64 });
    let rhs = DMatrix::from_fn(8, 1, |i, _| i as f64);
    let err = linalg::qr_least_squares(&design, &rhs).unwrap_err();
    assert!(matches!(err, SsurError::Numerical(_)));
}

#[test]
fn qr_recovers_exact_coefficients() {
    let design = DMatrix::from_fn(10, 2, |i, j| if j == 0 { 1.0 } else { i as f64 });
    let rhs = DMatrix::from_fn(10, 1, |i, _| 3.0 - 0.5 * i as f64);
    let coef = linalg::qr_least_squares(&design, &rhs).unwrap();
    assert!((coef[(0, 0)] - 3.0).abs() < 1e-9);
    assert!((coef[(1, 0)] + 0.5).abs() < 1e-9);
}

#[test]
fn cholesky_reports_indefinite_matrix() {
    let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
    let err = linalg::cholesky(matrix, "test").unwrap_err();
    assert_eq!(err.info().code, "cholesky-not-pd");
}
