use std::fs;

use nalgebra::DMatrix;
use ssur_core::SsurError;
use ssur_sim::commands::simulate::{self, SimulateArgs};
use ssur_sim::io::{assemble_dataset, load_dataset, parse_blocks, parse_matrix, ColumnRole};

#[test]
fn matrix_text_skips_comments_and_blank_lines() {
    let text = "# header\n1 2 3\n\n4.5  -6 7e-1\n";
    let matrix = parse_matrix(text, "inline").unwrap();
    assert_eq!(matrix, DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.5, -6.0, 0.7]));
}

#[test]
fn ragged_rows_and_bad_tokens_are_shape_errors() {
    let err = parse_matrix("1 2\n3\n", "inline").unwrap_err();
    assert_eq!(err.info().code, "matrix-ragged");
    let err = parse_matrix("1 x\n", "inline").unwrap_err();
    assert!(matches!(err, SsurError::DataShape(_)));
    assert_eq!(err.info().context.get("token").map(String::as_str), Some("x"));
}

#[test]
fn blocks_assign_column_roles() {
    let roles = parse_blocks("0 0 2 1 1 -1").unwrap();
    assert_eq!(roles[2], ColumnRole::Fixed);
    assert_eq!(roles[5], ColumnRole::Ignored);
    let data = DMatrix::from_fn(4, 6, |i, j| (i + j) as f64);
    let dataset = assemble_dataset(data, &roles).unwrap();
    assert_eq!(dataset.n_outcomes(), 2);
    assert_eq!(dataset.n_fixed(), 1);
    assert_eq!(dataset.n_selectable(), 2);

    assert_eq!(parse_blocks("0 3").unwrap_err().info().code, "blocks-value");
    let err = assemble_dataset(DMatrix::zeros(2, 3), &roles).unwrap_err();
    assert_eq!(err.info().code, "blocks-length");
}

#[test]
fn simulated_files_load_back_into_a_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let args = SimulateArgs {
        out: dir.path().to_path_buf(),
        name: "toy".to_string(),
        n: 20,
        p: 4,
        s: 2,
        active: 1,
        effect: 2.0,
        seed: 5,
    };
    simulate::run(&args).unwrap();
    let graph = "0 1 0 0\n1 0 0 0\n0 0 0 1\n0 0 1 0\n";
    fs::write(dir.path().join("graph.txt"), graph).unwrap();

    let dataset = load_dataset(
        &dir.path().join("toy.txt"),
        &dir.path().join("toy_blocks.txt"),
        Some(&dir.path().join("graph.txt")),
    )
    .unwrap();
    assert_eq!(dataset.n_observations(), 20);
    assert_eq!(dataset.n_outcomes(), 2);
    assert_eq!(dataset.n_fixed(), 1);
    assert_eq!(dataset.n_selectable(), 4);
    assert_eq!(dataset.structure_graph().unwrap()[(0, 1)], 1);

    let truth = fs::read_to_string(dir.path().join("toy_truth.txt")).unwrap();
    assert_eq!(truth.lines().count(), 4);
    assert!(truth.starts_with("1.000000 1.000000"));
}
