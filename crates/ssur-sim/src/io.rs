//! Whitespace-separated matrix files and column block assignments.

use std::fs;
use std::path::Path;

use nalgebra::DMatrix;
use ssur_core::errors::ErrorInfo;
use ssur_core::{Dataset, SsurError};
use ssur_mcmc::sink::format_matrix;

/// Role of one data column in a block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Outcome (`0`).
    Outcome,
    /// Selectable predictor (`1`).
    Selectable,
    /// Fixed predictor (`2`).
    Fixed,
    /// Ignored column (`-1`).
    Ignored,
}

/// Parses rows of whitespace-separated numbers. Blank lines and lines
/// starting with `#` are skipped.
pub fn parse_matrix(text: &str, origin: &str) -> Result<DMatrix<f64>, SsurError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row = trimmed
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|err| {
                    SsurError::DataShape(
                        ErrorInfo::new("matrix-parse", err.to_string())
                            .with_context("source", origin)
                            .with_context("line", line_no + 1)
                            .with_context("token", token),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(SsurError::DataShape(
                    ErrorInfo::new("matrix-ragged", "rows have different lengths")
                        .with_context("source", origin)
                        .with_context("line", line_no + 1)
                        .with_context("expected", first.len())
                        .with_context("found", row.len()),
                ));
            }
        }
        rows.push(row);
    }
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

/// Reads a matrix file.
pub fn read_matrix(path: &Path) -> Result<DMatrix<f64>, SsurError> {
    let text = fs::read_to_string(path)
        .map_err(|err| SsurError::io("matrix-read", err, path.display()))?;
    parse_matrix(&text, &path.display().to_string())
}

/// Writes a matrix with six decimals per entry.
pub fn write_matrix(path: &Path, matrix: &DMatrix<f64>) -> Result<(), SsurError> {
    fs::write(path, format_matrix(matrix))
        .map_err(|err| SsurError::io("matrix-write", err, path.display()))
}

/// Parses a block assignment: one integer per data column.
pub fn parse_blocks(text: &str) -> Result<Vec<ColumnRole>, SsurError> {
    text.split_whitespace()
        .enumerate()
        .map(|(column, token)| match token {
            "0" => Ok(ColumnRole::Outcome),
            "1" => Ok(ColumnRole::Selectable),
            "2" => Ok(ColumnRole::Fixed),
            "-1" => Ok(ColumnRole::Ignored),
            other => Err(SsurError::DataShape(
                ErrorInfo::new("blocks-value", "block entries must be -1, 0, 1 or 2")
                    .with_context("column", column)
                    .with_context("value", other),
            )),
        })
        .collect()
}

/// Splits a data matrix into a [`Dataset`] following its block roles.
pub fn assemble_dataset(data: DMatrix<f64>, roles: &[ColumnRole]) -> Result<Dataset, SsurError> {
    if roles.len() != data.ncols() {
        return Err(SsurError::DataShape(
            ErrorInfo::new("blocks-length", "one block entry per data column is required")
                .with_context("entries", roles.len())
                .with_context("columns", data.ncols()),
        ));
    }
    let columns = |role: ColumnRole| -> Vec<usize> {
        roles
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == role)
            .map(|(c, _)| c)
            .collect()
    };
    let outcomes = columns(ColumnRole::Outcome);
    if outcomes.is_empty() {
        return Err(SsurError::DataShape(ErrorInfo::new(
            "blocks-no-outcome",
            "at least one outcome column is required",
        )));
    }
    Dataset::new(
        data,
        outcomes,
        columns(ColumnRole::Fixed),
        columns(ColumnRole::Selectable),
    )
}

/// Reads the data, block and optional structure-graph files.
pub fn load_dataset(
    data: &Path,
    blocks: &Path,
    structure_graph: Option<&Path>,
) -> Result<Dataset, SsurError> {
    let matrix = read_matrix(data)?;
    let text = fs::read_to_string(blocks)
        .map_err(|err| SsurError::io("blocks-read", err, blocks.display()))?;
    let dataset = assemble_dataset(matrix, &parse_blocks(&text)?)?;
    match structure_graph {
        Some(path) => {
            let graph = read_matrix(path)?;
            if graph.iter().any(|v| *v != 0.0 && *v != 1.0) {
                return Err(SsurError::DataShape(
                    ErrorInfo::new("structure-graph-values", "structure graph must be 0/1")
                        .with_context("path", path.display()),
                ));
            }
            dataset.with_structure_graph(graph.map(|v| v as u8))
        }
        None => Ok(dataset),
    }
}
