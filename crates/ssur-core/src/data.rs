//! Read-only dataset handed to the sampler.

use nalgebra::DMatrix;

use crate::errors::{ErrorInfo, SsurError};

/// Outcome, fixed-predictor and selectable-predictor columns of one data
/// matrix, plus an optional structure graph over the selectable predictors.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: DMatrix<f64>,
    outcomes: Vec<usize>,
    fixed: Vec<usize>,
    selectable: Vec<usize>,
    structure_graph: Option<DMatrix<u8>>,
}

impl Dataset {
    /// Builds a dataset from a data matrix and three disjoint column sets.
    pub fn new(
        data: DMatrix<f64>,
        outcomes: Vec<usize>,
        fixed: Vec<usize>,
        selectable: Vec<usize>,
    ) -> Result<Self, SsurError> {
        if data.nrows() == 0 {
            return Err(SsurError::DataShape(ErrorInfo::new(
                "dataset-empty",
                "data matrix has no observations",
            )));
        }
        let mut owner = vec![None::<&'static str>; data.ncols()];
        for (label, indices) in [
            ("outcome", &outcomes),
            ("fixed", &fixed),
            ("selectable", &selectable),
        ] {
            for &column in indices.iter() {
                let slot = owner.get_mut(column).ok_or_else(|| {
                    SsurError::DataShape(
                        ErrorInfo::new("dataset-index-range", "column index out of range")
                            .with_context("set", label)
                            .with_context("column", column)
                            .with_context("columns", data.ncols()),
                    )
                })?;
                if let Some(previous) = slot.replace(label) {
                    return Err(SsurError::DataShape(
                        ErrorInfo::new("dataset-index-overlap", "column assigned twice")
                            .with_context("column", column)
                            .with_context("first", previous)
                            .with_context("second", label),
                    ));
                }
            }
        }
        Ok(Self {
            data,
            outcomes,
            fixed,
            selectable,
            structure_graph: None,
        })
    }

    /// Concatenates separate outcome, fixed and selectable blocks.
    pub fn from_blocks(
        outcomes: &DMatrix<f64>,
        fixed: &DMatrix<f64>,
        selectable: &DMatrix<f64>,
    ) -> Result<Self, SsurError> {
        let n = outcomes.nrows();
        for (label, block) in [("fixed", fixed), ("selectable", selectable)] {
            if block.nrows() != n {
                return Err(SsurError::DataShape(
                    ErrorInfo::new("dataset-row-mismatch", "blocks disagree on observations")
                        .with_context("block", label)
                        .with_context("rows", block.nrows())
                        .with_context("expected", n),
                ));
            }
        }
        let (s, q, p) = (outcomes.ncols(), fixed.ncols(), selectable.ncols());
        let mut data = DMatrix::<f64>::zeros(n, s + q + p);
        data.columns_mut(0, s).copy_from(outcomes);
        data.columns_mut(s, q).copy_from(fixed);
        data.columns_mut(s + q, p).copy_from(selectable);
        Self::new(
            data,
            (0..s).collect(),
            (s..s + q).collect(),
            (s + q..s + q + p).collect(),
        )
    }

    /// Attaches a symmetric p×p 0/1 structure graph over the selectable
    /// predictors.
    pub fn with_structure_graph(mut self, graph: DMatrix<u8>) -> Result<Self, SsurError> {
        let p = self.n_selectable();
        if graph.nrows() != p || graph.ncols() != p {
            return Err(SsurError::DataShape(
                ErrorInfo::new("structure-graph-shape", "structure graph must be p x p")
                    .with_context("rows", graph.nrows())
                    .with_context("cols", graph.ncols())
                    .with_context("p", p),
            ));
        }
        if graph != graph.transpose() {
            return Err(SsurError::DataShape(ErrorInfo::new(
                "structure-graph-asymmetric",
                "structure graph must be symmetric",
            )));
        }
        self.structure_graph = Some(graph);
        Ok(self)
    }

    /// Number of observations n.
    pub fn n_observations(&self) -> usize {
        self.data.nrows()
    }

    /// Number of outcomes s.
    pub fn n_outcomes(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of always-included predictors q.
    pub fn n_fixed(&self) -> usize {
        self.fixed.len()
    }

    /// Number of selectable predictors p.
    pub fn n_selectable(&self) -> usize {
        self.selectable.len()
    }

    /// Outcome matrix Y (n×s).
    pub fn outcomes(&self) -> DMatrix<f64> {
        self.data.select_columns(self.outcomes.iter())
    }

    /// Fixed-predictor matrix (n×q).
    pub fn fixed_predictors(&self) -> DMatrix<f64> {
        self.data.select_columns(self.fixed.iter())
    }

    /// Selectable-predictor matrix X (n×p).
    pub fn selectable_predictors(&self) -> DMatrix<f64> {
        self.data.select_columns(self.selectable.iter())
    }

    /// Fixed predictors followed by selectable predictors (n×(q+p)).
    pub fn predictors(&self) -> DMatrix<f64> {
        let columns: Vec<usize> = self
            .fixed
            .iter()
            .chain(self.selectable.iter())
            .copied()
            .collect();
        self.data.select_columns(columns.iter())
    }

    /// Optional structure graph over the selectable predictors.
    pub fn structure_graph(&self) -> Option<&DMatrix<u8>> {
        self.structure_graph.as_ref()
    }

    /// Raw underlying data matrix.
    pub fn raw(&self) -> &DMatrix<f64> {
        &self.data
    }
}
