use nalgebra::{DMatrix, DVector};
use ssur_core::Dataset;

/// Matrices derived once from a [`Dataset`] and shared by every chain.
///
/// Predictor columns are ordered fixed first, then selectable, so selectable
/// predictor `j` lives at column `q + j`.
#[derive(Debug, Clone)]
pub struct Design {
    y: DMatrix<f64>,
    x: DMatrix<f64>,
    xtx: DMatrix<f64>,
    xty: DMatrix<f64>,
    yty: DVector<f64>,
    q: usize,
    p: usize,
}

impl Design {
    /// Extracts Y, X = [fixed | selectable] and XᵀX.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let x = dataset.predictors();
        let y = dataset.outcomes();
        let xtx = x.tr_mul(&x);
        let xty = x.tr_mul(&y);
        let yty = DVector::from_iterator(y.ncols(), y.column_iter().map(|col| col.norm_squared()));
        Self {
            y,
            x,
            xtx,
            xty,
            yty,
            q: dataset.n_fixed(),
            p: dataset.n_selectable(),
        }
    }

    /// Outcome matrix (n×s).
    pub fn y(&self) -> &DMatrix<f64> {
        &self.y
    }

    /// Predictor matrix (n×(q+p)).
    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// Cached XᵀX.
    pub fn xtx(&self) -> &DMatrix<f64> {
        &self.xtx
    }

    /// Cached XᵀY ((q+p)×s).
    pub fn xty(&self) -> &DMatrix<f64> {
        &self.xty
    }

    /// Squared norm of every outcome column.
    pub fn yty(&self) -> &DVector<f64> {
        &self.yty
    }

    /// Observations.
    pub fn n(&self) -> usize {
        self.y.nrows()
    }

    /// Outcomes.
    pub fn s(&self) -> usize {
        self.y.ncols()
    }

    /// Fixed predictors.
    pub fn q(&self) -> usize {
        self.q
    }

    /// Selectable predictors.
    pub fn p(&self) -> usize {
        self.p
    }

    /// Predictor columns in play for an outcome: every fixed column plus
    /// the selectable columns whose indicator is on.
    pub fn active_columns(&self, indicators: impl Iterator<Item = bool>) -> Vec<usize> {
        (0..self.q)
            .chain(
                indicators
                    .enumerate()
                    .filter(|(_, on)| *on)
                    .map(|(j, _)| self.q + j),
            )
            .collect()
    }

    /// Sub-block of XᵀX over `columns`.
    pub fn gram(&self, columns: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(columns.len(), columns.len(), |a, b| {
            self.xtx[(columns[a], columns[b])]
        })
    }
}
