//! Thin facade over the `nalgebra` factorisations the sampler relies on.
//!
//! Every failure is surfaced as [`SsurError::Numerical`]; callers never fall
//! back to a degraded factorisation.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use crate::errors::{ErrorInfo, SsurError};

/// Relative tolerance under which a QR diagonal entry counts as zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// Cholesky factorisation of a symmetric positive-definite matrix.
pub fn cholesky(matrix: DMatrix<f64>, what: &str) -> Result<Cholesky<f64, Dyn>, SsurError> {
    let dim = matrix.nrows();
    if matrix.iter().any(|value| !value.is_finite()) {
        return Err(SsurError::Numerical(
            ErrorInfo::new("cholesky-non-finite", "matrix contains non-finite entries")
                .with_context("matrix", what)
                .with_context("dim", dim),
        ));
    }
    Cholesky::new(matrix).ok_or_else(|| {
        SsurError::Numerical(
            ErrorInfo::new("cholesky-not-pd", "matrix is not positive definite")
                .with_context("matrix", what)
                .with_context("dim", dim),
        )
    })
}

/// Log-determinant of the factorised matrix.
pub fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>()
}

/// Solves `Lᵀ x = z` for the lower Cholesky factor, turning a standard
/// normal vector into a draw with covariance `(L Lᵀ)⁻¹`.
pub fn whiten_draw(chol: &Cholesky<f64, Dyn>, z: &DVector<f64>) -> Result<DVector<f64>, SsurError> {
    chol.l_dirty()
        .tr_solve_lower_triangular(z)
        .ok_or_else(|| SsurError::numerical("cholesky-back-solve", "triangular solve failed"))
}

/// Least-squares coefficients of `rhs` on `design` via a thin QR.
///
/// Rank-deficient designs (including n < columns) are rejected rather than
/// returning an arbitrary solution.
pub fn qr_least_squares(
    design: &DMatrix<f64>,
    rhs: &DMatrix<f64>,
) -> Result<DMatrix<f64>, SsurError> {
    let (n, k) = design.shape();
    if n < k {
        return Err(SsurError::Numerical(
            ErrorInfo::new("qr-underdetermined", "fewer observations than predictors")
                .with_context("rows", n)
                .with_context("cols", k),
        ));
    }
    let qr = design.clone().qr();
    let r = qr.r();
    let scale = r.diagonal().iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
    if let Some(column) = r
        .diagonal()
        .iter()
        .position(|d| !(d.abs() > RANK_TOLERANCE * scale.max(1.0)))
    {
        return Err(SsurError::Numerical(
            ErrorInfo::new("qr-rank-deficient", "design matrix is rank deficient")
                .with_context("column", column)
                .with_hint("remove collinear predictors before MLE initialisation"),
        ));
    }
    let qty = qr.q().transpose() * rhs;
    r.solve_upper_triangular(&qty)
        .ok_or_else(|| SsurError::numerical("qr-back-solve", "upper triangular solve failed"))
}
