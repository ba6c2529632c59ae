pub use nalgebra::{DMatrix, DVector};

/// Empirical covariance of the columns of an `n x k` matrix
///
/// cov(j,l) = sum_i (x(i,j) - mean_j) (x(i,l) - mean_l) / (n - 1)
///
/// Rows are observations and columns are variables.
pub fn covariance(x_nk: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
    let nn = x_nk.nrows();
    if nn < 2 {
        return Err(anyhow::anyhow!(
            "need at least two observations, got {}",
            nn
        ));
    }
    let mean_k = x_nk.row_mean();
    let mut centred_nk = x_nk.clone();
    for mut row in centred_nk.row_iter_mut() {
        row -= &mean_k;
    }
    Ok(centred_nk.transpose() * &centred_nk / (nn as f64 - 1.0))
}

/// Sign and natural log of the absolute determinant of a square matrix
///
/// log|A| = sum_i log|U(i,i)| of the LU decomposition
///
/// A singular matrix yields `(0.0, -inf)`.
pub fn signed_log_determinant(a_kk: &DMatrix<f64>) -> anyhow::Result<(f64, f64)> {
    if !a_kk.is_square() {
        return Err(anyhow::anyhow!(
            "determinant of a {} x {} matrix",
            a_kk.nrows(),
            a_kk.ncols()
        ));
    }

    let lu = a_kk.clone().lu();
    let u_kk = lu.u();

    let mut sign = if lu.p().determinant::<f64>() < 0.0 {
        -1.0
    } else {
        1.0
    };
    let mut logdet = 0.0;
    for u_ii in u_kk.diagonal().iter() {
        if *u_ii == 0.0 {
            return Ok((0.0, f64::NEG_INFINITY));
        }
        if *u_ii < 0.0 {
            sign = -sign;
        }
        logdet += u_ii.abs().ln();
    }
    Ok((sign, logdet))
}

/// Log-determinant of the empirical covariance of the rows of `x_nk`
pub fn covariance_log_determinant(x_nk: &DMatrix<f64>) -> anyhow::Result<f64> {
    let (_, logdet) = signed_log_determinant(&covariance(x_nk)?)?;
    Ok(logdet)
}
