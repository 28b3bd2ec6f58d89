use anyhow::{anyhow, Result};
use faer::prelude::Solve;
use faer::{Mat, Side};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

fn ndarray_to_faer(arr: &Array2<f64>) -> Mat<f64> {
    let (rows, cols) = (arr.nrows(), arr.ncols());
    Mat::from_fn(rows, cols, |i, j| arr[[i, j]])
}

fn faer_to_ndarray(mat: &Mat<f64>) -> Array2<f64> {
    let (rows, cols) = (mat.nrows(), mat.ncols());
    Array2::from_shape_fn((rows, cols), |(i, j)| mat[(i, j)])
}

/// Solve a symmetric positive-definite system via Cholesky factorization.
/// Returns X such that A * X = B.
fn cholesky_solve(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    let llt = ndarray_to_faer(a)
        .llt(Side::Lower)
        .map_err(|e| anyhow!("Cholesky: matrix not positive-definite ({e:?})"))?;
    let x = llt.solve(&ndarray_to_faer(b));
    Ok(faer_to_ndarray(&x))
}

/// Ridge regression: W = Y * H^T * (H * H^T + lambda * I)^{-1}
///
/// - h: [d, T] (one column per sample)
/// - y: [k, T]
/// - Returns W: [k, d]
///
/// Solves on the smaller of d×d (primal) or T×T (dual, push-through identity).
/// `LinearRegression` reaches it through [`least_squares`]; with ~165 features
/// and fewer training draws the dual branch is the usual one.
pub fn ridge_regression(h: &Array2<f64>, y: &Array2<f64>, lambda: f64) -> Result<Array2<f64>> {
    let d = h.nrows();
    let t = h.ncols();

    if t < d {
        // G = H^T H + lambda I_T, G Z = Y^T, W = (H Z)^T
        let mut g = h.t().dot(h);
        for i in 0..t {
            g[[i, i]] += lambda;
        }
        let z = cholesky_solve(&g, &y.t().to_owned())?;
        Ok(h.dot(&z).t().to_owned())
    } else {
        // A = H H^T + lambda I_d, A W^T = H Y^T
        let mut a = h.dot(&h.t());
        for i in 0..d {
            a[[i, i]] += lambda;
        }
        let b = h.dot(&y.t());
        let w_t = cholesky_solve(&a, &b)?;
        Ok(w_t.t().to_owned())
    }
}

/// Ordinary least squares with intercept on row-major samples `x: [n, d]`.
///
/// The data are centred so the intercept is left unpenalised; `lambda` only
/// keeps the normal equations positive-definite when columns are collinear.
pub fn least_squares(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambda: f64,
) -> Result<(Array1<f64>, f64)> {
    let n = x.nrows();
    if n == 0 {
        return Err(anyhow!("least squares on an empty sample"));
    }
    let x_mean = x.mean_axis(Axis(0)).ok_or_else(|| anyhow!("empty design matrix"))?;
    let y_mean = y.sum() / n as f64;

    let h = (&x - &x_mean).reversed_axes();
    let target = (&y - y_mean).insert_axis(Axis(0));
    let w = ridge_regression(&h, &target, lambda)?;

    let weights = w.row(0).to_owned();
    let intercept = y_mean - weights.dot(&x_mean);
    Ok((weights, intercept))
}
