use ndarray::{Array2, ArrayView2};

/// Computes the lower triangular `L` such that `a = L L^T`.
///
/// Returns `None` if `a` isn't square or isn't positive definite.
pub(crate) fn cholesky(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }

    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for p in 0..j {
                sum -= l[[i, p]] * l[[j, p]];
            }

            if i == j {
                if sum.is_nan() || sum <= 0.0 {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Solves `L z = b` by forward substitution, overwriting `b` with `z`.
pub(crate) fn solve_lower_in_place(l: &Array2<f64>, b: &mut [f64]) {
    for i in 0..b.len() {
        let mut sum = b[i];
        for p in 0..i {
            sum -= l[[i, p]] * b[p];
        }
        b[i] = sum / l[[i, i]];
    }
}
