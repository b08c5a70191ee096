//! Dense linear-algebra helpers operating in place on nalgebra storage.

use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, Dyn};

use crate::{Error, Result};

/// Read-only view with runtime row and column strides.
pub type ArenaView<'a> = DMatrixView<'a, f64, Dyn, Dyn>;

/// Mutable view with runtime row and column strides.
pub type ArenaViewMut<'a> = DMatrixViewMut<'a, f64, Dyn, Dyn>;

/// Cholesky factorization `A = L * L^T` in place.
///
/// Only the lower triangle (diagonal included) of `a` is read and written.
/// The strict upper triangle is left as it was and must not be read as part
/// of the factor.
///
/// Fails with [`Error::NotPositiveDefinite`] as soon as a pivot is not
/// strictly positive (NaN pivots included). The factorization stops there,
/// leaving `a` partially overwritten.
pub fn cholesky_lower_in_place(a: &mut DMatrix<f64>) -> Result<()> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::DimensionMismatch {
            name: "cholesky input",
            expected: "square matrix".to_string(),
            got: format!("{}x{}", a.nrows(), a.ncols()),
        });
    }

    for j in 0..n {
        let mut diag = a[(j, j)];
        for k in 0..j {
            diag -= a[(j, k)] * a[(j, k)];
        }

        // Written as a negated comparison so NaN is rejected too
        if !(diag > 0.0) {
            return Err(Error::NotPositiveDefinite);
        }
        let ljj = diag.sqrt();
        a[(j, j)] = ljj;

        for i in (j + 1)..n {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= a[(i, k)] * a[(j, k)];
            }
            a[(i, j)] = sum / ljj;
        }
    }

    Ok(())
}

/// Zero-copy transpose of a column-major matrix.
///
/// Element `(i, j)` of the view is element `(j, i)` of `m`; only the strides
/// are swapped.
#[inline]
pub fn transpose_view(m: &DMatrix<f64>) -> ArenaView<'_> {
    let (nrows, ncols) = m.shape();
    ArenaView::from_slice_with_strides(m.as_slice(), ncols, nrows, nrows, 1)
}
