//! Utility functions for kalman_rs.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::OnceLock;

use nalgebra::{DMatrix, DVector};

use crate::{Error, Result};

/// Default tolerance used when checking caller-supplied covariances.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Validate that a vector has the expected length.
pub fn validate_vector(name: &'static str, v: &DVector<f64>, len: usize) -> Result<()> {
    if v.len() != len {
        return Err(Error::DimensionMismatch {
            name,
            expected: len.to_string(),
            got: v.len().to_string(),
        });
    }
    Ok(())
}

/// Validate that a matrix has shape (rows, cols).
pub fn validate_shape(name: &'static str, m: &DMatrix<f64>, rows: usize, cols: usize) -> Result<()> {
    if m.shape() != (rows, cols) {
        return Err(Error::DimensionMismatch {
            name,
            expected: format!("{}x{}", rows, cols),
            got: format!("{}x{}", m.nrows(), m.ncols()),
        });
    }
    Ok(())
}

/// Largest absolute difference between `m[(i, j)]` and `m[(j, i)]`.
///
/// Returns infinity for non-square matrices and NaN if any compared entry is NaN.
pub fn max_asymmetry(m: &DMatrix<f64>) -> f64 {
    if !m.is_square() {
        return f64::INFINITY;
    }

    let mut worst = 0.0_f64;
    for j in 0..m.ncols() {
        for i in (j + 1)..m.nrows() {
            let diff = (m[(i, j)] - m[(j, i)]).abs();
            if diff.is_nan() {
                return f64::NAN;
            }
            worst = worst.max(diff);
        }
    }
    worst
}

/// Check if a matrix is square and symmetric within `tol`.
///
/// The tolerance is relative to the largest absolute entry (at least 1).
pub fn is_symmetric(m: &DMatrix<f64>, tol: f64) -> bool {
    let scale = m.amax().max(1.0);
    max_asymmetry(m) <= tol * scale
}

/// Validate that a covariance-like matrix is n x n and symmetric.
pub fn validate_symmetric(name: &'static str, m: &DMatrix<f64>, n: usize) -> Result<()> {
    validate_shape(name, m, n, n)?;
    if !is_symmetric(m, SYMMETRY_TOLERANCE) {
        return Err(Error::InvalidConfig(format!(
            "{} must be symmetric (max asymmetry {:e})",
            name,
            max_asymmetry(m)
        )));
    }
    Ok(())
}

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning only once per distinct message.
///
/// Subsequent calls with the same message are logged at debug level.
pub fn warn_once(message: &str) {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let mut guard = warned.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if guard.insert(message.to_string()) {
        log::warn!("{}", message);
    } else {
        log::debug!("{}", message);
    }
}
