//! Model traits for the filter engine.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Failure reported by a [`Model`] callback.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ModelError {
    message: String,
}

impl ModelError {
    /// Create a model error with a human readable reason.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Reason given by the model.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// State-transition and measurement functions of a (possibly nonlinear) system.
///
/// The same filter engine runs a linear Kalman filter or an extended one; the
/// difference lives entirely in the model:
/// - a linear model writes constant Jacobians, typically once
/// - an extended model relinearizes around `x` on every call
///
/// The implementing value is the model's opaque context. The filter owns it,
/// hands it out through `model()` / `model_mut()`, and never inspects it. Any
/// memoization (for example a flag saying the constant Jacobians have already
/// been written) belongs here, not in the filter.
///
/// Both callbacks must only write their output parameters and keep their
/// shapes. A resized output is rejected by the filter.
pub trait Model {
    /// Length of the control vector `u` accepted by [`Model::predict_state`].
    fn control_dim(&self) -> usize;

    /// Called once when a filter takes ownership of the model.
    ///
    /// The new filter's output buffers start zeroed, so any memo of what was
    /// written into a previous filter's buffers must be dropped here.
    fn attach(&mut self) {}

    /// Predict the next state.
    ///
    /// # Arguments
    /// * `xp` - Output: predicted state `f(x, u)` (n)
    /// * `x` - Current state estimate (n)
    /// * `u` - Control input (`control_dim()`)
    /// * `jf` - Output: Jacobian `df/dx` at `x` (n x n). Holds the value from
    ///   the previous call, so a constant Jacobian may be left untouched.
    fn predict_state(
        &mut self,
        xp: &mut DVector<f64>,
        x: &DVector<f64>,
        u: &DVector<f64>,
        jf: &mut DMatrix<f64>,
    ) -> Result<(), ModelError>;

    /// Predict the measurement for a state.
    ///
    /// # Arguments
    /// * `zp` - Output: predicted measurement `h(x)` (m)
    /// * `x` - Current state estimate (n)
    /// * `jh` - Output: Jacobian `dh/dx` at `x` (m x n). Holds the value from
    ///   the previous call.
    fn predict_measurement(
        &mut self,
        zp: &mut DVector<f64>,
        x: &DVector<f64>,
        jh: &mut DMatrix<f64>,
    ) -> Result<(), ModelError>;
}

impl<T: Model + ?Sized> Model for Box<T> {
    fn control_dim(&self) -> usize {
        (**self).control_dim()
    }

    fn attach(&mut self) {
        (**self).attach()
    }

    fn predict_state(
        &mut self,
        xp: &mut DVector<f64>,
        x: &DVector<f64>,
        u: &DVector<f64>,
        jf: &mut DMatrix<f64>,
    ) -> Result<(), ModelError> {
        (**self).predict_state(xp, x, u, jf)
    }

    fn predict_measurement(
        &mut self,
        zp: &mut DVector<f64>,
        x: &DVector<f64>,
        jh: &mut DMatrix<f64>,
    ) -> Result<(), ModelError> {
        (**self).predict_measurement(zp, x, jh)
    }
}
