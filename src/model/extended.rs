//! Closure-backed nonlinear model for the extended Kalman filter.

use nalgebra::{DMatrix, DVector};

use super::traits::{Model, ModelError};

/// Nonlinear model built from two closures.
///
/// The closures have the same contract as [`Model::predict_state`] and
/// [`Model::predict_measurement`] and are expected to relinearize on every
/// call. Captured state plays the role of the user context.
pub struct ExtendedModel<F, H> {
    control_dim: usize,
    transition: F,
    measurement: H,
}

impl<F, H> ExtendedModel<F, H>
where
    F: FnMut(&mut DVector<f64>, &DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> Result<(), ModelError>,
    H: FnMut(&mut DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> Result<(), ModelError>,
{
    /// Create a new extended model.
    ///
    /// # Arguments
    /// * `control_dim` - Length of the control vector passed to `predict`
    /// * `transition` - `(xp, x, u, jf)`: writes `f(x, u)` and `df/dx`
    /// * `measurement` - `(zp, x, jh)`: writes `h(x)` and `dh/dx`
    pub fn new(control_dim: usize, transition: F, measurement: H) -> Self {
        Self {
            control_dim,
            transition,
            measurement,
        }
    }
}

impl<F, H> Model for ExtendedModel<F, H>
where
    F: FnMut(&mut DVector<f64>, &DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> Result<(), ModelError>,
    H: FnMut(&mut DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> Result<(), ModelError>,
{
    fn control_dim(&self) -> usize {
        self.control_dim
    }

    fn predict_state(
        &mut self,
        xp: &mut DVector<f64>,
        x: &DVector<f64>,
        u: &DVector<f64>,
        jf: &mut DMatrix<f64>,
    ) -> Result<(), ModelError> {
        (self.transition)(xp, x, u, jf)
    }

    fn predict_measurement(
        &mut self,
        zp: &mut DVector<f64>,
        x: &DVector<f64>,
        jh: &mut DMatrix<f64>,
    ) -> Result<(), ModelError> {
        (self.measurement)(zp, x, jh)
    }
}

impl<F, H> std::fmt::Debug for ExtendedModel<F, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedModel")
            .field("control_dim", &self.control_dim)
            .finish_non_exhaustive()
    }
}

/// Forward-difference Jacobian of `f` at `x`, written into `jac`.
///
/// Uses step size `h_j = sqrt(eps) * max(|x_j|, 1)` per component. `jac`
/// must already have shape `(f(x).len(), x.len())`.
///
/// Intended for extended models without an analytic Jacobian. It allocates
/// one perturbed copy of `x` and two output vectors per call.
pub fn finite_difference_jacobian<G>(
    mut f: G,
    x: &DVector<f64>,
    jac: &mut DMatrix<f64>,
) -> Result<(), ModelError>
where
    G: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let sqrt_eps = f64::EPSILON.sqrt();
    let f0 = f(x);
    if jac.shape() != (f0.len(), x.len()) {
        return Err(ModelError::new(format!(
            "jacobian buffer is {}x{}, function maps {} -> {}",
            jac.nrows(),
            jac.ncols(),
            x.len(),
            f0.len()
        )));
    }

    let mut x_pert = x.clone();
    for j in 0..x.len() {
        let xj = x[j];
        let h = sqrt_eps * xj.abs().max(1.0);
        x_pert[j] = xj + h;
        let f_pert = f(&x_pert);
        x_pert[j] = xj;

        if f_pert.len() != f0.len() {
            return Err(ModelError::new("function output length changed between evaluations"));
        }
        for i in 0..f0.len() {
            jac[(i, j)] = (f_pert[i] - f0[i]) / h;
        }
    }

    Ok(())
}
