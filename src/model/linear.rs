//! Linear state-space model.
//!
//! `x' = F x + B u` and `z = H x`. The Jacobians are the constant matrices
//! `F` and `H`, so they are copied into the filter's buffers on the first
//! call only.

use nalgebra::{DMatrix, DVector};

use super::traits::{Model, ModelError};
use crate::{Error, Result};

/// Linear model with constant transition, control and observation matrices.
#[derive(Clone, Debug)]
pub struct LinearModel {
    /// State transition matrix F (n x n)
    transition: DMatrix<f64>,
    /// Control matrix B (n x k)
    control: DMatrix<f64>,
    /// Observation matrix H (m x n)
    observation: DMatrix<f64>,
    /// Jf already holds F
    transition_ready: bool,
    /// Jh already holds H
    observation_ready: bool,
}

impl LinearModel {
    /// Create a new linear model.
    ///
    /// # Arguments
    /// * `transition` - State transition matrix F (n x n)
    /// * `control` - Control matrix B (n x k); use an n x 0 matrix when there is no input
    /// * `observation` - Observation matrix H (m x n)
    pub fn new(
        transition: DMatrix<f64>,
        control: DMatrix<f64>,
        observation: DMatrix<f64>,
    ) -> Result<Self> {
        let n = transition.nrows();
        if n == 0 || transition.ncols() != n {
            return Err(Error::InvalidConfig(format!(
                "transition matrix must be square and non-empty, got {}x{}",
                transition.nrows(),
                transition.ncols()
            )));
        }
        if control.nrows() != n {
            return Err(Error::DimensionMismatch {
                name: "control matrix",
                expected: format!("{} rows", n),
                got: format!("{} rows", control.nrows()),
            });
        }
        if observation.ncols() != n || observation.nrows() == 0 {
            return Err(Error::DimensionMismatch {
                name: "observation matrix",
                expected: format!("m x {} with m > 0", n),
                got: format!("{}x{}", observation.nrows(), observation.ncols()),
            });
        }

        Ok(Self {
            transition,
            control,
            observation,
            transition_ready: false,
            observation_ready: false,
        })
    }

    /// Model without control input (B is n x 0).
    pub fn without_control(transition: DMatrix<f64>, observation: DMatrix<f64>) -> Result<Self> {
        let n = transition.nrows();
        Self::new(transition, DMatrix::zeros(n, 0), observation)
    }

    /// State dimension n.
    #[inline(always)]
    pub fn n_state(&self) -> usize {
        self.transition.nrows()
    }

    /// Measurement dimension m.
    #[inline(always)]
    pub fn n_meas(&self) -> usize {
        self.observation.nrows()
    }

    /// State transition matrix F.
    pub fn transition(&self) -> &DMatrix<f64> {
        &self.transition
    }

    /// Control matrix B.
    pub fn control(&self) -> &DMatrix<f64> {
        &self.control
    }

    /// Observation matrix H.
    pub fn observation(&self) -> &DMatrix<f64> {
        &self.observation
    }

    /// Whether the Jacobian buffers have been written since the last reset.
    pub fn jacobians_ready(&self) -> (bool, bool) {
        (self.transition_ready, self.observation_ready)
    }

    /// Force F and H to be copied into the filter again on the next calls.
    ///
    /// Needed after the filter's Jacobian buffers were overwritten from the
    /// outside. Moving the model into a new filter resets them through
    /// [`Model::attach`].
    pub fn reset_jacobians(&mut self) {
        self.transition_ready = false;
        self.observation_ready = false;
    }
}

impl Model for LinearModel {
    fn control_dim(&self) -> usize {
        self.control.ncols()
    }

    fn attach(&mut self) {
        self.reset_jacobians();
    }

    fn predict_state(
        &mut self,
        xp: &mut DVector<f64>,
        x: &DVector<f64>,
        u: &DVector<f64>,
        jf: &mut DMatrix<f64>,
    ) -> std::result::Result<(), ModelError> {
        if jf.shape() != self.transition.shape() || xp.len() != self.n_state() {
            return Err(ModelError::new(format!(
                "linear model expects a {}-state filter",
                self.n_state()
            )));
        }
        if !self.transition_ready {
            jf.copy_from(&self.transition);
            self.transition_ready = true;
        }

        // xp = F x + B u
        xp.gemv(1.0, &self.transition, x, 0.0);
        xp.gemv(1.0, &self.control, u, 1.0);
        Ok(())
    }

    fn predict_measurement(
        &mut self,
        zp: &mut DVector<f64>,
        x: &DVector<f64>,
        jh: &mut DMatrix<f64>,
    ) -> std::result::Result<(), ModelError> {
        if jh.shape() != self.observation.shape() || zp.len() != self.n_meas() {
            return Err(ModelError::new(format!(
                "linear model expects {} measurements of a {}-state filter",
                self.n_meas(),
                self.n_state()
            )));
        }
        if !self.observation_ready {
            jh.copy_from(&self.observation);
            self.observation_ready = true;
        }

        // zp = H x
        zp.gemv(1.0, &self.observation, x, 0.0);
        Ok(())
    }
}
