//! Time update.

use nalgebra::DVector;

use super::kalman::KalmanFilter;
use super::workspace::Role;
use crate::internal::transpose_view;
use crate::model::Model;
use crate::{Error, Result};

impl<M: Model> KalmanFilter<M> {
    /// Predict the next state.
    ///
    /// Runs the state-transition function to get `xp = f(x, u)` and `Jf`, takes
    /// `xp` as the new estimate, then propagates the covariance:
    /// `P = Jf P Jf^T + Q`.
    ///
    /// # Arguments
    /// * `u` - Control input, `model().control_dim()` long
    ///
    /// # Errors
    /// * `DimensionMismatch` if `u` has the wrong length; nothing is touched.
    /// * `ModelEvaluation` if the transition function fails; `x` and `P` are
    ///   untouched but `xp` and `Jf` may hold partial writes.
    pub fn predict(&mut self, u: &DVector<f64>) -> Result<()> {
        let expected = self.model.control_dim();
        if u.len() != expected {
            return Err(Error::DimensionMismatch {
                name: "control input",
                expected: expected.to_string(),
                got: u.len().to_string(),
            });
        }

        // xp = f(x, u), Jf = df/dx
        self.model.predict_state(&mut self.xp, &self.x, u, &mut self.jf)?;
        self.check_state_outputs()?;

        self.x.copy_from(&self.xp);

        // P = Jf (P Jf^T) + Q, with P Jf^T parked in the workspace so P is
        // only overwritten once nothing reads it anymore
        self.workspace.enter(Role::Covariance);
        {
            let mut p_jft = self.workspace.covariance_mut();
            p_jft.gemm(1.0, &self.p, &transpose_view(&self.jf), 0.0);
            self.p.copy_from(&self.q);
            self.p.gemm(1.0, &self.jf, &p_jft, 1.0);
        }
        self.workspace.release();

        log::trace!("predict: x={:?}", self.x.as_slice());
        Ok(())
    }
}
