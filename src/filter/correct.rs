//! Measurement update.
//!
//! With `S = Jh P Jh^T + R = L L^T` the gain `K = P Jh^T S^-1` is never formed.
//! Instead `U = P Jh^T L^-T` is obtained by one triangular solve, and
//!
//! ```text
//! x = x + U (L^-1 (z - zp))
//! P = P - U U^T
//! ```

use nalgebra::DVector;

use super::kalman::KalmanFilter;
use super::workspace::Role;
use crate::internal::{cholesky_lower_in_place, transpose_view};
use crate::model::Model;
use crate::utils::warn_once;
use crate::{Error, Result};

impl<M: Model> KalmanFilter<M> {
    /// Correct the estimate with a measurement.
    ///
    /// # Arguments
    /// * `z` - Measurement vector (m)
    ///
    /// # Errors
    /// * `DimensionMismatch` if `z` has the wrong length; nothing is touched.
    /// * `ModelEvaluation` if the measurement function fails.
    /// * `NotPositiveDefinite` if `Jh P Jh^T + R` has no Cholesky factor.
    ///
    /// After an error the estimate must be treated as indeterminate and
    /// reinitialized by the caller. In practice `x` and `P` are only written
    /// once every fallible step has passed, but `zp`, `Jh`, `S` and the
    /// workspace are clobbered.
    pub fn correct(&mut self, z: &DVector<f64>) -> Result<()> {
        if z.len() != self.n_meas {
            return Err(Error::DimensionMismatch {
                name: "measurement",
                expected: self.n_meas.to_string(),
                got: z.len().to_string(),
            });
        }

        // zp = h(x), Jh = dh/dx
        self.model.predict_measurement(&mut self.zp, &self.x, &mut self.jh)?;
        self.check_measurement_outputs()?;

        self.workspace.enter(Role::Gain);
        let result = self.fuse_measurement(z);
        self.workspace.release();

        if let Err(err) = &result {
            warn_once(&format!("measurement update failed: {}", err));
        } else {
            log::trace!("correct: x={:?}", self.x.as_slice());
        }
        result
    }

    fn fuse_measurement(&mut self, z: &DVector<f64>) -> Result<()> {
        // U = P Jh^T, S = Jh U + R
        {
            let mut u = self.workspace.gain_mut();
            u.gemm(1.0, &self.p, &transpose_view(&self.jh), 0.0);
            self.s.copy_from(&self.r);
            self.s.gemm(1.0, &self.jh, &u, 1.0);
        }

        // S = L L^T, lower triangle only. Every pivot of L is now strictly
        // positive, so the solves below cannot fail.
        cholesky_lower_in_place(&mut self.s)?;

        // U^T = L^-1 U^T
        {
            let mut ut = self.workspace.gain_transposed_mut();
            self.s.solve_lower_triangular_unchecked_mut(&mut ut);
        }

        // zw = L^-1 (z - zp)
        self.zw.copy_from(z);
        self.zw -= &self.zp;
        self.s.solve_lower_triangular_unchecked_mut(&mut self.zw);

        // x = x + U zw, P = P - U U^T
        let (u, ut) = self.workspace.gain_pair();
        self.x.gemv(1.0, &u, &self.zw, 1.0);
        self.p.gemm(-1.0, &u, &ut, 1.0);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{ExtendedModel, LinearModel, ModelError};
    use crate::{Error, ErrorKind, KalmanFilter};
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    fn position_only() -> LinearModel {
        LinearModel::without_control(
            DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.0, 1.0]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
        )
        .unwrap()
    }

    // ===== Against the textbook gain form =====

    #[test]
    fn test_correct_matches_gain_form() {
        let mut kf = KalmanFilter::new(2, 1, position_only()).unwrap();
        let p0 = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let r = DMatrix::from_element(1, 1, 3.0);
        let x0 = DVector::from_vec(vec![1.0, 0.5]);
        kf.set_state(&x0).unwrap();
        kf.set_covariance(&p0).unwrap();
        kf.set_measurement_noise(&r).unwrap();

        let z = DVector::from_vec(vec![2.4]);
        kf.correct(&z).unwrap();

        let h = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let s = &h * &p0 * h.transpose() + &r;
        let k = &p0 * h.transpose() * s.try_inverse().unwrap();
        let expected_x = &x0 + &k * (&z - &h * &x0);
        let expected_p = (DMatrix::identity(2, 2) - &k * &h) * &p0;

        for i in 0..2 {
            assert_relative_eq!(kf.state()[i], expected_x[i], epsilon = 1e-12);
            for j in 0..2 {
                assert_relative_eq!(kf.covariance()[(i, j)], expected_p[(i, j)], epsilon = 1e-12);
            }
        }

        // S = 7, so L = sqrt(7)
        assert_relative_eq!(kf.innovation_factor()[(0, 0)], 7.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(kf.predicted_measurement()[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correct_multi_measurement_matches_gain_form() {
        let h = DMatrix::from_row_slice(2, 3, &[
            1.0, 0.0, 0.5,
            0.0, 1.0, -1.0,
        ]);
        let model = LinearModel::without_control(DMatrix::identity(3, 3), h.clone()).unwrap();
        let mut kf = KalmanFilter::new(3, 2, model).unwrap();

        let p0 = DMatrix::from_row_slice(3, 3, &[
            2.0, 0.2, 0.1,
            0.2, 1.5, 0.3,
            0.1, 0.3, 1.0,
        ]);
        let r = DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.1, 0.4]);
        let x0 = DVector::from_vec(vec![0.0, 1.0, 2.0]);
        kf.set_state(&x0).unwrap();
        kf.set_covariance(&p0).unwrap();
        kf.set_measurement_noise(&r).unwrap();

        let z = DVector::from_vec(vec![1.5, -0.5]);
        kf.correct(&z).unwrap();

        let s = &h * &p0 * h.transpose() + &r;
        let k = &p0 * h.transpose() * s.try_inverse().unwrap();
        let expected_x = &x0 + &k * (&z - &h * &x0);
        let expected_p = (DMatrix::identity(3, 3) - &k * &h) * &p0;

        for i in 0..3 {
            assert_relative_eq!(kf.state()[i], expected_x[i], epsilon = 1e-10);
            for j in 0..3 {
                assert_relative_eq!(kf.covariance()[(i, j)], expected_p[(i, j)], epsilon = 1e-10);
            }
        }
    }

    // ===== Failure paths =====

    #[test]
    fn test_correct_rejects_wrong_measurement_length() {
        let mut kf = KalmanFilter::new(2, 1, position_only()).unwrap();
        kf.set_covariance(&DMatrix::identity(2, 2)).unwrap();

        let err = kf.correct(&DVector::zeros(2)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert_eq!(kf.covariance(), &DMatrix::identity(2, 2));
    }

    #[test]
    fn test_correct_not_positive_definite() {
        // Zero covariance and zero measurement noise give S = 0
        let mut kf = KalmanFilter::new(2, 1, position_only()).unwrap();
        kf.set_state(&DVector::from_vec(vec![1.0, 2.0])).unwrap();

        let err = kf.correct(&DVector::from_vec(vec![5.0])).unwrap_err();

        assert_eq!(err, Error::NotPositiveDefinite);
        assert_eq!(err.kind(), ErrorKind::Math);
        assert_eq!(kf.state(), &DVector::from_vec(vec![1.0, 2.0]));
        assert_eq!(kf.workspace().active_role(), None);
    }

    #[test]
    fn test_correct_ill_conditioned_but_positive_definite() {
        // S = [[1, 1], [1, 1 + 1e-12]]: the second pivot is tiny but positive
        let h = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1e-6]);
        let model = LinearModel::without_control(DMatrix::identity(2, 2), h).unwrap();
        let mut kf = KalmanFilter::new(2, 2, model).unwrap();
        kf.set_covariance(&DMatrix::identity(2, 2)).unwrap();

        kf.correct(&DVector::from_vec(vec![1.0, 1.0])).unwrap();

        let l = kf.innovation_factor();
        assert!(l[(0, 0)] > 0.0 && l[(1, 1)] > 0.0);
        assert!(kf.state().iter().all(|v| v.is_finite()));
        assert!(kf.covariance().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_correct_model_failure() {
        let model = ExtendedModel::new(
            0,
            |_xp: &mut DVector<f64>, _x: &DVector<f64>, _u: &DVector<f64>, _jf: &mut DMatrix<f64>| Ok(()),
            |_zp: &mut DVector<f64>, _x: &DVector<f64>, _jh: &mut DMatrix<f64>| {
                Err(ModelError::new("sensor model undefined at origin"))
            },
        );
        let mut kf = KalmanFilter::new(1, 1, model).unwrap();

        let err = kf.correct(&DVector::zeros(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelEvaluation);
    }

    #[test]
    fn test_correct_rejects_resized_jacobian() {
        let model = ExtendedModel::new(
            0,
            |_xp: &mut DVector<f64>, _x: &DVector<f64>, _u: &DVector<f64>, _jf: &mut DMatrix<f64>| Ok(()),
            |_zp: &mut DVector<f64>, _x: &DVector<f64>, jh: &mut DMatrix<f64>| {
                *jh = DMatrix::zeros(4, 4);
                Ok(())
            },
        );
        let mut kf = KalmanFilter::new(2, 1, model).unwrap();

        let err = kf.correct(&DVector::zeros(1)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ModelEvaluation);
        assert_eq!(kf.measurement_jacobian().shape(), (1, 2));
    }
}
