//! Kalman filter engine.
//!
//! This module provides the filter state and its two steps:
//! - `KalmanFilter::predict` - Time update through the model's transition function
//! - `KalmanFilter::correct` - Cholesky-based measurement update
//! - `Workspace` - The single scratch arena both steps borrow from

mod kalman;
mod predict;
mod correct;
mod workspace;

pub use kalman::{FilterConfig, KalmanFilter};
pub use workspace::{Role, Workspace};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtendedModel, LinearModel, Model, ModelError};
    use crate::utils::max_asymmetry;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    const DT: f64 = 0.1;

    fn transition() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[1.0, DT, 0.0, 1.0])
    }

    fn control() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 1, &[DT * DT / 2.0, DT])
    }

    fn observation() -> DMatrix<f64> {
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0])
    }

    fn configure<M: Model>(kf: &mut KalmanFilter<M>) {
        kf.set_covariance(&DMatrix::from_row_slice(2, 2, &[10.0, 0.0, 0.0, 1.0])).unwrap();
        kf.set_process_noise(&DMatrix::from_row_slice(2, 2, &[0.01, 0.005, 0.005, 0.02])).unwrap();
        kf.set_measurement_noise(&DMatrix::from_element(1, 1, 4.0)).unwrap();
    }

    // ===== Linear vs Extended =====

    #[test]
    fn test_linear_and_extended_agree() {
        // The same linear system expressed once as a LinearModel and once
        // through closures that rewrite the Jacobian on every call
        let linear = LinearModel::new(transition(), control(), observation()).unwrap();
        let extended = ExtendedModel::new(
            1,
            |xp: &mut DVector<f64>, x: &DVector<f64>, u: &DVector<f64>, jf: &mut DMatrix<f64>| {
                jf.copy_from(&transition());
                xp.copy_from(&(transition() * x + control() * u));
                Ok(())
            },
            |zp: &mut DVector<f64>, x: &DVector<f64>, jh: &mut DMatrix<f64>| {
                jh.copy_from(&observation());
                zp[0] = x[0];
                Ok(())
            },
        );

        let mut kf_lin = KalmanFilter::new(2, 1, linear).unwrap();
        let mut kf_ext = KalmanFilter::new(2, 1, extended).unwrap();
        configure(&mut kf_lin);
        configure(&mut kf_ext);

        let u = DVector::from_vec(vec![0.4]);
        for i in 0..20 {
            let z = DVector::from_vec(vec![0.2 * i as f64 + if i % 2 == 0 { 0.3 } else { -0.3 }]);
            kf_lin.correct(&z).unwrap();
            kf_ext.correct(&z).unwrap();
            kf_lin.predict(&u).unwrap();
            kf_ext.predict(&u).unwrap();
        }

        for i in 0..2 {
            assert_relative_eq!(kf_lin.state()[i], kf_ext.state()[i], epsilon = 1e-12);
            for j in 0..2 {
                assert_relative_eq!(
                    kf_lin.covariance()[(i, j)],
                    kf_ext.covariance()[(i, j)],
                    epsilon = 1e-12
                );
            }
        }
    }

    // ===== Dynamic dispatch =====

    #[test]
    fn test_boxed_model() {
        let model: Box<dyn Model> =
            Box::new(LinearModel::new(transition(), control(), observation()).unwrap());
        let mut kf = KalmanFilter::new(2, 1, model).unwrap();
        configure(&mut kf);

        kf.correct(&DVector::from_vec(vec![1.0])).unwrap();
        kf.predict(&DVector::from_vec(vec![0.0])).unwrap();

        assert!(kf.state()[0] > 0.0);
        assert_eq!(kf.model().control_dim(), 1);
    }

    // ===== Covariance stays symmetric =====

    #[test]
    fn test_covariance_stays_symmetric() {
        let model = LinearModel::new(transition(), control(), observation()).unwrap();
        let mut kf = KalmanFilter::new(2, 1, model).unwrap();
        configure(&mut kf);

        let u = DVector::from_vec(vec![0.4]);
        for i in 0..200 {
            kf.predict(&u).unwrap();
            assert!(max_asymmetry(kf.covariance()) < 1e-9, "step {} predict", i);
            kf.correct(&DVector::from_vec(vec![(i as f64).sin()])).unwrap();
            assert!(max_asymmetry(kf.covariance()) < 1e-9, "step {} correct", i);
        }
    }

    // ===== Lazy Jacobian initialization stays in the model =====

    #[test]
    fn test_linear_model_initializes_through_filter_once() {
        let model = LinearModel::new(transition(), control(), observation()).unwrap();
        let mut kf = KalmanFilter::new(2, 1, model).unwrap();
        configure(&mut kf);
        assert_eq!(kf.model().jacobians_ready(), (false, false));

        kf.predict(&DVector::from_vec(vec![0.0])).unwrap();
        kf.correct(&DVector::from_vec(vec![0.0])).unwrap();

        assert_eq!(kf.model().jacobians_ready(), (true, true));
        assert_eq!(kf.state_jacobian(), &transition());
        assert_eq!(kf.measurement_jacobian(), &observation());
    }

    fn scalar_filter(model: LinearModel) -> KalmanFilter<LinearModel> {
        let mut kf = KalmanFilter::new(1, 1, model).unwrap();
        kf.set_covariance(&DMatrix::from_element(1, 1, 1.0)).unwrap();
        kf.set_measurement_noise(&DMatrix::from_element(1, 1, 1.0)).unwrap();
        kf
    }

    fn random_walk() -> LinearModel {
        LinearModel::without_control(DMatrix::identity(1, 1), DMatrix::identity(1, 1)).unwrap()
    }

    #[test]
    fn test_model_moved_between_filters_rewrites_jacobians() {
        let mut first = scalar_filter(random_walk());
        first.correct(&DVector::from_vec(vec![1.0])).unwrap();
        assert_eq!(first.model().jacobians_ready(), (false, true));

        // S = 2, K = 0.5
        let mut second = scalar_filter(first.into_model());
        second.correct(&DVector::from_vec(vec![10.0])).unwrap();

        assert_eq!(second.measurement_jacobian(), &DMatrix::identity(1, 1));
        assert_relative_eq!(second.state()[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(second.covariance()[(0, 0)], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cloned_model_in_new_filter_rewrites_jacobians() {
        let mut first = scalar_filter(random_walk());
        first.predict(&DVector::zeros(0)).unwrap();
        first.correct(&DVector::from_vec(vec![1.0])).unwrap();

        let mut second = scalar_filter(first.model().clone());
        second.predict(&DVector::zeros(0)).unwrap();
        second.correct(&DVector::from_vec(vec![10.0])).unwrap();

        // Jf = 1 carries P = 1 through predict unchanged
        assert_eq!(second.state_jacobian(), &DMatrix::identity(1, 1));
        assert_relative_eq!(second.state()[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(second.covariance()[(0, 0)], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_boxed_model_forwards_attach() {
        let mut first = scalar_filter(random_walk());
        first.correct(&DVector::from_vec(vec![1.0])).unwrap();

        let boxed: Box<dyn Model> = Box::new(first.into_model());
        let mut second = KalmanFilter::new(1, 1, boxed).unwrap();
        second.set_covariance(&DMatrix::from_element(1, 1, 1.0)).unwrap();
        second.set_measurement_noise(&DMatrix::from_element(1, 1, 1.0)).unwrap();
        second.correct(&DVector::from_vec(vec![10.0])).unwrap();

        assert_relative_eq!(second.state()[0], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_model_error_passes_through_unchanged() {
        let model = ExtendedModel::new(
            0,
            |_xp: &mut DVector<f64>, _x: &DVector<f64>, _u: &DVector<f64>, _jf: &mut DMatrix<f64>| {
                Err(ModelError::new("transition diverged"))
            },
            |_zp: &mut DVector<f64>, _x: &DVector<f64>, _jh: &mut DMatrix<f64>| Ok(()),
        );
        let mut kf = KalmanFilter::new(1, 1, model).unwrap();

        let err = kf.predict(&DVector::zeros(0)).unwrap_err();
        assert_eq!(err, crate::Error::ModelEvaluation(ModelError::new("transition diverged")));
    }
}
