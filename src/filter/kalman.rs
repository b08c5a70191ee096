//! Filter state: owned buffers, construction and accessors.

use nalgebra::{DMatrix, DVector};

use super::workspace::Workspace;
use crate::model::Model;
use crate::utils::{validate_shape, validate_symmetric, validate_vector};
use crate::{Error, Result};

/// Configuration for a filter.
///
/// Everything except the dimensions is optional and defaults to zero, matching
/// a freshly constructed [`KalmanFilter`].
#[derive(Clone, Debug)]
pub struct FilterConfig {
    /// State dimension n.
    pub n_state: usize,

    /// Measurement dimension m.
    pub n_meas: usize,

    /// Initial state estimate x (n).
    pub initial_state: Option<DVector<f64>>,

    /// Initial state covariance P (n x n, symmetric).
    pub initial_covariance: Option<DMatrix<f64>>,

    /// Process noise covariance Q (n x n, symmetric).
    pub process_noise: Option<DMatrix<f64>>,

    /// Measurement noise covariance R (m x m, symmetric).
    pub measurement_noise: Option<DMatrix<f64>>,
}

impl FilterConfig {
    /// Create a configuration with zero initial state and noise.
    ///
    /// # Arguments
    /// * `n_state` - State dimension
    /// * `n_meas` - Measurement dimension
    pub fn new(n_state: usize, n_meas: usize) -> Self {
        Self {
            n_state,
            n_meas,
            initial_state: None,
            initial_covariance: None,
            process_noise: None,
            measurement_noise: None,
        }
    }

    /// Check dimensions and symmetry of everything provided.
    pub fn validate(&self) -> Result<()> {
        check_dimensions(self.n_state, self.n_meas)?;
        if let Some(x) = &self.initial_state {
            validate_vector("initial state", x, self.n_state)?;
        }
        if let Some(p) = &self.initial_covariance {
            validate_symmetric("initial covariance", p, self.n_state)?;
        }
        if let Some(q) = &self.process_noise {
            validate_symmetric("process noise", q, self.n_state)?;
        }
        if let Some(r) = &self.measurement_noise {
            validate_symmetric("measurement noise", r, self.n_meas)?;
        }
        Ok(())
    }
}

fn check_dimensions(n_state: usize, n_meas: usize) -> Result<()> {
    if n_state == 0 || n_meas == 0 {
        return Err(Error::InvalidConfig(format!(
            "dimensions must be positive, got n_state={} n_meas={}",
            n_state, n_meas
        )));
    }
    Ok(())
}

/// Kalman filter (linear or extended, depending on the model).
///
/// All buffers are allocated by the constructor and mutated in place by
/// [`KalmanFilter::predict`] and [`KalmanFilter::correct`]; nothing is
/// reallocated in steady state. Dropping the filter releases everything,
/// including the model.
///
/// A filter is a plain value: it can be moved to another thread when the
/// model can, but a call to `predict` or `correct` needs `&mut self`, so one
/// instance never runs two steps at once.
#[derive(Clone, Debug)]
pub struct KalmanFilter<M> {
    pub(super) n_state: usize,
    pub(super) n_meas: usize,

    /// State estimate (n)
    pub(super) x: DVector<f64>,
    /// Predicted state (n)
    pub(super) xp: DVector<f64>,
    /// Predicted measurement (m)
    pub(super) zp: DVector<f64>,
    /// Innovation, then the whitened innovation after the solve (m)
    pub(super) zw: DVector<f64>,

    /// State covariance (n x n)
    pub(super) p: DMatrix<f64>,
    /// Process noise (n x n)
    pub(super) q: DMatrix<f64>,
    /// Measurement noise (m x m)
    pub(super) r: DMatrix<f64>,
    /// Innovation covariance; lower triangle holds its Cholesky factor after a correction (m x m)
    pub(super) s: DMatrix<f64>,

    /// Jacobian of the state transition (n x n)
    pub(super) jf: DMatrix<f64>,
    /// Jacobian of the measurement function (m x n)
    pub(super) jh: DMatrix<f64>,

    pub(super) workspace: Workspace,
    pub(super) model: M,
}

impl<M: Model> KalmanFilter<M> {
    /// Create a new filter with every vector and matrix set to zero.
    ///
    /// # Arguments
    /// * `n_state` - State dimension n
    /// * `n_meas` - Measurement dimension m
    /// * `model` - State-transition and measurement functions plus their context
    pub fn new(n_state: usize, n_meas: usize, mut model: M) -> Result<Self> {
        check_dimensions(n_state, n_meas)?;

        // Acquired first so an overflow leaves nothing else allocated
        let workspace = Workspace::new(n_state, n_meas)?;
        // Buffers below start at zero, whatever the model wrote elsewhere
        model.attach();

        log::debug!(
            "created Kalman filter: n_state={} n_meas={} workspace={}",
            n_state,
            n_meas,
            workspace.capacity()
        );

        Ok(Self {
            n_state,
            n_meas,
            x: DVector::zeros(n_state),
            xp: DVector::zeros(n_state),
            zp: DVector::zeros(n_meas),
            zw: DVector::zeros(n_meas),
            p: DMatrix::zeros(n_state, n_state),
            q: DMatrix::zeros(n_state, n_state),
            r: DMatrix::zeros(n_meas, n_meas),
            s: DMatrix::zeros(n_meas, n_meas),
            jf: DMatrix::zeros(n_state, n_state),
            jh: DMatrix::zeros(n_meas, n_state),
            workspace,
            model,
        })
    }

    /// Create a filter from a validated configuration.
    pub fn from_config(config: FilterConfig, model: M) -> Result<Self> {
        config.validate()?;

        let mut filter = Self::new(config.n_state, config.n_meas, model)?;
        if let Some(x) = config.initial_state {
            filter.x = x;
        }
        if let Some(p) = config.initial_covariance {
            filter.p = p;
        }
        if let Some(q) = config.process_noise {
            filter.q = q;
        }
        if let Some(r) = config.measurement_noise {
            filter.r = r;
        }
        Ok(filter)
    }

    /// Check the buffers a model callback may have touched after predict_state.
    pub(super) fn check_state_outputs(&mut self) -> Result<()> {
        let n = self.n_state;
        let ok = self.xp.len() == n && self.jf.shape() == (n, n);
        if !ok {
            let got = format!("xp {} / Jf {}x{}", self.xp.len(), self.jf.nrows(), self.jf.ncols());
            self.xp = DVector::zeros(n);
            self.jf = DMatrix::zeros(n, n);
            return Err(Error::ModelEvaluation(crate::ModelError::new(format!(
                "state function resized its outputs ({}), expected xp {} / Jf {}x{}",
                got, n, n, n
            ))));
        }
        Ok(())
    }

    /// Check the buffers a model callback may have touched after predict_measurement.
    pub(super) fn check_measurement_outputs(&mut self) -> Result<()> {
        let (n, m) = (self.n_state, self.n_meas);
        let ok = self.zp.len() == m && self.jh.shape() == (m, n);
        if !ok {
            let got = format!("zp {} / Jh {}x{}", self.zp.len(), self.jh.nrows(), self.jh.ncols());
            self.zp = DVector::zeros(m);
            self.jh = DMatrix::zeros(m, n);
            return Err(Error::ModelEvaluation(crate::ModelError::new(format!(
                "measurement function resized its outputs ({}), expected zp {} / Jh {}x{}",
                got, m, m, n
            ))));
        }
        Ok(())
    }
}

impl<M> KalmanFilter<M> {
    /// State dimension n.
    #[inline(always)]
    pub fn n_state(&self) -> usize {
        self.n_state
    }

    /// Measurement dimension m.
    #[inline(always)]
    pub fn n_meas(&self) -> usize {
        self.n_meas
    }

    /// Current state estimate.
    pub fn state(&self) -> &DVector<f64> {
        &self.x
    }

    /// Mutable state estimate, for in-place initialization.
    pub fn state_mut(&mut self) -> &mut DVector<f64> {
        &mut self.x
    }

    /// Replace the state estimate.
    pub fn set_state(&mut self, x: &DVector<f64>) -> Result<()> {
        validate_vector("state", x, self.n_state)?;
        self.x.copy_from(x);
        Ok(())
    }

    /// Current state covariance.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    /// Mutable state covariance. The caller keeps it symmetric.
    pub fn covariance_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.p
    }

    /// Replace the state covariance.
    pub fn set_covariance(&mut self, p: &DMatrix<f64>) -> Result<()> {
        validate_symmetric("covariance", p, self.n_state)?;
        self.p.copy_from(p);
        Ok(())
    }

    /// Process noise covariance Q.
    pub fn process_noise(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Mutable process noise. The caller keeps it symmetric.
    pub fn process_noise_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.q
    }

    /// Replace the process noise covariance.
    pub fn set_process_noise(&mut self, q: &DMatrix<f64>) -> Result<()> {
        validate_symmetric("process noise", q, self.n_state)?;
        self.q.copy_from(q);
        Ok(())
    }

    /// Measurement noise covariance R.
    pub fn measurement_noise(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Mutable measurement noise. The caller keeps it symmetric.
    pub fn measurement_noise_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.r
    }

    /// Replace the measurement noise covariance.
    pub fn set_measurement_noise(&mut self, r: &DMatrix<f64>) -> Result<()> {
        validate_symmetric("measurement noise", r, self.n_meas)?;
        self.r.copy_from(r);
        Ok(())
    }

    /// State predicted by the last call to the transition function.
    pub fn predicted_state(&self) -> &DVector<f64> {
        &self.xp
    }

    /// Measurement predicted by the last call to the measurement function.
    pub fn predicted_measurement(&self) -> &DVector<f64> {
        &self.zp
    }

    /// Lower Cholesky factor of the last innovation covariance.
    ///
    /// Only meaningful after a successful [`KalmanFilter::correct`].
    pub fn innovation_factor(&self) -> DMatrix<f64> {
        self.s.lower_triangle()
    }

    /// Jacobian of the state transition from the last prediction.
    pub fn state_jacobian(&self) -> &DMatrix<f64> {
        &self.jf
    }

    /// Jacobian of the measurement function from the last correction.
    pub fn measurement_jacobian(&self) -> &DMatrix<f64> {
        &self.jh
    }

    /// The model and its context.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model and its context.
    ///
    /// Replacing the model through this reference skips [`Model::attach`];
    /// call it on the new value before the next step.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The scratch arena.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Take the model back, dropping every buffer.
    pub fn into_model(self) -> M {
        self.model
    }
}
