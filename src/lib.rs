//! # kalman_rs - Linear and Extended Kalman Filter
//!
//! Recursive Bayesian state estimation with a predict/correct engine that
//! never allocates after construction.
//!
//! ## Features
//!
//! - One engine for linear and extended filters, selected by the [`Model`] you plug in
//! - Cholesky-based correction without forming or inverting a gain matrix
//! - A single scratch arena per filter, carved into shape-checked views
//! - Status-style errors ([`ErrorKind`]) instead of panics
//!
//! ## Example
//!
//! ```rust,ignore
//! use kalman_rs::{KalmanFilter, LinearModel};
//! use nalgebra::{DMatrix, DVector};
//!
//! let dt = 0.1;
//! let model = LinearModel::new(
//!     DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]),
//!     DMatrix::from_row_slice(2, 1, &[dt * dt / 2.0, dt]),
//!     DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
//! )
//! .unwrap();
//!
//! let mut kf = KalmanFilter::new(2, 1, model).unwrap();
//! kf.measurement_noise_mut()[(0, 0)] = 100.0;
//!
//! kf.correct(&DVector::from_vec(vec![0.3])).unwrap();
//! kf.predict(&DVector::from_vec(vec![0.4])).unwrap();
//! ```

// Internal numeric primitives not covered by nalgebra
pub(crate) mod internal;

// Public modules
pub mod filter;
pub mod model;
pub mod utils;

// Re-exports for convenience
pub use filter::{FilterConfig, KalmanFilter, Role, Workspace};
pub use model::{finite_difference_jacobian, ExtendedModel, LinearModel, Model, ModelError};

// Error types
pub use crate::error::{Error, ErrorKind, Result};

mod error {
    use thiserror::Error;

    use crate::model::ModelError;

    /// Coarse classification of an [`Error`], one per status code.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ErrorKind {
        /// Caller contract violation: wrong dimensions or invalid configuration.
        Parameter,
        /// The user-supplied model failed.
        ModelEvaluation,
        /// A numerical precondition was violated.
        Math,
    }

    /// Errors that can occur while building or running a filter
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum Error {
        #[error("Dimension mismatch for {name}: expected {expected}, got {got}")]
        DimensionMismatch {
            name: &'static str,
            expected: String,
            got: String,
        },

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Workspace view {rows}x{cols} exceeds arena of {capacity} elements")]
        WorkspaceOverflow {
            rows: usize,
            cols: usize,
            capacity: usize,
        },

        #[error("Model evaluation failed: {0}")]
        ModelEvaluation(#[from] ModelError),

        #[error("Innovation covariance is not positive definite")]
        NotPositiveDefinite,
    }

    impl Error {
        /// Status code this error maps to.
        pub fn kind(&self) -> ErrorKind {
            match self {
                Error::DimensionMismatch { .. }
                | Error::InvalidConfig(_)
                | Error::WorkspaceOverflow { .. } => ErrorKind::Parameter,
                Error::ModelEvaluation(_) => ErrorKind::ModelEvaluation,
                Error::NotPositiveDefinite => ErrorKind::Math,
            }
        }
    }

    /// Result type for filter operations
    pub type Result<T> = std::result::Result<T, Error>;

}
