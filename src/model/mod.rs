//! System models driving the filter.
//!
//! This module provides the model contract and two implementations:
//! - `LinearModel` - Constant F, B, H; Jacobians written once
//! - `ExtendedModel` - Closure-backed nonlinear model, relinearized every call

mod traits;
mod linear;
mod extended;

pub use traits::{Model, ModelError};
pub use linear::LinearModel;
pub use extended::{finite_difference_jacobian, ExtendedModel};
