//! Internal numeric primitives.
//!
//! nalgebra covers multiplication, strided views and triangular solves. The
//! pieces here fill the gaps the engine needs to stay allocation-free:
//! - linalg: in-place lower Cholesky, transposed views over owned matrices

pub mod linalg;

pub use linalg::{cholesky_lower_in_place, transpose_view, ArenaView, ArenaViewMut};
