//! Scratch arena shared by the predict and correct steps.
//!
//! One buffer of `max(n, m)^2` values is allocated with the filter. Each step
//! borrows it under a role and reinterprets it through strided views:
//!
//! | Role | View | Shape |
//! |---|---|---|
//! | `Covariance` | `P Jf^T` | n x n |
//! | `Gain` | `U` | n x m |
//! | `Gain` | `U^T` (same storage) | m x n |
//!
//! Views borrow the workspace, so the borrow checker already keeps two
//! mutable views from coexisting. The role tag additionally catches a step
//! reaching for the other step's layout; it is checked in debug builds.

use crate::internal::{ArenaView, ArenaViewMut};
use crate::{Error, Result};

/// Which step currently owns the workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Time update: `P Jf^T` scratch.
    Covariance,
    /// Measurement update: `U` and its transpose.
    Gain,
}

/// Single scratch arena carved into role-specific views.
#[derive(Clone, Debug)]
pub struct Workspace {
    data: Vec<f64>,
    n_state: usize,
    n_meas: usize,
    active: Option<Role>,
}

impl Workspace {
    /// Allocate the arena for an `n_state` / `n_meas` filter.
    ///
    /// Every role footprint is checked against the arena here, so the view
    /// accessors never fail afterwards.
    pub fn new(n_state: usize, n_meas: usize) -> Result<Self> {
        let side = n_state.max(n_meas);
        let capacity = side.checked_mul(side).ok_or(Error::WorkspaceOverflow {
            rows: side,
            cols: side,
            capacity: usize::MAX,
        })?;
        let workspace = Self {
            data: vec![0.0; capacity],
            n_state,
            n_meas,
            active: None,
        };

        workspace.check_fits(n_state, n_state)?;
        workspace.check_fits(n_state, n_meas)?;
        workspace.check_fits(n_meas, n_state)?;
        Ok(workspace)
    }

    /// Number of f64 slots in the arena.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Role currently holding the arena, if any.
    #[inline(always)]
    pub fn active_role(&self) -> Option<Role> {
        self.active
    }

    /// Mark `role` as live. Roles do not nest.
    pub fn enter(&mut self, role: Role) {
        debug_assert!(
            self.active.is_none(),
            "workspace entered as {:?} while {:?} is still active",
            role,
            self.active
        );
        self.active = Some(role);
    }

    /// End the current role.
    pub fn release(&mut self) {
        self.active = None;
    }

    /// Time-update scratch (n x n).
    pub fn covariance_mut(&mut self) -> ArenaViewMut<'_> {
        self.expect_role(Role::Covariance);
        let n = self.n_state;
        Self::column_major_mut(&mut self.data, n, n)
    }

    /// `U = P Jh^T` (n x m).
    pub fn gain_mut(&mut self) -> ArenaViewMut<'_> {
        self.expect_role(Role::Gain);
        let (n, m) = (self.n_state, self.n_meas);
        Self::column_major_mut(&mut self.data, n, m)
    }

    /// `U^T` (m x n), aliasing the storage of [`Workspace::gain_mut`].
    pub fn gain_transposed_mut(&mut self) -> ArenaViewMut<'_> {
        self.expect_role(Role::Gain);
        let (n, m) = (self.n_state, self.n_meas);
        ArenaViewMut::from_slice_with_strides_mut(&mut self.data, m, n, n, 1)
    }

    /// Read-only `(U, U^T)` over the same storage.
    pub fn gain_pair(&self) -> (ArenaView<'_>, ArenaView<'_>) {
        self.expect_role(Role::Gain);
        let (n, m) = (self.n_state, self.n_meas);
        (
            ArenaView::from_slice_with_strides(&self.data, n, m, 1, n),
            ArenaView::from_slice_with_strides(&self.data, m, n, n, 1),
        )
    }

    fn check_fits(&self, rows: usize, cols: usize) -> Result<()> {
        let needed = rows.checked_mul(cols).unwrap_or(usize::MAX);
        if needed > self.data.len() {
            return Err(Error::WorkspaceOverflow {
                rows,
                cols,
                capacity: self.data.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn column_major_mut(data: &mut [f64], rows: usize, cols: usize) -> ArenaViewMut<'_> {
        ArenaViewMut::from_slice_with_strides_mut(data, rows, cols, 1, rows)
    }

    #[inline]
    fn expect_role(&self, role: Role) {
        debug_assert_eq!(
            self.active,
            Some(role),
            "workspace view for {:?} requested while {:?} is active",
            role,
            self.active
        );
    }
}
