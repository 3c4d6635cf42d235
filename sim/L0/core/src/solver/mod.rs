//! Internal constraint solver: joint limits, drives, friction, soft locks
//! and external rows, solved by projected Gauss-Seidel sweeps over the tree.
//!
//! Rows are built once per step (`internal::setup`) and solved by repeated
//! root-to-leaf sweeps (`sweep`). A sweep never touches link velocities
//! directly: each link's net impulse is deferred and folded into velocities
//! by `flush_velocities`.

pub(crate) mod external;
pub(crate) mod internal;
pub(crate) mod sweep;

pub use external::ExternalConstraint;
pub use internal::{InternalConstraint, LockedAxisConstraint};

/// Unit responses at or below this are treated as degenerate and skipped.
pub const MIN_RESPONSE: f64 = 1e-10;

/// Constraint force mixing added to every row's response before inverting.
pub const CFM: f64 = 1e-8;

/// Reciprocal of a row's unit response, or zero for a degenerate row.
#[must_use]
pub fn recip_response(response: f64) -> f64 {
    if response > MIN_RESPONSE {
        1.0 / (response + CFM)
    } else {
        0.0
    }
}

/// Index ranges of one link's rows in the flat row arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LinkRows {
    pub(crate) internal: (usize, usize),
    pub(crate) locks: (usize, usize),
    pub(crate) external: (usize, usize),
}

/// Rows of one step.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConstraintSet {
    pub(crate) internal: Vec<InternalConstraint>,
    pub(crate) locks: Vec<LockedAxisConstraint>,
    /// Queued rows; sorted by link at setup.
    pub(crate) external: Vec<ExternalConstraint>,
    /// Rows consumed by the last step, with their applied impulses.
    pub(crate) solved_external: Vec<ExternalConstraint>,
    pub(crate) rows: Vec<LinkRows>,
}

impl ConstraintSet {
    pub(crate) fn resize_links(&mut self, links: usize) {
        self.rows.resize(links, LinkRows::default());
    }

    /// Drop every row, queued or built.
    pub(crate) fn clear(&mut self) {
        self.internal.clear();
        self.locks.clear();
        self.external.clear();
        self.solved_external.clear();
        self.rows.iter_mut().for_each(|r| *r = LinkRows::default());
    }

    /// Move the queued external rows to the solved list.
    pub(crate) fn retire_external(&mut self) {
        self.solved_external.clear();
        self.solved_external.append(&mut self.external);
    }
}
