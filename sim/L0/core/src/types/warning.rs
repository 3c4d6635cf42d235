//! Warning tracking for numerical recovery during a step.
//!
//! Ill-conditioned inputs never abort a step. The solver recovers in place
//! (zeroing a degenerate block, clamping a velocity) and records the event
//! here. Each kind is logged once through `tracing` and counted on every
//! occurrence until [`WarningTable::clear`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kinds of recovered numerical events.
/// `repr(u8)` for compact storage; cast to `usize` for array indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Warning {
    /// A constraint row's unit response was too small to invert.
    DegenerateResponse = 0,
    /// The floating base's articulated inertia is not positive definite.
    SingularBaseInertia = 1,
    /// A joint's `SᵀIS` block is singular.
    DegenerateJointInertia = 2,
    /// A joint velocity exceeded its bound and was clamped.
    VelocityClamped = 3,
    /// A joint position or velocity was NaN or infinite.
    BadJointState = 4,
}

/// Number of warning kinds.
pub const NUM_WARNINGS: usize = 5;

/// Per-warning statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WarningStat {
    /// Link or DOF index that triggered the most recent occurrence.
    pub last_info: i32,
    /// Cumulative count since the last reset.
    pub count: i32,
}

fn warning_text(warning: Warning, info: i32) -> String {
    match warning {
        Warning::DegenerateResponse => {
            format!("degenerate constraint response at link {info}, row skipped")
        }
        Warning::SingularBaseInertia => {
            format!("singular articulated base inertia (links={info}), base held still")
        }
        Warning::DegenerateJointInertia => {
            format!("singular joint inertia at link {info}, joint treated as rigid")
        }
        Warning::VelocityClamped => format!("joint velocity clamped at dof {info}"),
        Warning::BadJointState => format!("non-finite joint state at dof {info}, reset to zero"),
    }
}

/// Warning counters of one articulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WarningTable {
    stats: [WarningStat; NUM_WARNINGS],
}

impl WarningTable {
    /// Record a warning and log it on first occurrence only.
    pub fn record(&mut self, warning: Warning, info: i32) {
        let w = &mut self.stats[warning as usize];
        if w.count == 0 {
            tracing::warn!("articulation warning: {}", warning_text(warning, info));
        }
        w.last_info = info;
        w.count += 1;
    }

    /// Record a warning tagged with a link or DOF index.
    pub(crate) fn record_at(&mut self, warning: Warning, index: usize) {
        self.record(warning, i32::try_from(index).unwrap_or(i32::MAX));
    }

    /// Statistics for one kind.
    #[must_use]
    pub fn stat(&self, warning: Warning) -> WarningStat {
        self.stats[warning as usize]
    }

    /// Occurrences of one kind since the last reset.
    #[must_use]
    pub fn count(&self, warning: Warning) -> i32 {
        self.stats[warning as usize].count
    }

    /// Whether anything was recorded since the last reset.
    #[must_use]
    pub fn any(&self) -> bool {
        self.stats.iter().any(|s| s.count > 0)
    }

    /// Reset every counter.
    pub fn clear(&mut self) {
        self.stats = [WarningStat::default(); NUM_WARNINGS];
    }
}
