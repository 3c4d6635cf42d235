//! Core type definitions for the articulation solver.
//!
//! This module contains the types every solver phase works on: the
//! articulation aggregate, its links and joints, the per-step caches, the
//! scratch arena and the warning table.

pub(crate) mod articulation;
pub(crate) mod data;
mod factories;
pub(crate) mod joint;
pub(crate) mod link;
pub(crate) mod scratch;
pub(crate) mod warning;

pub use articulation::Articulation;
pub use data::ArticulationData;
pub use joint::{Joint, JointCore, JointKinematics};
pub use link::Link;
pub use scratch::ScratchData;
pub use warning::{NUM_WARNINGS, Warning, WarningStat, WarningTable};
