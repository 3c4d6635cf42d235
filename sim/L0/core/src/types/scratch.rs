//! Reusable per-step buffers.
//!
//! Sized from the link and DOF counts once per step; after the first step
//! at a given topology nothing here reallocates.

use crate::spatial::SpatialVector;

/// Scratch buffers shared by the solver phases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScratchData {
    /// Per-link velocity change from deferred impulses.
    pub(crate) link_delta_v: Vec<SpatialVector>,
    /// Per-DOF velocity change from deferred impulses.
    pub(crate) joint_delta_v: Vec<f64>,
    /// Joint velocities after the position iterations.
    pub(crate) pos_joint_velocity: Vec<f64>,
    /// Link velocities after the position iterations.
    pub(crate) pos_link_velocity: Vec<SpatialVector>,
    /// Per-link impulse accumulator of one solver sweep.
    pub(crate) impulses: Vec<SpatialVector>,
    /// Per-link `Z` accumulator for batch impulse application.
    pub(crate) z: Vec<SpatialVector>,
    /// Per-link velocities for inverse dynamics.
    pub(crate) velocities: Vec<SpatialVector>,
    /// Per-link accelerations for inverse dynamics.
    pub(crate) accelerations: Vec<SpatialVector>,
    /// Per-link forces for inverse dynamics.
    pub(crate) forces: Vec<SpatialVector>,
}

impl ScratchData {
    /// Size every buffer for `links` links and `dofs` DOFs.
    pub fn ensure(&mut self, links: usize, dofs: usize) {
        let z6 = SpatialVector::zeros();
        for buf in [
            &mut self.link_delta_v,
            &mut self.pos_link_velocity,
            &mut self.impulses,
            &mut self.z,
            &mut self.velocities,
            &mut self.accelerations,
            &mut self.forces,
        ] {
            buf.resize(links, z6);
        }
        self.joint_delta_v.resize(dofs, 0.0);
        self.pos_joint_velocity.resize(dofs, 0.0);
    }

    /// Number of links the buffers hold.
    #[must_use]
    pub fn link_capacity(&self) -> usize {
        self.impulses.len()
    }

    /// Number of DOFs the buffers hold.
    #[must_use]
    pub fn dof_capacity(&self) -> usize {
        self.joint_delta_v.len()
    }
}
