//! Articulation link: mass properties, authoritative pose and inbound joint.

use nalgebra::{Isometry3, Matrix3, Vector3};
use sim_articulation_types::LinkDesc;

use super::joint::Joint;
use crate::spatial::{SpatialMatrix, SpatialVector, rigid_inertia};

/// One rigid link.
///
/// The link frame is the centre-of-mass frame; `pose` maps it to world.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub(crate) desc: LinkDesc,
    pub(crate) pose: Isometry3<f64>,
    pub(crate) joint: Option<Joint>,
    pub(crate) external_acceleration: SpatialVector,
}

impl Link {
    pub(crate) fn new(desc: LinkDesc, pose: Isometry3<f64>, joint: Option<Joint>) -> Self {
        Self {
            desc,
            pose,
            joint,
            external_acceleration: SpatialVector::zeros(),
        }
    }

    /// Mass properties and damping.
    #[must_use]
    pub fn desc(&self) -> &LinkDesc {
        &self.desc
    }

    /// World pose of the centre-of-mass frame.
    #[must_use]
    pub fn pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    /// World position of the centre of mass.
    #[must_use]
    pub fn position(&self) -> Vector3<f64> {
        self.pose.translation.vector
    }

    /// Inbound joint (`None` for the root).
    #[must_use]
    pub fn joint(&self) -> Option<&Joint> {
        self.joint.as_ref()
    }

    /// Pending external acceleration `[angular; linear]`, cleared after each step.
    #[must_use]
    pub fn external_acceleration(&self) -> &SpatialVector {
        &self.external_acceleration
    }

    /// Mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.desc.mass
    }

    /// Rotational inertia about the centre of mass in world axes.
    #[must_use]
    pub fn world_inertia(&self) -> Matrix3<f64> {
        let r = self.pose.rotation.to_rotation_matrix();
        r.matrix() * Matrix3::from_diagonal(&self.desc.inertia) * r.matrix().transpose()
    }

    /// Spatial inertia about the centre of mass in world axes.
    #[must_use]
    pub fn spatial_inertia(&self) -> SpatialMatrix {
        let r = self.pose.rotation.to_rotation_matrix();
        rigid_inertia(self.desc.mass, &self.desc.inertia, r.matrix())
    }
}
