//! Recursive Newton-Euler inverse dynamics at the current poses.
//!
//! Generalized coordinates are the joint DOFs, preceded by the root's
//! `[ω; v]` when the base floats. The recursion uses the same
//! velocity-product and gyroscopic terms as the forward pass, so feeding it
//! the accelerations of a forward pass returns the applied joint forces.

use nalgebra::Vector3;

use crate::forward::velocity_product;
use crate::spatial::{SpatialVector, angular, joint_vector, spatial, transport_force, transport_motion};
use crate::types::{Articulation, JointKinematics};

/// Root motion fed into the recursion. Ignored for a fixed base.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RootMotion {
    pub(crate) velocity: SpatialVector,
    pub(crate) acceleration: SpatialVector,
}

impl Articulation {
    /// Number of generalized coordinates: 6 for a floating root plus the
    /// joint DOFs.
    #[must_use]
    pub fn coordinate_count(&self) -> usize {
        self.root_coordinates() + self.dof_count
    }

    pub(crate) fn root_coordinates(&self) -> usize {
        if self.config.fix_base { 0 } else { 6 }
    }

    /// Generalized forces that produce `qdd` (and the root acceleration)
    /// at joint velocities `qd`, written to `out`.
    ///
    /// The inertia caches must match the current poses.
    pub(crate) fn rnea(
        &mut self,
        root: &RootMotion,
        qd: &[f64],
        qdd: &[f64],
        gravity: bool,
        out: &mut [f64],
    ) {
        let Articulation {
            config,
            topology,
            links,
            data,
            scratch,
            ..
        } = self;
        let n = links.len();
        scratch.ensure(n, data.dof_count());
        let velocities = &mut scratch.velocities;
        let accelerations = &mut scratch.accelerations;
        let forces = &mut scratch.forces;

        if config.fix_base {
            velocities[0] = SpatialVector::zeros();
            accelerations[0] = SpatialVector::zeros();
        } else {
            velocities[0] = root.velocity;
            accelerations[0] = root.acceleration;
        }

        for i in 1..n {
            let p = topology.parent_of(i);
            let v_carried = transport_motion(&velocities[p], &data.rw[i]);
            let a_carried = transport_motion(&accelerations[p], &data.rw[i]);
            let Some(joint) = links[i].joint.as_ref() else {
                velocities[i] = v_carried;
                accelerations[i] = a_carried;
                continue;
            };
            let core = &joint.core;
            let s = &data.motion_matrix[i];
            let q_dot = joint_vector(qd, core.offset, core.dof);
            let q_ddot = joint_vector(qdd, core.offset, core.dof);
            let composed = core.kinematics == JointKinematics::Explicit && core.dof > 1;
            let c = velocity_product(
                &velocities[p],
                &data.rw[i],
                &data.lever[i],
                s,
                &q_dot,
                core.dof,
                composed,
            );
            velocities[i] = v_carried + s * q_dot;
            accelerations[i] = a_carried + c + s * q_ddot;
        }

        for (i, link) in links.iter().enumerate() {
            let inertia = &data.spatial_inertia[i];
            let w = angular(&velocities[i]);
            let rot_inertia = inertia.fixed_view::<3, 3>(0, 0);
            let gyro = w.cross(&(rot_inertia * w));
            let weight = if gravity && !link.desc.disable_gravity {
                config.gravity * link.desc.mass
            } else {
                Vector3::zeros()
            };
            forces[i] = inertia * accelerations[i] + spatial(&gyro, &(-weight));
        }

        let offset = if config.fix_base { 0 } else { 6 };
        for i in (1..n).rev() {
            let p = topology.parent_of(i);
            if let Some(joint) = links[i].joint.as_ref() {
                let tau = data.motion_matrix[i].transpose() * forces[i];
                for k in 0..joint.core.dof {
                    out[offset + joint.core.offset + k] = tau[k];
                }
            }
            let carried = transport_force(&forces[i], &(-data.rw[i]));
            forces[p] += carried;
        }
        if !config.fix_base {
            out[..6].copy_from_slice(forces[0].as_slice());
        }
    }
}
