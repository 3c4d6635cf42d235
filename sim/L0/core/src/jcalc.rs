//! Joint model: DOF layout, forward kinematics and world motion subspaces.
//!
//! `jcalc` is the single place where a joint descriptor's axis table turns
//! into a DOF layout. Layout rebuilds are lazy (behind per-joint dirty flags)
//! while world-frame quantities are refreshed on every call because they
//! depend on the current poses.
//!
//! World motion subspace columns, with `d = x_child − anchor`:
//!
//! ```text
//! rotation about u      [u; u × d]
//! translation along u   [0; u]
//! ```

use nalgebra::{DVector, Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use sim_articulation_types::{JointAxis, JointDesc, JointType, Motion, SphericalLockMode};
use tracing::debug;

use crate::spatial::{MotionMatrix, spatial};
use crate::types::{Articulation, Joint, JointCore, JointKinematics};

/// Unit axis of a joint-frame direction.
#[must_use]
pub fn unit_axis(axis: JointAxis) -> Unit<Vector3<f64>> {
    match axis {
        JointAxis::Twist | JointAxis::X => Vector3::x_axis(),
        JointAxis::Swing1 | JointAxis::Y => Vector3::y_axis(),
        JointAxis::Swing2 | JointAxis::Z => Vector3::z_axis(),
    }
}

/// DOF layout of a descriptor (offset left at zero).
#[must_use]
pub fn compute_joint_core(desc: &JointDesc) -> JointCore {
    let mut core = JointCore::default();
    let free: Vec<JointAxis> = JointAxis::ALL
        .iter()
        .copied()
        .filter(|a| desc.axis_motion(*a) != Motion::Locked)
        .collect();

    let push = |core: &mut JointCore, axis: JointAxis| {
        if core.dof < 3 {
            core.axes[core.dof] = axis;
            core.dof += 1;
        }
    };

    match desc.joint_type {
        JointType::Fix => {}
        JointType::Prismatic | JointType::Revolute => {
            if let Some(axis) = free.first() {
                push(&mut core, *axis);
                core.kinematics = if desc.joint_type == JointType::Prismatic {
                    JointKinematics::Prismatic
                } else {
                    JointKinematics::Explicit
                };
            }
        }
        JointType::Spherical => {
            for axis in &free {
                push(&mut core, *axis);
            }
            let kinematics = match core.dof {
                0 => JointKinematics::Fixed,
                3 => JointKinematics::Ball,
                _ if desc.lock_mode == SphericalLockMode::Soft => {
                    for axis in &JointAxis::ALL[..3] {
                        if desc.axis_motion(*axis) == Motion::Locked {
                            push(&mut core, *axis);
                            core.locked_axes += 1;
                        }
                    }
                    JointKinematics::Ball
                }
                _ => JointKinematics::Explicit,
            };
            core.kinematics = kinematics;
        }
    }

    core.limited_axes = core.axes[..core.dof - core.locked_axes]
        .iter()
        .filter(|a| desc.axis_motion(**a) == Motion::Limited)
        .count();
    core
}

/// Transform from the parent joint frame to the child joint frame.
#[must_use]
pub fn joint_transform(joint: &Joint, q: &[f64]) -> Isometry3<f64> {
    let core = &joint.core;
    match core.kinematics {
        JointKinematics::Fixed => Isometry3::identity(),
        JointKinematics::Prismatic => {
            let t = core.axes[0].unit() * q[0];
            Isometry3::from_parts(Translation3::from(t), UnitQuaternion::identity())
        }
        JointKinematics::Explicit => {
            let mut rot = UnitQuaternion::identity();
            for (k, axis) in joint.axes().iter().enumerate() {
                rot *= UnitQuaternion::from_axis_angle(&unit_axis(*axis), q[k]);
            }
            Isometry3::from_parts(Translation3::identity(), rot)
        }
        JointKinematics::Ball => {
            let mut rotvec = Vector3::zeros();
            for (k, axis) in joint.axes().iter().enumerate() {
                rotvec += axis.unit() * q[k];
            }
            Isometry3::from_parts(Translation3::identity(), UnitQuaternion::from_scaled_axis(rotvec))
        }
    }
}

/// Child link pose from its parent's pose and the joint positions.
#[must_use]
pub fn child_pose(parent_pose: &Isometry3<f64>, joint: &Joint, q: &[f64]) -> Isometry3<f64> {
    parent_pose * joint.desc.parent_pose * joint_transform(joint, q) * joint.desc.child_pose.inverse()
}

/// Ball-joint positions implied by the two link poses: the rotation vector
/// of the relative joint rotation, read along the DOF axes.
pub fn ball_positions(
    parent_pose: &Isometry3<f64>,
    child_pose: &Isometry3<f64>,
    joint: &Joint,
    out: &mut [f64],
) {
    let c_a = parent_pose.rotation * joint.desc.parent_pose.rotation;
    let c_b = child_pose.rotation * joint.desc.child_pose.rotation;
    let rotvec = (c_a.inverse() * c_b).scaled_axis();
    for (k, axis) in joint.axes().iter().enumerate() {
        out[k] = rotvec[axis.index()];
    }
}

/// World motion subspace of a joint at the given poses and positions.
#[must_use]
pub fn world_motion_matrix(
    parent_pose: &Isometry3<f64>,
    child_pose: &Isometry3<f64>,
    joint: &Joint,
    q: &[f64],
) -> MotionMatrix {
    let mut s = MotionMatrix::zeros();
    let c_a = parent_pose * joint.desc.parent_pose;
    let c_b = child_pose * joint.desc.child_pose;
    let d = child_pose.translation.vector - c_b.translation.vector;

    match joint.core.kinematics {
        JointKinematics::Fixed => {}
        JointKinematics::Prismatic => {
            let u = c_a.rotation * joint.core.axes[0].unit();
            s.set_column(0, &spatial(&Vector3::zeros(), &u));
        }
        JointKinematics::Explicit => {
            let mut rot = c_a.rotation;
            for (k, axis) in joint.axes().iter().enumerate() {
                let u = rot * axis.unit();
                s.set_column(k, &spatial(&u, &u.cross(&d)));
                rot *= UnitQuaternion::from_axis_angle(&unit_axis(*axis), q[k]);
            }
        }
        JointKinematics::Ball => {
            for (k, axis) in joint.axes().iter().enumerate() {
                let u = c_b.rotation * axis.unit();
                s.set_column(k, &spatial(&u, &u.cross(&d)));
            }
        }
    }
    s
}

impl Articulation {
    /// Refresh the joint model.
    ///
    /// Rebuilds the DOF layout when any joint is dirty (or `force` is set),
    /// then recomputes the world motion subspaces and centre-of-mass offsets
    /// from the current poses. Calling it twice without intervening changes
    /// produces identical caches.
    pub fn jcalc(&mut self, force: bool) {
        let dirty = self.links.iter().any(|l| l.joint.as_ref().is_some_and(|j| j.dirty));
        if dirty || force {
            self.rebuild_joint_layout();
        }
        self.update_world_frames();
    }

    /// Recompute every joint's DOF layout and offsets, remapping per-DOF
    /// state by axis so values of surviving axes are kept.
    pub(crate) fn rebuild_joint_layout(&mut self) {
        let old_position = self.data.joint_position.clone();
        let old_velocity = self.data.joint_velocity.clone();
        let old_force = self.data.joint_force.clone();

        let mut cores = Vec::with_capacity(self.links.len());
        let mut offset = 0;
        for link in &self.links {
            let core = link.joint.as_ref().map(|j| {
                let mut core = compute_joint_core(&j.desc);
                core.offset = offset;
                offset += core.dof;
                core
            });
            cores.push(core);
        }
        let dofs = offset;

        let mut position = DVector::zeros(dofs);
        let mut velocity = DVector::zeros(dofs);
        let mut force = DVector::zeros(dofs);
        for (link, core) in self.links.iter_mut().zip(cores) {
            let (Some(joint), Some(core)) = (link.joint.as_mut(), core) else {
                continue;
            };
            for k in 0..core.dof {
                let old_slot = joint.core.axes[..joint.core.dof]
                    .iter()
                    .position(|a| *a == core.axes[k]);
                if let Some(old_k) = old_slot {
                    let src = joint.core.offset + old_k;
                    if src < old_position.len() {
                        position[core.offset + k] = old_position[src];
                        velocity[core.offset + k] = old_velocity[src];
                        force[core.offset + k] = old_force[src];
                    }
                }
            }
            joint.core = core;
            joint.dirty = false;
        }

        debug!(links = self.links.len(), dofs, "rebuilt joint layout");
        self.dof_count = dofs;
        self.data.replace_joint_state(position, velocity, force);
        self.scratch.ensure(self.links.len(), dofs);
    }

    /// Recompute world motion subspaces and centre-of-mass offsets.
    pub(crate) fn update_world_frames(&mut self) {
        for i in 1..self.links.len() {
            let p = self.topology.parent_of(i);
            let parent_pose = self.links[p].pose;
            let link = &self.links[i];
            let Some(joint) = link.joint.as_ref() else {
                continue;
            };
            let q = &self.data.joint_position.as_slice()[joint.core.offset..];
            self.data.motion_matrix[i] = world_motion_matrix(&parent_pose, &link.pose, joint, q);
            self.data.rw[i] = link.pose.translation.vector - parent_pose.translation.vector;
            self.data.lever[i] = link.pose.translation.vector
                - (link.pose * joint.desc.child_pose).translation.vector;
        }
    }

    /// Recompute every child pose from the root pose and the joint
    /// positions, then refresh the world frames.
    pub fn update_kinematics(&mut self) {
        for i in 1..self.links.len() {
            let p = self.topology.parent_of(i);
            let parent_pose = self.links[p].pose;
            let Some(joint) = self.links[i].joint.as_ref() else {
                continue;
            };
            let q = &self.data.joint_position.as_slice()[joint.core.offset..];
            let pose = child_pose(&parent_pose, joint, q);
            self.links[i].pose = pose;
        }
        self.data.caches_valid = false;
        self.update_world_frames();
    }

    /// World motion subspace of link `i`'s inbound joint from the last jcalc.
    #[must_use]
    pub fn world_motion_matrix(&self, i: usize) -> Option<&MotionMatrix> {
        self.data.motion_matrix.get(i)
    }

    /// Joint frames in world: `(on parent, on child)`.
    pub(crate) fn joint_frames(&self, i: usize) -> Option<(Isometry3<f64>, Isometry3<f64>)> {
        let joint = self.links.get(i)?.joint.as_ref()?;
        let p = self.topology.parent(i)?;
        Some((
            self.links[p].pose * joint.desc.parent_pose,
            self.links[i].pose * joint.desc.child_pose,
        ))
    }
}
