//! Step integration: single-step PGS and sub-stepped TGS.
//!
//! - `single`: one position integration per step with the velocities the
//!   position iterations leave behind
//! - `tgs`: the step is split into sub-steps that each solve position
//!   iterations and advance an uncommitted pose copy
//!
//! Both integrate into `accumulated_pose` and commit it at the end of the
//! step. Link poses stay the authoritative state between steps. A floating
//! root is shifted on commit so the step conserves the momentum the solved
//! velocities carry.

pub(crate) mod single;
pub(crate) mod tgs;

use std::f64::consts::TAU;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use sim_articulation_types::Motion;

use crate::forward::link_velocities;
use crate::jcalc::{ball_positions, child_pose};
use crate::spatial::{
    SpatialMatrix, SpatialVector, angular, invert_inertia, joint_vector, linear, spatial,
    transport_force, transport_inertia, transport_motion,
};
use crate::types::{Articulation, JointKinematics, Link};

/// Copy the committed poses into the accumulated copy and zero the per-step
/// motion records.
pub(crate) fn begin_step(artic: &mut Articulation) {
    let data = &mut artic.data;
    for (i, link) in artic.links.iter().enumerate() {
        data.accumulated_pose[i] = link.pose;
        data.pre_pose[i] = link.pose;
    }
    data.delta_motion.iter_mut().for_each(|d| *d = SpatialVector::zeros());
    data.joint_delta_motion.fill(0.0);
}

/// Advance `accumulated_pose` and the joint positions by `dt` with the
/// given link and joint velocities.
///
/// Explicit and prismatic DOFs step their positions directly and clamp to
/// their limits. Ball joints rotate the child with the link's angular
/// velocity on the exponential map and read their positions back from the
/// new relative rotation. Every child pose is then rebuilt from its
/// parent's so joint anchors stay coincident.
pub(crate) fn integrate_positions(
    artic: &mut Articulation,
    dt: f64,
    link_velocity: &[SpatialVector],
    joint_velocity: &[f64],
) {
    let Articulation {
        config,
        topology,
        links,
        data,
        ..
    } = artic;
    let poses = &mut data.accumulated_pose;

    if !config.fix_base {
        let v = link_velocity[0];
        let old = poses[0];
        let rotation = UnitQuaternion::from_scaled_axis(angular(&v) * dt) * old.rotation;
        let translation = old.translation.vector + linear(&v) * dt;
        poses[0] = Isometry3::from_parts(Translation3::from(translation), rotation);
        data.delta_motion[0] += pose_delta(&old, &poses[0]);
    }

    for i in 1..links.len() {
        let p = topology.parent_of(i);
        let Some(joint) = links[i].joint.as_ref() else {
            continue;
        };
        let core = &joint.core;
        let q = &mut data.joint_position.as_mut_slice()[core.offset..core.offset + core.dof];
        let old = poses[i];

        match core.kinematics {
            JointKinematics::Fixed => {}
            JointKinematics::Prismatic | JointKinematics::Explicit => {
                for k in 0..core.dof {
                    let axis = core.axes[k];
                    let ai = axis.index();
                    let mut next = q[k] + joint_velocity[core.offset + k] * dt;
                    if joint.desc.motion[ai] == Motion::Limited {
                        next = joint.desc.limits[ai].clamp(next);
                    }
                    data.joint_delta_motion[core.offset + k] += next - q[k];
                    if axis.is_rotational() && next.abs() > TAU {
                        next -= TAU.copysign(next);
                    }
                    q[k] = next;
                }
            }
            JointKinematics::Ball => {
                let w = angular(&link_velocity[i]);
                let rotation = UnitQuaternion::from_scaled_axis(w * dt) * old.rotation;
                let rotated = Isometry3::from_parts(old.translation, rotation);
                let mut next = [0.0; 3];
                ball_positions(&poses[p], &rotated, joint, &mut next[..core.dof]);
                for k in 0..core.dof {
                    let ai = core.axes[k].index();
                    if k < core.dof - core.locked_axes && joint.desc.motion[ai] == Motion::Limited {
                        next[k] = joint.desc.limits[ai].clamp(next[k]);
                    }
                    data.joint_delta_motion[core.offset + k] += next[k] - q[k];
                    q[k] = next[k];
                }
            }
        }

        poses[i] = child_pose(&poses[p], joint, q);
        data.delta_motion[i] += pose_delta(&old, &poses[i]);
    }
}

/// Rotation vector and translation taking `from` to `to`.
fn pose_delta(from: &Isometry3<f64>, to: &Isometry3<f64>) -> SpatialVector {
    let rotation = (to.rotation * from.rotation.inverse()).scaled_axis();
    spatial(&rotation, &(to.translation.vector - from.translation.vector))
}

/// Spatial momentum `[L; p]` of the links about the system centre of mass,
/// with each link's inertia taken at its current pose.
pub(crate) fn momentum_about_com(links: &[Link], velocity: &[SpatialVector]) -> SpatialVector {
    let mass: f64 = links.iter().map(|l| l.desc.mass).sum();
    let com = links
        .iter()
        .map(|l| l.pose.translation.vector * l.desc.mass)
        .sum::<Vector3<f64>>()
        / mass;
    links
        .iter()
        .zip(velocity)
        .map(|(l, v)| transport_force(&(l.spatial_inertia() * v), &(com - l.pose.translation.vector)))
        .sum()
}

/// Momentum the committed step must carry, taken from the solved velocities
/// before the poses move.
///
/// The solved velocities hold their momentum at the start-of-step frames,
/// where the rotating-inertia term `ω × (I ω)` was treated as a force. Adding
/// it back over `dt` gives the momentum changed only by external forces and
/// external rows.
pub(crate) fn momentum_target(artic: &Articulation) -> SpatialVector {
    let data = &artic.data;
    let h = momentum_about_com(&artic.links, &data.motion_velocity);
    h + spatial(&(data.gyroscopic_torque * data.dt), &Vector3::zeros())
}

/// Commit the integrated poses and refresh the world frames.
pub(crate) fn commit_poses(artic: &mut Articulation) {
    for (link, pose) in artic.links.iter_mut().zip(&artic.data.accumulated_pose) {
        link.pose = *pose;
    }
    artic.update_world_frames();
}

/// Replace the solved root and joint velocities with the accumulated motion
/// over `dt`, at the committed frames.
///
/// Explicit and prismatic DOFs divide their joint motion by `dt`. The root
/// takes its pose change over `dt`. Ball joints take the child's rotation
/// over `dt` relative to the parent's derived angular velocity, read along
/// their (orthonormal) motion axes.
pub(crate) fn derive_velocities_from_motion(artic: &mut Articulation, dt: f64) {
    let Articulation {
        config,
        topology,
        links,
        data,
        ..
    } = artic;
    let inv_dt = 1.0 / dt;

    let mut velocity = std::mem::take(&mut data.motion_velocity);
    velocity[0] = if config.fix_base {
        SpatialVector::zeros()
    } else {
        data.delta_motion[0] * inv_dt
    };
    for i in 1..links.len() {
        let p = topology.parent_of(i);
        let carried = transport_motion(&velocity[p], &data.rw[i]);
        let Some(joint) = links[i].joint.as_ref() else {
            velocity[i] = carried;
            continue;
        };
        let core = &joint.core;
        {
            let qd = &mut data.joint_velocity.as_mut_slice()[core.offset..core.offset + core.dof];
            match core.kinematics {
                JointKinematics::Fixed => {}
                JointKinematics::Prismatic | JointKinematics::Explicit => {
                    for (k, qd) in qd.iter_mut().enumerate() {
                        *qd = data.joint_delta_motion[core.offset + k] * inv_dt;
                    }
                }
                JointKinematics::Ball => {
                    let relative = angular(&data.delta_motion[i]) * inv_dt - angular(&velocity[p]);
                    let s = &data.motion_matrix[i];
                    for (k, qd) in qd.iter_mut().enumerate() {
                        *qd = s.fixed_view::<3, 1>(0, k).dot(&relative);
                    }
                }
            }
        }
        let q_dot = joint_vector(data.joint_velocity.as_slice(), core.offset, core.dof);
        velocity[i] = carried + data.motion_matrix[i] * q_dot;
    }
    data.motion_velocity = velocity;
}

/// Shift a floating root's velocity so the links carry `target` momentum
/// about the system centre of mass. Joint velocities are untouched.
pub(crate) fn restore_momentum(links: &[Link], velocity: &mut [SpatialVector], target: &SpatialVector) {
    let Some(root) = links.first().map(|l| l.pose.translation.vector) else {
        return;
    };
    let mass: f64 = links.iter().map(|l| l.desc.mass).sum();
    let com = links
        .iter()
        .map(|l| l.pose.translation.vector * l.desc.mass)
        .sum::<Vector3<f64>>()
        / mass;
    let error = target - momentum_about_com(links, velocity);
    let composite: SpatialMatrix = links
        .iter()
        .map(|l| transport_inertia(&l.spatial_inertia(), &(root - l.pose.translation.vector)))
        .sum();
    let Some(inv) = invert_inertia(&composite) else {
        return;
    };
    let dv = inv * transport_force(&error, &(root - com));
    for (link, v) in links.iter().zip(velocity.iter_mut()) {
        *v += transport_motion(&dv, &(link.pose.translation.vector - root));
    }
}

/// Derive end-of-step link velocities and accelerations at the committed
/// frames.
///
/// Link velocities are recomputed from the root velocity and the joint
/// velocities. A floating root is then shifted so the step carries
/// `momentum` (see [`momentum_target`]). Accelerations are the velocity
/// change over the step. Per-step inputs (external accelerations, queued
/// external rows) are consumed.
pub(crate) fn settle_velocities(artic: &mut Articulation, dt: f64, momentum: &SpatialVector) {
    let Articulation {
        config,
        topology,
        links,
        data,
        constraints,
        ..
    } = artic;

    if config.fix_base {
        data.motion_velocity[0] = SpatialVector::zeros();
    }
    let root = data.motion_velocity[0];
    let mut velocity = std::mem::take(&mut data.motion_velocity);
    link_velocities(topology, links, data, &root, data.joint_velocity.as_slice(), &mut velocity);
    if !config.fix_base {
        restore_momentum(links, &mut velocity, momentum);
    }
    data.motion_velocity = velocity;

    let inv_dt = 1.0 / dt;
    for ((qdd, qd), pre) in data
        .joint_acceleration
        .iter_mut()
        .zip(data.joint_velocity.iter())
        .zip(data.pre_joint_velocity.iter())
    {
        *qdd = (qd - pre) * inv_dt;
    }
    for ((a, v), pre) in data
        .motion_acceleration
        .iter_mut()
        .zip(&data.motion_velocity)
        .zip(&data.pre_velocity)
    {
        *a = (v - pre) * inv_dt;
    }

    for link in links.iter_mut() {
        link.external_acceleration = SpatialVector::zeros();
    }
    constraints.retire_external();
    data.caches_valid = false;
}

/// Commit the integrated poses and settle the end-of-step velocities from
/// the solved ones.
pub(crate) fn finish_step(artic: &mut Articulation, dt: f64) {
    let momentum = momentum_target(artic);
    commit_poses(artic);
    settle_velocities(artic, dt, &momentum);
}
