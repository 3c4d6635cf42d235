//! Velocity stage: link velocities from the root velocity and joint
//! velocities.

use crate::spatial::{SpatialVector, joint_vector, transport_motion};
use crate::topology::Topology;
use crate::types::{Articulation, ArticulationData, Link, Warning};

/// Sanitize joint state and propagate link velocities down the tree.
///
/// Non-finite joint positions or velocities are reset to zero; joint
/// velocities beyond `max_joint_velocity` are clamped. Both record a
/// warning.
pub(crate) fn fwd_velocity(artic: &mut Articulation) {
    let Articulation {
        config,
        topology,
        links,
        data,
        warnings,
        ..
    } = artic;

    for joint in links.iter().filter_map(|l| l.joint.as_ref()) {
        let max = joint.desc.max_joint_velocity;
        for idx in joint.core.offset..joint.core.offset + joint.core.dof {
            if !data.joint_position[idx].is_finite() || !data.joint_velocity[idx].is_finite() {
                warnings.record_at(Warning::BadJointState, idx);
                data.joint_position[idx] = 0.0;
                data.joint_velocity[idx] = 0.0;
            }
            let qd = data.joint_velocity[idx];
            if qd.abs() > max {
                warnings.record_at(Warning::VelocityClamped, idx);
                data.joint_velocity[idx] = qd.clamp(-max, max);
            }
        }
    }

    if config.fix_base || data.motion_velocity[0].iter().any(|v| !v.is_finite()) {
        data.motion_velocity[0] = SpatialVector::zeros();
    }
    let root = data.motion_velocity[0];
    let mut velocity = std::mem::take(&mut data.motion_velocity);
    link_velocities(topology, links, data, &root, data.joint_velocity.as_slice(), &mut velocity);
    data.motion_velocity = velocity;
}

/// Link velocities for a root velocity and joint velocities at the current
/// world frames:
///
/// ```text
/// v_i = transport(v_parent, x_i − x_parent) + S_i·q̇_i
/// ```
pub(crate) fn link_velocities(
    topology: &Topology,
    links: &[Link],
    data: &ArticulationData,
    root: &SpatialVector,
    qd: &[f64],
    out: &mut [SpatialVector],
) {
    out[0] = *root;
    for i in 1..links.len() {
        let p = topology.parent_of(i);
        let carried = transport_motion(&out[p], &data.rw[i]);
        out[i] = match links[i].joint.as_ref() {
            Some(joint) => {
                let q_dot = joint_vector(qd, joint.core.offset, joint.core.dof);
                carried + data.motion_matrix[i] * q_dot
            }
            None => carried,
        };
    }
}
