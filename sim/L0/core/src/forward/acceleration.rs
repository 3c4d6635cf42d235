//! Acceleration stage: top-down accelerations, joint velocity update and
//! transmitted joint forces.

use crate::spatial::{SpatialVector, transport_force, transport_motion};
use crate::types::{Articulation, Warning};

/// Top-down pass:
///
/// ```text
/// a_0   = −I_A[0]⁻¹ Z_A[0]                 (zero for a fixed base)
/// q̈_i  = D⁻¹ (qstZIc − Isᵀ transport(a_p))
/// a_i   = transport(a_p) + c_i + S q̈_i
/// ```
///
/// Joint velocities are advanced by `q̈·dt`; a result beyond
/// `max_joint_velocity` is clamped and `q̈` re-derived from the clamped
/// value. Link velocities advance by `a·dt`.
pub(crate) fn fwd_acceleration(artic: &mut Articulation, dt: f64) {
    let Articulation {
        config,
        topology,
        links,
        data,
        warnings,
        ..
    } = artic;
    let n = links.len();

    data.motion_acceleration[0] = if config.fix_base {
        SpatialVector::zeros()
    } else {
        -(data.base_inv_inertia * data.articulated_bias[0])
    };

    for i in 1..n {
        let p = topology.parent_of(i);
        let carried = transport_motion(&data.motion_acceleration[p], &data.rw[i]);
        let Some(joint) = links[i].joint.as_ref() else {
            data.motion_acceleration[i] = carried + data.coriolis[i];
            continue;
        };
        let core = &joint.core;
        let max = joint.desc.max_joint_velocity;
        let mut qdd = data.inv_st_is[i] * (data.qst_zic[i] - data.is[i].transpose() * carried);
        for k in 0..core.dof {
            let idx = core.offset + k;
            let qd = data.joint_velocity[idx];
            let next = qd + qdd[k] * dt;
            if next.abs() > max {
                warnings.record_at(Warning::VelocityClamped, idx);
                qdd[k] = (next.clamp(-max, max) - qd) / dt;
            }
            data.joint_velocity[idx] = qd + qdd[k] * dt;
            data.joint_acceleration[idx] = qdd[k];
        }
        data.motion_acceleration[i] = carried + data.coriolis[i] + data.motion_matrix[i] * qdd;
    }

    for i in 0..n {
        let a = data.motion_acceleration[i];
        data.motion_velocity[i] += a * dt;
        // `transmitted_force` holds the undamped Z from the bias stage.
        data.transmitted_force[i] += data.spatial_inertia[i] * a;
    }
    for i in (1..n).rev() {
        let p = topology.parent_of(i);
        let f = transport_force(&data.transmitted_force[i], &(-data.rw[i]));
        data.transmitted_force[p] += f;
    }
}
