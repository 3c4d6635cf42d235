//! Bias stage: zero-acceleration forces, damping, velocity-product
//! accelerations and the articulated bias forces.

use nalgebra::{Matrix3, Vector3};

use crate::spatial::{
    MotionMatrix, SpatialVector, angular, joint_vector, linear, spatial, transport_force,
};
use crate::types::{Articulation, JointKinematics};

/// Velocity-product acceleration of a child relative to the parent's
/// transported acceleration.
///
/// `rw` is child minus parent centre of mass, `lever` child centre of mass
/// minus joint anchor. `composed` marks joints whose later axes are carried
/// by earlier ones (multi-axis explicit joints), which adds the
/// `Σ_{j<k} ω_j × ω_k` term.
#[must_use]
pub fn velocity_product(
    parent_velocity: &SpatialVector,
    rw: &Vector3<f64>,
    lever: &Vector3<f64>,
    s: &MotionMatrix,
    qd: &Vector3<f64>,
    dof: usize,
    composed: bool,
) -> SpatialVector {
    let w_p = angular(parent_velocity);
    let rel = s * qd;
    let w_rel = angular(&rel);
    let v_rel = linear(&rel);

    let mut ang = w_p.cross(&w_rel);
    let mut lin = w_p.cross(&w_p.cross(rw)) + 2.0 * w_p.cross(&v_rel) + w_rel.cross(&v_rel);

    if composed {
        let mut carried = Vector3::zeros();
        for j in 0..dof {
            let w_j = s.fixed_view::<3, 1>(0, j) * qd[j];
            for k in j + 1..dof {
                let w_k = s.fixed_view::<3, 1>(0, k) * qd[k];
                carried += w_j.cross(&w_k);
            }
        }
        ang += carried;
        lin += carried.cross(lever);
    }
    spatial(&ang, &lin)
}

/// Per-link zero-acceleration force `Z` and per-joint velocity products.
///
/// ```text
/// Z_lin = −m (g + a_ext)
/// Z_ang = ω × (I ω) − I α_ext        |ω| clamped to 1/dt
/// ```
///
/// Damping and max-velocity drag are folded into `Z` afterwards; the
/// undamped value is kept in `transmitted_force` for the joint force pass.
pub(crate) fn fwd_bias(artic: &mut Articulation, dt: f64) {
    let Articulation {
        config,
        topology,
        links,
        data,
        ..
    } = artic;
    let inv_dt = 1.0 / dt;
    data.gyroscopic_torque = Vector3::zeros();

    for (i, link) in links.iter().enumerate() {
        let desc = &link.desc;
        let m = desc.mass;
        let inertia: Matrix3<f64> = data.spatial_inertia[i].fixed_view::<3, 3>(0, 0).into_owned();
        let v = data.motion_velocity[i];
        let w = angular(&v);
        let vel = linear(&v);
        let ext = link.external_acceleration;

        let gravity = if desc.disable_gravity {
            Vector3::zeros()
        } else {
            config.gravity
        };
        let mut z_lin = -m * (gravity + linear(&ext));

        let speed = w.norm();
        let w_c = if speed > inv_dt { w * (inv_dt / speed) } else { w };
        let mut z_ang = w_c.cross(&(inertia * w_c)) - inertia * angular(&ext);
        data.gyroscopic_torque += w.cross(&(inertia * w));

        data.transmitted_force[i] = spatial(&z_ang, &z_lin);

        if desc.linear_damping > 0.0 || desc.angular_damping > 0.0 {
            let lin_damp = (desc.linear_damping * dt).min(1.0);
            let ang_damp = (desc.angular_damping * dt).min(1.0);
            z_lin += vel * (m * lin_damp * inv_dt) - z_lin * lin_damp;
            z_ang += inertia * w * (ang_damp * inv_dt) - z_ang * ang_damp;
        }

        let max_ang = desc.max_angular_velocity;
        let ang_sq = w.norm_squared();
        if ang_sq > max_ang * max_ang {
            let scale = 1.0 - max_ang / ang_sq.sqrt();
            z_ang += inertia * w * (scale * inv_dt);
        }
        let max_lin = desc.max_linear_velocity;
        let lin_sq = vel.norm_squared();
        if lin_sq > max_lin * max_lin {
            let scale = 1.0 - max_lin / lin_sq.sqrt();
            z_lin += vel * (m * scale * inv_dt);
        }

        data.bias_force[i] = spatial(&z_ang, &z_lin);
    }

    data.coriolis[0] = SpatialVector::zeros();
    for i in 1..links.len() {
        let p = topology.parent_of(i);
        data.coriolis[i] = match links[i].joint.as_ref() {
            Some(joint) => {
                let qd = joint_vector(data.joint_velocity.as_slice(), joint.core.offset, joint.core.dof);
                let composed = joint.core.kinematics == JointKinematics::Explicit && joint.core.dof > 1;
                velocity_product(
                    &data.motion_velocity[p],
                    &data.rw[i],
                    &data.lever[i],
                    &data.motion_matrix[i],
                    &qd,
                    joint.core.dof,
                    composed,
                )
            }
            None => SpatialVector::zeros(),
        };
    }
}

/// Bottom-up articulated bias forces:
///
/// ```text
/// ZIc   = Z_A + I_A c
/// qstZIc = τ − Sᵀ ZIc
/// Z_A[p] += transport(ZIc + Is·D⁻¹·qstZIc, x_p − x_i)
/// ```
pub(crate) fn fwd_articulated_bias(artic: &mut Articulation) {
    let Articulation {
        topology,
        links,
        data,
        ..
    } = artic;

    data.articulated_bias.copy_from_slice(&data.bias_force);
    for i in (1..links.len()).rev() {
        let (offset, dof) = links[i]
            .joint
            .as_ref()
            .map_or((0, 0), |j| (j.core.offset, j.core.dof));
        let zic = data.articulated_bias[i] + data.articulated_inertia[i] * data.coriolis[i];
        let tau = joint_vector(data.joint_force.as_slice(), offset, dof);
        let qst_zic = tau - data.motion_matrix[i].transpose() * zic;
        data.qst_zic[i] = qst_zic;

        let p = topology.parent_of(i);
        let passed_on = zic + data.is_inv_d[i] * qst_zic;
        data.articulated_bias[p] += transport_force(&passed_on, &(-data.rw[i]));
    }
}
