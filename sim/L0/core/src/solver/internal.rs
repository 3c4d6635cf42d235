//! Per-DOF joint rows: limits, drives, friction and soft locks.
//!
//! One row serves a DOF's limit, drive and friction together; they share
//! the same Jacobian and unit response. A row exists only for DOFs with a
//! limit, an active drive or joint friction.
//!
//! Row Jacobians (parent side `row0`, child side `row1`):
//!
//! ```text
//! rotation about u       row0 = row1 = [u; 0]
//! translation along u    row0 = [(a_A − x_p) × u; u]   row1 = [(a_B − x_c) × u; u]
//! ```
//!
//! so `row1·v_child − row0·v_parent` is the joint velocity of that DOF.

use nalgebra::Vector3;
use sim_articulation_types::{DriveType, JointAxis, Motion};

use super::{CFM, LinkRows, MIN_RESPONSE};
use crate::response::two_link_response;
use crate::spatial::{SpatialVector, angular, linear, spatial};
use crate::types::{Articulation, Warning};

/// Stiffness or damping standing in for a rigid target.
const RIGID_GAIN: f64 = 1e25;

/// Drive, limit and friction row of one joint DOF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InternalConstraint {
    pub(crate) link: usize,
    pub(crate) axis: JointAxis,
    /// DOF slot within the joint.
    pub(crate) slot: usize,
    pub(crate) row0: SpatialVector,
    pub(crate) row1: SpatialVector,
    /// Parent velocity change per unit row impulse.
    pub(crate) delta_va: SpatialVector,
    /// Child velocity change per unit row impulse.
    pub(crate) delta_vb: SpatialVector,
    pub(crate) response: f64,
    pub(crate) recip_response: f64,

    pub(crate) low_limit: f64,
    pub(crate) high_limit: f64,
    pub(crate) low_impulse: f64,
    pub(crate) high_impulse: f64,
    pub(crate) erp: f64,

    pub(crate) drive_target: f64,
    pub(crate) drive_target_velocity: f64,
    pub(crate) drive_velocity_bias: f64,
    pub(crate) drive_velocity_multiplier: f64,
    pub(crate) drive_bias_coefficient: f64,
    pub(crate) drive_impulse_multiplier: f64,
    pub(crate) max_drive_impulse: f64,
    pub(crate) drive_impulse: f64,

    pub(crate) max_friction_impulse: f64,
    pub(crate) friction_impulse: f64,
    /// 1 when friction impulse carries over between iterations, else 0.
    pub(crate) friction_carry: f64,
}

impl InternalConstraint {
    /// Link whose inbound joint owns the row.
    #[must_use]
    pub fn link(&self) -> usize {
        self.link
    }

    /// Joint axis of the row.
    #[must_use]
    pub fn axis(&self) -> JointAxis {
        self.axis
    }

    /// Unit response: joint velocity change per unit row impulse.
    #[must_use]
    pub fn response(&self) -> f64 {
        self.response
    }

    /// `1 / (response + CFM)`, zero for a skipped row.
    #[must_use]
    pub fn recip_response(&self) -> f64 {
        self.recip_response
    }

    /// Accumulated drive impulse.
    #[must_use]
    pub fn drive_impulse(&self) -> f64 {
        self.drive_impulse
    }

    /// Accumulated limit impulse (low side positive, high side negative).
    #[must_use]
    pub fn limit_impulse(&self) -> f64 {
        self.low_impulse + self.high_impulse
    }

    /// Accumulated friction impulse.
    #[must_use]
    pub fn friction_impulse(&self) -> f64 {
        self.friction_impulse
    }

    /// Solve the row once against the current parent and child velocities.
    ///
    /// Returns the total impulse applied this iteration.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn solve(
        &mut self,
        q: f64,
        parent_v: &SpatialVector,
        child_v: &SpatialVector,
        dt: f64,
        elapsed: f64,
        max_joint_velocity: f64,
        velocity_iteration: bool,
    ) -> f64 {
        let mut joint_v = self.row1.dot(child_v) - self.row0.dot(parent_v);

        // Friction
        let applied_friction = self.friction_impulse * self.friction_carry;
        let friction = (-joint_v * self.recip_response + applied_friction)
            .clamp(-self.max_friction_impulse, self.max_friction_impulse);
        let friction_delta = friction - applied_friction;
        self.friction_impulse += friction_delta;
        joint_v += friction_delta * self.response;

        // Drive
        let error = self.drive_target + self.drive_target_velocity * elapsed - q;
        let unclamped = self.drive_impulse_multiplier * self.drive_impulse
            + joint_v * self.drive_velocity_multiplier
            + self.drive_velocity_bias
            + error * self.drive_bias_coefficient;
        let clamped = unclamped.clamp(-self.max_drive_impulse, self.max_drive_impulse);
        let drive_delta = clamped - self.drive_impulse;
        joint_v += drive_delta * self.response;

        // Limits
        let mut limit_delta = 0.0;
        let mut limited = false;
        if !velocity_iteration {
            let inv_dt = 1.0 / dt;
            let future = q + joint_v * dt;
            if q > self.high_limit || future > self.high_limit {
                let erp = if q > self.high_limit { self.erp } else { 1.0 };
                limited = true;
                let dv = (self.high_limit - future) * inv_dt * erp;
                let dv = (joint_v + dv).clamp(-max_joint_velocity, max_joint_velocity) - joint_v;
                limit_delta = (self.high_impulse + dv * self.recip_response).min(0.0) - self.high_impulse;
                self.high_impulse += limit_delta;
            } else if q < self.low_limit || future < self.low_limit {
                let erp = if q < self.low_limit { self.erp } else { 1.0 };
                limited = true;
                let dv = (self.low_limit - future) * inv_dt * erp;
                let dv = (joint_v + dv).clamp(-max_joint_velocity, max_joint_velocity) - joint_v;
                limit_delta = (self.low_impulse + dv * self.recip_response).max(0.0) - self.low_impulse;
                self.low_impulse += limit_delta;
            }
        }
        if !limited {
            // Release accumulated limit impulse the joint no longer needs.
            let release = -joint_v * self.recip_response;
            if joint_v > 0.0 {
                limit_delta = release.max(-self.low_impulse);
                self.low_impulse += limit_delta;
            } else {
                limit_delta = release.min(-self.high_impulse);
                self.high_impulse += limit_delta;
            }
        }

        let total = limit_delta + drive_delta + friction_delta;
        if total != 0.0 {
            self.drive_impulse = clamped;
        }
        total
    }
}

/// Soft lock row of one locked spherical axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockedAxisConstraint {
    pub(crate) link: usize,
    pub(crate) axis: SpatialVector,
    pub(crate) delta_va: SpatialVector,
    pub(crate) delta_vb: SpatialVector,
    pub(crate) response: f64,
    pub(crate) recip_response: f64,
    /// Position error at setup (`−q`).
    pub(crate) error: f64,
    pub(crate) bias_scale: f64,
}

impl LockedAxisConstraint {
    /// Link whose inbound joint owns the row.
    #[must_use]
    pub fn link(&self) -> usize {
        self.link
    }

    /// Unit response.
    #[must_use]
    pub fn response(&self) -> f64 {
        self.response
    }

    /// Solve once. `delta_p` is the relative rotation accumulated about the
    /// axis during this step. Returns the applied impulse.
    pub(crate) fn solve(
        &self,
        parent_v: &SpatialVector,
        child_v: &SpatialVector,
        delta_p: f64,
        max_joint_velocity: f64,
        velocity_iteration: bool,
    ) -> f64 {
        let joint_v = self.axis.dot(child_v) - self.axis.dot(parent_v);
        let mut dv = -joint_v;
        if !velocity_iteration {
            dv += (self.error - delta_p) * self.bias_scale;
        }
        let dv = (joint_v + dv).clamp(-max_joint_velocity, max_joint_velocity) - joint_v;
        dv * self.recip_response
    }
}

/// Build every internal row and lock row for this step, and prepare the
/// queued external rows.
///
/// `step_dt` is the interval one solve covers (the sub-step when
/// sub-stepping); `dt` is the full step and scales drive force limits.
pub(crate) fn setup(artic: &mut Articulation, step_dt: f64, dt: f64, sub_stepped: bool) {
    let Articulation {
        config,
        topology,
        links,
        data,
        constraints,
        warnings,
        ..
    } = artic;

    let erp = if sub_stepped {
        config.solver.substep_error_reduction
    } else {
        config.solver.error_reduction
    };
    let max_force_scale = if config.drive_limits_are_forces { dt } else { 1.0 };
    let friction_carry = if sub_stepped { 0.0 } else { 1.0 };

    constraints.internal.clear();
    constraints.locks.clear();
    constraints.resize_links(links.len());
    for rows in &mut constraints.rows {
        *rows = LinkRows::default();
    }

    for i in 1..links.len() {
        let Some(joint) = links[i].joint.as_ref() else {
            continue;
        };
        let core = &joint.core;
        let desc = &joint.desc;
        if core.dof == 0 {
            continue;
        }
        let p = topology.parent_of(i);
        let c_a = links[p].pose * desc.parent_pose;
        let c_b = links[i].pose * desc.child_pose;
        let has_friction = desc.friction_coefficient > 0.0;
        let max_friction = if has_friction {
            data.transmitted_force[i].norm() * desc.friction_coefficient * step_dt
        } else {
            0.0
        };
        let free = core.dof - core.locked_axes;

        let start = constraints.internal.len();
        for k in 0..free {
            let axis = core.axes[k];
            let ai = axis.index();
            let motion = desc.motion[ai];
            let drive = desc.drives[ai];
            let has_drive = drive.is_active();
            if !(motion == Motion::Limited || has_drive || has_friction) {
                continue;
            }

            let column = data.motion_matrix[i].column(k).into_owned();
            let (row0, row1) = if axis.is_rotational() {
                let u = angular(&column);
                let row = spatial(&u, &Vector3::zeros());
                (row, row)
            } else {
                let u = linear(&column);
                let r0 = c_a.translation.vector - links[p].pose.translation.vector;
                let r1 = c_b.translation.vector - links[i].pose.translation.vector;
                (spatial(&r0.cross(&u), &u), spatial(&r1.cross(&u), &u))
            };

            let (delta_va, delta_vb) = two_link_response(topology, data, p, &(-row0), i, &row1);
            let response = row1.dot(&delta_vb) - row0.dot(&delta_va);
            let recip_response = if response > MIN_RESPONSE {
                1.0 / (response + CFM)
            } else {
                warnings.record_at(Warning::DegenerateResponse, i);
                0.0
            };

            let (low_limit, high_limit) = if motion == Motion::Limited {
                (desc.limits[ai].low, desc.limits[ai].high)
            } else {
                (-f64::MAX, f64::MAX)
            };

            let mut row = InternalConstraint {
                link: i,
                axis,
                slot: k,
                row0,
                row1,
                delta_va,
                delta_vb,
                response,
                recip_response,
                low_limit,
                high_limit,
                low_impulse: 0.0,
                high_impulse: 0.0,
                erp,
                drive_target: 0.0,
                drive_target_velocity: 0.0,
                drive_velocity_bias: 0.0,
                drive_velocity_multiplier: 0.0,
                drive_bias_coefficient: 0.0,
                drive_impulse_multiplier: 0.0,
                max_drive_impulse: 0.0,
                drive_impulse: 0.0,
                max_friction_impulse: max_friction,
                friction_impulse: 0.0,
                friction_carry,
            };

            if has_drive {
                let mut target = desc.drive_position[ai];
                if motion == Motion::Limited {
                    target = target.clamp(low_limit, high_limit);
                }
                let target_velocity = desc.drive_velocity[ai];
                let (stiffness, damping, acceleration) = match drive.drive_type {
                    DriveType::Target => (RIGID_GAIN, 0.0, false),
                    DriveType::Velocity => (0.0, RIGID_GAIN, false),
                    DriveType::Acceleration => (drive.stiffness, drive.damping, true),
                    DriveType::Force | DriveType::None => (drive.stiffness, drive.damping, false),
                };
                let a = step_dt * (step_dt * stiffness + damping);
                let b = step_dt * damping * target_velocity;
                let x = if acceleration {
                    let x = 1.0 / (1.0 + a);
                    row.drive_velocity_bias = x * b * recip_response;
                    row.drive_velocity_multiplier = -x * a * recip_response;
                    row.drive_bias_coefficient = stiffness * x * recip_response * step_dt;
                    x
                } else {
                    let x = if response > 0.0 { 1.0 / (1.0 + a * response) } else { 0.0 };
                    row.drive_velocity_bias = x * b;
                    row.drive_velocity_multiplier = -x * a;
                    row.drive_bias_coefficient = stiffness * x * step_dt;
                    x
                };
                row.drive_target = target;
                row.drive_target_velocity = target_velocity;
                row.drive_impulse_multiplier = if sub_stepped { 1.0 } else { 1.0 - x };
                row.max_drive_impulse = drive.max_force * max_force_scale;
            }
            constraints.internal.push(row);
        }
        let end = constraints.internal.len();

        let lock_start = constraints.locks.len();
        for k in free..core.dof {
            let u = angular(&data.motion_matrix[i].column(k).into_owned());
            let axis = spatial(&u, &Vector3::zeros());
            let (delta_va, delta_vb) = two_link_response(topology, data, p, &(-axis), i, &axis);
            let response = axis.dot(&delta_vb) - axis.dot(&delta_va);
            let recip_response = if response > MIN_RESPONSE {
                1.0 / (response + CFM)
            } else {
                warnings.record_at(Warning::DegenerateResponse, i);
                0.0
            };
            constraints.locks.push(LockedAxisConstraint {
                link: i,
                axis,
                delta_va,
                delta_vb,
                response,
                recip_response,
                error: -data.joint_position[core.offset + k],
                bias_scale: erp / step_dt,
            });
        }
        let lock_end = constraints.locks.len();

        let rows = &mut constraints.rows[i];
        rows.internal = (start, end);
        rows.locks = (lock_start, lock_end);
    }

    super::external::prepare(constraints, topology, data, warnings);
}
