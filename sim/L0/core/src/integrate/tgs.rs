//! Sub-stepped (TGS) integration.
//!
//! Forward dynamics and row setup run once over the full step. Each
//! sub-step then runs the position iterations against the joint positions
//! reached so far, folds the impulses into velocities and advances the
//! uncommitted pose copy. Drive targets move along their target velocity
//! with the elapsed sub-step time.
//!
//! The velocity iterations settle the reported row impulses. The velocities
//! kept after the step are the accumulated motion divided by the full `dt`,
//! which filters the sub-step to sub-step noise of the solver velocities.

use sim_articulation_types::Result;
use tracing::trace;

use super::{
    begin_step, commit_poses, derive_velocities_from_motion, integrate_positions,
    momentum_target, settle_velocities,
};
use crate::backend::ArticulationSolver;
use crate::types::Articulation;

/// Advance one step of `dt` in `substeps` sub-steps.
pub(crate) fn step<S: ArticulationSolver + ?Sized>(
    solver: &S,
    artic: &mut Articulation,
    dt: f64,
    substeps: u32,
) -> Result<()> {
    let substeps = substeps.max(1);
    let step_dt = dt / f64::from(substeps);

    solver.compute_unconstrained_velocities(artic, dt)?;
    solver.setup_internal_constraints(artic, step_dt, dt, true);
    begin_step(artic);

    let mut link_velocity = std::mem::take(&mut artic.scratch.pos_link_velocity);
    let mut joint_velocity = std::mem::take(&mut artic.scratch.pos_joint_velocity);
    for s in 0..substeps {
        let elapsed = step_dt * f64::from(s);
        for _ in 0..artic.config.solver.position_iterations {
            solver.solve_internal_constraints(artic, step_dt, false, elapsed);
        }
        solver.flush_velocities(artic);

        link_velocity.clear();
        link_velocity.extend_from_slice(&artic.data.motion_velocity);
        joint_velocity.clear();
        joint_velocity.extend_from_slice(artic.data.joint_velocity.as_slice());
        integrate_positions(artic, step_dt, &link_velocity, &joint_velocity);
        trace!(substep = s, elapsed, "integrated sub-step");
    }
    artic.scratch.pos_link_velocity = link_velocity;
    artic.scratch.pos_joint_velocity = joint_velocity;

    for _ in 0..artic.config.solver.velocity_iterations {
        solver.solve_internal_constraints(artic, step_dt, true, dt);
    }
    solver.flush_velocities(artic);

    let momentum = momentum_target(artic);
    commit_poses(artic);
    derive_velocities_from_motion(artic, dt);
    settle_velocities(artic, dt, &momentum);
    Ok(())
}
