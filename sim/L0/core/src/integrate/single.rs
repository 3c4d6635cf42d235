//! Single-step PGS integration.

use sim_articulation_types::Result;

use super::{begin_step, finish_step, integrate_positions};
use crate::backend::ArticulationSolver;
use crate::types::Articulation;

/// Advance one step of `dt`.
///
/// Positions are integrated with the velocities after the position
/// iterations; the velocity iterations only shape the velocities carried
/// into the next step.
pub(crate) fn step<S: ArticulationSolver + ?Sized>(
    solver: &S,
    artic: &mut Articulation,
    dt: f64,
) -> Result<()> {
    solver.compute_unconstrained_velocities(artic, dt)?;
    solver.setup_internal_constraints(artic, dt, dt, false);
    begin_step(artic);

    for _ in 0..artic.config.solver.position_iterations {
        solver.solve_internal_constraints(artic, dt, false, 0.0);
    }
    solver.flush_velocities(artic);

    let mut link_velocity = std::mem::take(&mut artic.scratch.pos_link_velocity);
    let mut joint_velocity = std::mem::take(&mut artic.scratch.pos_joint_velocity);
    link_velocity.clear();
    link_velocity.extend_from_slice(&artic.data.motion_velocity);
    joint_velocity.clear();
    joint_velocity.extend_from_slice(artic.data.joint_velocity.as_slice());

    for _ in 0..artic.config.solver.velocity_iterations {
        solver.solve_internal_constraints(artic, dt, true, 0.0);
    }
    solver.flush_velocities(artic);

    integrate_positions(artic, dt, &link_velocity, &joint_velocity);
    artic.scratch.pos_link_velocity = link_velocity;
    artic.scratch.pos_joint_velocity = joint_velocity;

    finish_step(artic, dt);
    Ok(())
}
