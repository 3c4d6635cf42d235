//! Forward dynamics pipeline: unconstrained velocities for one step.
//!
//! Stages run in order (velocity → inertia → bias → articulated bias →
//! acceleration), each in its own sub-module. The result is the velocity
//! every link and joint would have after `dt` with no internal or external
//! constraints; the constraint solver corrects it from there.

mod acceleration;
mod bias;
mod inertia;
mod velocity;

pub use bias::velocity_product;
pub(crate) use velocity::link_velocities;

use sim_articulation_types::Result;

use crate::types::Articulation;
use crate::types::articulation::check_timestep;

impl Articulation {
    /// Featherstone articulated-body pass over `dt` under gravity, applied
    /// joint forces and external accelerations.
    ///
    /// Joint and link velocities are advanced to their unconstrained values
    /// and the caches the impulse response and constraint solver read are
    /// rebuilt. Link accelerations hold the instantaneous accelerations of
    /// this pass.
    ///
    /// # Errors
    ///
    /// Returns [`sim_articulation_types::ArticulationError::InvalidTimestep`]
    /// if `dt` is not positive and finite.
    pub(crate) fn forward_dynamics(&mut self, dt: f64) -> Result<()> {
        check_timestep(dt)?;
        self.data.dt = dt;
        self.jcalc(false);

        velocity::fwd_velocity(self);
        self.data.pre_velocity.copy_from_slice(&self.data.motion_velocity);
        self.data.pre_joint_velocity.copy_from(&self.data.joint_velocity);

        inertia::fwd_inertia(self);
        bias::fwd_bias(self, dt);
        bias::fwd_articulated_bias(self);
        acceleration::fwd_acceleration(self, dt);
        Ok(())
    }
}
