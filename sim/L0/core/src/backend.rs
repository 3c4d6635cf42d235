//! Solver capability interface.
//!
//! The stepping pipeline only talks to an articulation's solver through
//! [`ArticulationSolver`], so alternative formulations can be slotted in
//! at creation time. The reduced-coordinate solver is the only one shipped.

use std::fmt::Debug;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sim_articulation_types::{IntegrationMode, Result};

use crate::integrate::{single, tgs};
use crate::solver::{internal, sweep};
use crate::types::Articulation;

/// Available solver formulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverKind {
    /// Featherstone articulated-body dynamics with joint-space PGS/TGS rows.
    #[default]
    ReducedCoordinate,
}

/// Operations the stepping pipeline needs from an articulation solver.
///
/// An external scheduler may drive the phases itself (for example to merge
/// contact rows between setup and solve); [`step`](Self::step) runs them in
/// the order the articulation's integration mode asks for.
pub trait ArticulationSolver: Debug + Send + Sync {
    /// Which formulation this is.
    fn kind(&self) -> SolverKind;

    /// Advance joint and link velocities to their unconstrained values over
    /// `dt` and rebuild the response caches.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not positive and finite.
    fn compute_unconstrained_velocities(&self, artic: &mut Articulation, dt: f64) -> Result<()>;

    /// Build the joint rows and prepare queued external rows.
    fn setup_internal_constraints(&self, artic: &mut Articulation, step_dt: f64, dt: f64, sub_stepped: bool);

    /// One sweep over every row.
    fn solve_internal_constraints(
        &self,
        artic: &mut Articulation,
        dt: f64,
        velocity_iteration: bool,
        elapsed: f64,
    );

    /// Fold deferred impulses into velocities.
    fn flush_velocities(&self, artic: &mut Articulation);

    /// Run a complete step.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not positive and finite.
    fn step(&self, artic: &mut Articulation, dt: f64) -> Result<()>;
}

/// Featherstone reduced-coordinate solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReducedCoordinateSolver;

impl ArticulationSolver for ReducedCoordinateSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::ReducedCoordinate
    }

    fn compute_unconstrained_velocities(&self, artic: &mut Articulation, dt: f64) -> Result<()> {
        artic.forward_dynamics(dt)
    }

    fn setup_internal_constraints(&self, artic: &mut Articulation, step_dt: f64, dt: f64, sub_stepped: bool) {
        internal::setup(artic, step_dt, dt, sub_stepped);
    }

    fn solve_internal_constraints(
        &self,
        artic: &mut Articulation,
        dt: f64,
        velocity_iteration: bool,
        elapsed: f64,
    ) {
        sweep::solve(artic, dt, velocity_iteration, elapsed);
    }

    fn flush_velocities(&self, artic: &mut Articulation) {
        sweep::flush_velocities(artic);
    }

    fn step(&self, artic: &mut Articulation, dt: f64) -> Result<()> {
        match artic.config.integration {
            IntegrationMode::SingleStep => single::step(self, artic, dt),
            IntegrationMode::SubStepped { substeps } => tgs::step(self, artic, dt, substeps),
        }
    }
}

/// Create the solver for `kind`.
#[must_use]
pub fn create_solver(kind: SolverKind) -> Arc<dyn ArticulationSolver> {
    match kind {
        SolverKind::ReducedCoordinate => Arc::new(ReducedCoordinateSolver),
    }
}
