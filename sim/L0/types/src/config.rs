//! Configuration types for articulations.
//!
//! This module provides the configuration that controls how an articulation
//! is stepped: base fixity, gravity, solver iterations and the integration
//! scheme.

use nalgebra::{Isometry3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ArticulationError, Result};

/// Standard gravity (m/s²) along -Z.
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// How an articulation advances over one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntegrationMode {
    /// Projected Gauss-Seidel with one position/velocity integration per step.
    #[default]
    SingleStep,
    /// Temporal Gauss-Seidel: the step is split into sub-steps that each
    /// run position iterations and advance an uncommitted pose copy.
    SubStepped {
        /// Number of sub-steps per step (at least 1).
        substeps: u32,
    },
}

impl IntegrationMode {
    /// Number of sub-steps per step.
    #[must_use]
    pub const fn substeps(self) -> u32 {
        match self {
            Self::SingleStep => 1,
            Self::SubStepped { substeps } => substeps,
        }
    }

    /// Whether the step is sub-stepped.
    #[must_use]
    pub const fn is_sub_stepped(self) -> bool {
        matches!(self, Self::SubStepped { .. })
    }
}

/// Constraint solver settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Position iterations per step (per sub-step when sub-stepping).
    pub position_iterations: u32,
    /// Velocity iterations per step.
    pub velocity_iterations: u32,
    /// Error reduction for limits and soft locks in single-step mode.
    pub error_reduction: f64,
    /// Error reduction for limits and soft locks in sub-stepped mode.
    pub substep_error_reduction: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            position_iterations: 4,
            velocity_iterations: 1,
            error_reduction: 1.0,
            substep_error_reduction: 0.7,
        }
    }
}

impl SolverConfig {
    /// Create a high-accuracy solver configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            position_iterations: 16,
            velocity_iterations: 4,
            ..Self::default()
        }
    }

    /// Create a fast, lower-accuracy solver configuration.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            position_iterations: 2,
            velocity_iterations: 1,
            ..Self::default()
        }
    }

    /// Set iteration counts.
    #[must_use]
    pub fn iterations(mut self, position: u32, velocity: u32) -> Self {
        self.position_iterations = position;
        self.velocity_iterations = velocity;
        self
    }

    /// Set both error reduction factors.
    #[must_use]
    pub fn error_reduction(mut self, single_step: f64, sub_stepped: f64) -> Self {
        self.error_reduction = single_step;
        self.substep_error_reduction = sub_stepped;
        self
    }

    /// Error reduction for the given integration mode.
    #[must_use]
    pub fn erp(&self, mode: IntegrationMode) -> f64 {
        if mode.is_sub_stepped() {
            self.substep_error_reduction
        } else {
            self.error_reduction
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        for (name, erp) in [
            ("error_reduction", self.error_reduction),
            ("substep_error_reduction", self.substep_error_reduction),
        ] {
            if !(0.0..=1.0).contains(&erp) {
                return Err(ArticulationError::invalid_config(format!(
                    "{name} must lie in [0, 1], got {erp}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-articulation configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArticulationConfig {
    /// Pin the root link in space.
    pub fix_base: bool,
    /// Gravity acceleration (m/s²).
    pub gravity: Vector3<f64>,
    /// Constraint solver settings.
    pub solver: SolverConfig,
    /// Integration scheme.
    pub integration: IntegrationMode,
    /// Interpret drive `max_force` as a force (scaled by dt) instead of an impulse.
    pub drive_limits_are_forces: bool,
    /// Initial world pose of the root link.
    pub root_pose: Isometry3<f64>,
}

impl Default for ArticulationConfig {
    fn default() -> Self {
        Self {
            fix_base: false,
            gravity: Vector3::new(0.0, 0.0, -STANDARD_GRAVITY),
            solver: SolverConfig::default(),
            integration: IntegrationMode::SingleStep,
            drive_limits_are_forces: true,
            root_pose: Isometry3::identity(),
        }
    }
}

impl ArticulationConfig {
    /// Configuration for a fixed-base articulation.
    #[must_use]
    pub fn fixed_base() -> Self {
        Self {
            fix_base: true,
            ..Self::default()
        }
    }

    /// Configuration for a floating-base articulation.
    #[must_use]
    pub fn floating_base() -> Self {
        Self::default()
    }

    /// Set the gravity vector.
    #[must_use]
    pub fn gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vector3::zeros();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Use sub-stepped (TGS) integration.
    #[must_use]
    pub fn sub_stepped(mut self, substeps: u32) -> Self {
        self.integration = IntegrationMode::SubStepped { substeps };
        self
    }

    /// Set the initial root pose.
    #[must_use]
    pub fn root_pose(mut self, pose: Isometry3<f64>) -> Self {
        self.root_pose = pose;
        self
    }

    /// Treat drive `max_force` as an impulse bound.
    #[must_use]
    pub fn drive_limits_as_impulses(mut self) -> Self {
        self.drive_limits_are_forces = false;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(ArticulationError::invalid_config("gravity must be finite"));
        }
        if let IntegrationMode::SubStepped { substeps: 0 } = self.integration {
            return Err(ArticulationError::invalid_config(
                "sub-stepped integration needs at least one sub-step",
            ));
        }
        self.solver.validate()
    }
}
