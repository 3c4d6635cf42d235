//! Link (rigid body) descriptors.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ArticulationError, Result};

/// Mass properties and per-link damping of an articulation link.
///
/// The link frame is the centre-of-mass frame, with the inertia tensor
/// diagonal in it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkDesc {
    /// Mass (kg).
    pub mass: f64,
    /// Principal moments of inertia (kg·m²).
    pub inertia: Vector3<f64>,
    /// Linear velocity damping rate (1/s).
    pub linear_damping: f64,
    /// Angular velocity damping rate (1/s).
    pub angular_damping: f64,
    /// Speed above which a drag pulls the link back (m/s).
    pub max_linear_velocity: f64,
    /// Angular speed above which a drag pulls the link back (rad/s).
    pub max_angular_velocity: f64,
    /// Skip gravity for this link.
    pub disable_gravity: bool,
}

impl Default for LinkDesc {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia: Vector3::new(1.0, 1.0, 1.0),
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_linear_velocity: 1e10,
            max_angular_velocity: 100.0,
            disable_gravity: false,
        }
    }
}

impl LinkDesc {
    /// Link with the given mass and principal inertia.
    #[must_use]
    pub fn new(mass: f64, inertia: Vector3<f64>) -> Self {
        Self {
            mass,
            inertia,
            ..Self::default()
        }
    }

    /// Solid sphere.
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::new(mass, Vector3::new(i, i, i))
    }

    /// Solid box with full side lengths `size`.
    #[must_use]
    pub fn cuboid(mass: f64, size: Vector3<f64>) -> Self {
        let (x2, y2, z2) = (size.x * size.x, size.y * size.y, size.z * size.z);
        Self::new(
            mass,
            Vector3::new(y2 + z2, x2 + z2, x2 + y2) * (mass / 12.0),
        )
    }

    /// Thin rod of the given length along the link's y axis.
    #[must_use]
    pub fn rod(mass: f64, length: f64) -> Self {
        let i = mass * length * length / 12.0;
        Self::new(mass, Vector3::new(i, 1e-4 * i.max(1e-6), i))
    }

    /// Set damping rates.
    #[must_use]
    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set the velocity bounds that trigger drag.
    #[must_use]
    pub fn with_max_velocity(mut self, linear: f64, angular: f64) -> Self {
        self.max_linear_velocity = linear;
        self.max_angular_velocity = angular;
        self
    }

    /// Exclude this link from gravity.
    #[must_use]
    pub fn without_gravity(mut self) -> Self {
        self.disable_gravity = true;
        self
    }

    /// Inverse mass.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        1.0 / self.mass
    }

    /// Inverse principal inertia.
    #[must_use]
    pub fn inverse_inertia(&self) -> Vector3<f64> {
        self.inertia.map(|i| 1.0 / i)
    }

    /// Check mass properties and damping.
    pub fn validate(&self) -> Result<()> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(ArticulationError::invalid_mass(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }
        if self.inertia.iter().any(|i| !(*i > 0.0) || !i.is_finite()) {
            return Err(ArticulationError::invalid_mass(format!(
                "principal inertia must be positive and finite, got {:?}",
                self.inertia
            )));
        }
        if !(self.linear_damping >= 0.0 && self.angular_damping >= 0.0) {
            return Err(ArticulationError::invalid_mass("damping must be non-negative"));
        }
        if !(self.max_linear_velocity > 0.0 && self.max_angular_velocity > 0.0) {
            return Err(ArticulationError::invalid_mass(
                "velocity bounds must be positive",
            ));
        }
        Ok(())
    }
}
