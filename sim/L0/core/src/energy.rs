//! Energy and momentum queries over the current link state.
//!
//! Read-only diagnostics: none of these touch solver state.
//!
//! - Kinetic: `½ Σ (m |v|² + ωᵀ I ω)`
//! - Potential: `−Σ m g · x` (gravity-disabled links excluded)
//! - Momentum: linear `Σ m v`, angular about the system centre of mass

use nalgebra::Vector3;

use crate::spatial::{angular, linear};
use crate::types::Articulation;

impl Articulation {
    /// Total mass of every link.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.links.iter().map(|l| l.desc.mass).sum()
    }

    /// System centre of mass in world.
    #[must_use]
    pub fn center_of_mass(&self) -> Vector3<f64> {
        let weighted: Vector3<f64> = self
            .links
            .iter()
            .map(|l| l.pose.translation.vector * l.desc.mass)
            .sum();
        weighted / self.total_mass()
    }

    /// Kinetic energy of the link velocities.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        self.links
            .iter()
            .zip(&self.data.motion_velocity)
            .map(|(link, v)| {
                let w = angular(v);
                let vel = linear(v);
                0.5 * (link.desc.mass * vel.norm_squared() + w.dot(&(link.world_inertia() * w)))
            })
            .sum()
    }

    /// Gravitational potential energy relative to the world origin.
    #[must_use]
    pub fn potential_energy(&self) -> f64 {
        let g = self.config.gravity;
        self.links
            .iter()
            .filter(|l| !l.desc.disable_gravity)
            .map(|l| -l.desc.mass * g.dot(&l.pose.translation.vector))
            .sum()
    }

    /// Kinetic plus potential energy.
    #[must_use]
    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    /// Linear momentum `Σ m v`.
    #[must_use]
    pub fn linear_momentum(&self) -> Vector3<f64> {
        self.links
            .iter()
            .zip(&self.data.motion_velocity)
            .map(|(link, v)| linear(v) * link.desc.mass)
            .sum()
    }

    /// Angular momentum about the system centre of mass.
    #[must_use]
    pub fn angular_momentum(&self) -> Vector3<f64> {
        let com = self.center_of_mass();
        self.links
            .iter()
            .zip(&self.data.motion_velocity)
            .map(|(link, v)| {
                let r = link.pose.translation.vector - com;
                link.world_inertia() * angular(v) + r.cross(&(linear(v) * link.desc.mass))
            })
            .sum()
    }
}
