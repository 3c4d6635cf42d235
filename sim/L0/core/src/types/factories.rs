//! Factory methods for common articulated systems.
//!
//! These constructors produce ready-to-step articulations for canonical
//! test systems (pendulums, floating chains, branched trees). Used by
//! inline tests, the integration tests and the benchmarks.

use nalgebra::Vector3;
use sim_articulation_types::{ArticulationConfig, JointAxis, JointDesc, LinkDesc, Result};

use super::articulation::Articulation;

impl Articulation {
    /// Create an n-link serial pendulum hanging from a fixed base.
    ///
    /// Every joint is a hinge about the world y axis. Each link is a small
    /// sphere of `link_mass` whose centre sits `link_length` below the
    /// previous joint, so all links hang straight down at zero positions.
    ///
    /// # Errors
    ///
    /// Returns an error if `n` exceeds the link limit or the mass is not
    /// positive.
    ///
    /// # Example
    /// ```
    /// use sim_articulation::Articulation;
    ///
    /// let mut pendulum = Articulation::n_link_pendulum(3, 1.0, 1.0).unwrap();
    /// pendulum.set_joint_positions(&[0.3, 0.0, 0.0]).unwrap();
    /// pendulum.step(1e-3).unwrap();
    /// ```
    pub fn n_link_pendulum(n: usize, link_length: f64, link_mass: f64) -> Result<Self> {
        Self::n_link_pendulum_with(ArticulationConfig::fixed_base(), n, link_length, link_mass)
    }

    /// [`Articulation::n_link_pendulum`] with a custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Articulation::n_link_pendulum`].
    pub fn n_link_pendulum_with(
        config: ArticulationConfig,
        n: usize,
        link_length: f64,
        link_mass: f64,
    ) -> Result<Self> {
        let mut artic = Self::new(config, LinkDesc::sphere(1.0, 0.1))?;
        let bob = LinkDesc::sphere(link_mass, 0.05);
        let mut parent = 0;
        // Each hinge sits at the previous link's centre.
        let hinge = JointDesc::revolute(JointAxis::Swing1)
            .with_anchor(Vector3::zeros(), Vector3::new(0.0, 0.0, link_length));
        for _ in 0..n {
            parent = artic.add_link(parent, bob, hinge.clone())?;
        }
        Ok(artic)
    }

    /// Create a floating chain of `n` rods in zero gravity.
    ///
    /// Joints alternate between hinges about x and free spherical joints,
    /// so the chain exercises both explicit and exponential-map joints.
    ///
    /// # Errors
    ///
    /// Returns an error if `n` exceeds the link limit.
    pub fn floating_chain(n: usize, link_length: f64) -> Result<Self> {
        let config = ArticulationConfig::floating_base().zero_gravity();
        let mut artic = Self::new(config, LinkDesc::cuboid(2.0, Vector3::new(0.4, 0.3, 0.2)))?;
        let half = 0.5 * link_length;
        let mut parent = 0;
        for i in 0..n {
            let joint = if i % 2 == 0 {
                JointDesc::revolute(JointAxis::Twist)
            } else {
                JointDesc::spherical()
            };
            let in_parent = if i == 0 {
                Vector3::new(0.0, 0.0, -0.1)
            } else {
                Vector3::new(0.0, 0.0, -half)
            };
            let link = LinkDesc::cuboid(1.0, Vector3::new(0.1, 0.1, link_length));
            parent = artic.add_link(parent, link, joint.with_anchor(in_parent, Vector3::new(0.0, 0.0, half)))?;
        }
        Ok(artic)
    }

    /// Create a fixed-base tree with `branches` hinge chains of `depth`
    /// links hanging from the base.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree exceeds the link limit.
    pub fn branched_tree(branches: usize, depth: usize) -> Result<Self> {
        let mut artic = Self::new(ArticulationConfig::fixed_base(), LinkDesc::sphere(1.0, 0.2))?;
        for b in 0..branches {
            #[allow(clippy::cast_precision_loss)]
            let angle = std::f64::consts::TAU * b as f64 / branches.max(1) as f64;
            let offset = Vector3::new(0.3 * angle.cos(), 0.3 * angle.sin(), 0.0);
            let mut parent = 0;
            for d in 0..depth {
                let in_parent = if d == 0 { offset } else { Vector3::new(0.0, 0.0, -0.25) };
                let axis = if d % 2 == 0 { JointAxis::Swing1 } else { JointAxis::Swing2 };
                let hinge = JointDesc::revolute(axis)
                    .with_anchor(in_parent, Vector3::new(0.0, 0.0, 0.25));
                parent = artic.add_link(parent, LinkDesc::cuboid(0.5, Vector3::new(0.05, 0.05, 0.5)), hinge)?;
            }
        }
        Ok(artic)
    }
}
