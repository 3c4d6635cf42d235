//! Shared articulations and comparison helpers.

use nalgebra::Vector3;
use sim_articulation::{Articulation, ArticulationConfig, JointAxis, JointDesc, LinkDesc};

/// Gravity of the planar pendulum scenarios.
pub const PLANAR_GRAVITY: Vector3<f64> = Vector3::new(0.0, -9.81, 0.0);

/// Tolerance for results that should agree to rounding.
pub const TIGHT: f64 = 1e-9;

/// Fixed-base chain of `n` unit-mass bobs on hinges about z, laid out
/// along +x so the chain starts horizontal under [`PLANAR_GRAVITY`].
pub fn horizontal_pendulum(n: usize, link_length: f64) -> Articulation {
    let config = ArticulationConfig::fixed_base().gravity(PLANAR_GRAVITY);
    let mut artic = Articulation::new(config, LinkDesc::sphere(1.0, 0.1)).expect("root");
    let hinge = JointDesc::revolute(JointAxis::Swing2)
        .with_anchor(Vector3::zeros(), Vector3::new(-link_length, 0.0, 0.0));
    let mut parent = 0;
    for _ in 0..n {
        parent = artic
            .add_link(parent, LinkDesc::sphere(1.0, 0.05), hinge.clone())
            .expect("add link");
    }
    artic
}

/// One bob on a vertical hinge under default gravity: the weight loads the
/// joint without driving it.
pub fn vertical_hinge(friction: f64) -> Articulation {
    let mut artic =
        Articulation::new(ArticulationConfig::fixed_base(), LinkDesc::sphere(1.0, 0.1)).expect("root");
    let hinge = JointDesc::revolute(JointAxis::Swing2)
        .with_anchor(Vector3::zeros(), Vector3::new(-0.5, 0.0, 0.0))
        .with_friction(friction);
    artic
        .add_link(0, LinkDesc::sphere(1.0, 0.05), hinge)
        .expect("add link");
    artic
}

/// Largest translation or rotation difference between matching links.
pub fn max_pose_difference(a: &Articulation, b: &Articulation) -> f64 {
    a.links()
        .iter()
        .zip(b.links())
        .map(|(la, lb)| {
            let dx = (la.pose().translation.vector - lb.pose().translation.vector).norm();
            let dr = la.pose().rotation.angle_to(&lb.pose().rotation);
            dx.max(dr)
        })
        .fold(0.0, f64::max)
}
