//! Joint rows and external rows solved through whole steps.

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Vector3};
use sim_articulation::{
    Articulation, ArticulationConfig, ExternalConstraint, JointAxis, JointDesc, JointDrive,
    LinkDesc, Motion, STANDARD_GRAVITY, SphericalLockMode,
};

use crate::fixtures::{TIGHT, max_pose_difference, vertical_hinge};

fn weightless_pendulum() -> Articulation {
    Articulation::n_link_pendulum_with(ArticulationConfig::fixed_base().zero_gravity(), 1, 0.5, 1.0)
        .expect("pendulum")
}

/// Test: a drive pulling past the upper limit never carries the joint
/// beyond it, from any start inside the range.
#[test]
fn limit_contains_driven_joint() {
    let (lo, hi) = (-0.4, 0.4);
    for q0 in [-0.4, -0.1, 0.2, 0.4] {
        let mut artic = weightless_pendulum();
        artic.set_joint_limit(1, JointAxis::Swing1, lo, hi).expect("limit");
        artic
            .set_joint_drive(1, JointAxis::Swing1, JointDrive::force(200.0, 10.0, 1e6))
            .expect("drive");
        artic.set_drive_target(1, JointAxis::Swing1, 1.5, 0.0).expect("target");
        artic.set_joint_positions(&[q0]).expect("positions");

        for _ in 0..240 {
            artic.step(1.0 / 240.0).expect("step");
            let q = artic.joint_positions()[0];
            assert!(q <= hi + TIGHT, "start {q0}: q = {q} beyond {hi}");
            assert!(q >= lo - TIGHT, "start {q0}: q = {q} below {lo}");
        }
        assert_relative_eq!(artic.joint_positions()[0], hi, epsilon = 1e-2);
    }
}

/// Test: a joint thrown at its limit is stopped there by the limit row.
#[test]
fn limit_stops_fast_joint() {
    let mut artic = weightless_pendulum();
    artic.set_joint_limit(1, JointAxis::Swing1, -0.3, 0.3).expect("limit");
    artic.set_joint_velocities(&[20.0]).expect("velocities");

    for _ in 0..30 {
        artic.step(1.0 / 60.0).expect("step");
        assert!(artic.joint_positions()[0] <= 0.3 + TIGHT);
    }
    let row = artic.internal_constraints()[0];
    assert_eq!(row.link(), 1);
    assert_eq!(row.axis(), JointAxis::Swing1);
}

/// Test: a position drive settles on its target.
#[test]
fn position_drive_converges() {
    let mut artic = weightless_pendulum();
    artic
        .set_joint_drive(1, JointAxis::Swing1, JointDrive::force(100.0, 20.0, 1e10))
        .expect("drive");
    artic.set_drive_target(1, JointAxis::Swing1, 0.5, 0.0).expect("target");

    for _ in 0..600 {
        artic.step(1.0 / 240.0).expect("step");
    }
    assert_relative_eq!(artic.joint_positions()[0], 0.5, epsilon = 1e-3);
    assert_relative_eq!(artic.joint_velocities()[0], 0.0, epsilon = 1e-3);
}

/// Test: a drive's impulse per step never exceeds its force limit times
/// the step.
#[test]
fn drive_respects_force_limit() {
    let mut artic = weightless_pendulum();
    let max_force = 0.5;
    artic
        .set_joint_drive(1, JointAxis::Swing1, JointDrive::force(1e4, 100.0, max_force))
        .expect("drive");
    artic.set_drive_target(1, JointAxis::Swing1, 1.0, 0.0).expect("target");

    let dt = 1.0 / 60.0;
    for _ in 0..10 {
        artic.step(dt).expect("step");
        let impulse = artic.internal_constraints()[0].drive_impulse();
        assert!(impulse.abs() <= max_force * dt + 1e-12, "drive impulse {impulse}");
    }
    // The limited drive makes progress but has not arrived.
    let q = artic.joint_positions()[0];
    assert!(q > 0.0 && q < 1.0, "q = {q}");
}

/// Test: joint friction brings a spinning hinge to rest; without friction
/// it keeps spinning.
#[test]
fn friction_stops_spinning_joint() {
    let mut rough = vertical_hinge(0.5);
    let mut smooth = vertical_hinge(0.0);
    rough.set_joint_velocities(&[2.0]).expect("velocities");
    smooth.set_joint_velocities(&[2.0]).expect("velocities");

    for _ in 0..60 {
        rough.step(1.0 / 60.0).expect("step");
        smooth.step(1.0 / 60.0).expect("step");
    }
    assert_relative_eq!(rough.joint_velocities()[0], 0.0, epsilon = 1e-6);
    assert_relative_eq!(smooth.joint_velocities()[0], 2.0, epsilon = 1e-9);
    assert!(smooth.internal_constraints().is_empty());
}

fn locked_pair(joint: JointDesc) -> Articulation {
    let mut artic = Articulation::new(
        ArticulationConfig::floating_base(),
        LinkDesc::cuboid(2.0, Vector3::new(0.4, 0.3, 0.2)),
    )
    .expect("root");
    let mid = artic
        .add_link(
            0,
            LinkDesc::cuboid(1.0, Vector3::new(0.1, 0.1, 0.4)),
            joint.with_anchor(Vector3::new(0.0, 0.0, -0.1), Vector3::new(0.0, 0.0, 0.2)),
        )
        .expect("mid");
    let hinge = JointDesc::revolute(JointAxis::Twist)
        .with_anchor(Vector3::new(0.0, 0.0, -0.2), Vector3::new(0.0, 0.0, 0.2));
    artic
        .add_link(mid, LinkDesc::cuboid(1.0, Vector3::new(0.1, 0.1, 0.4)), hinge)
        .expect("leaf");
    artic.set_joint_positions(&[0.4]).expect("positions");
    artic.set_joint_velocities(&[1.5]).expect("velocities");
    artic.set_root_velocity(Vector3::new(0.2, -0.1, 0.3), Vector3::new(0.0, 1.0, 0.5));
    artic
}

/// Test: a spherical joint with every axis locked moves and responds
/// exactly like a fixed joint.
#[test]
fn fully_locked_spherical_matches_fixed_joint() {
    let locked = JointDesc::spherical()
        .with_motion(JointAxis::Twist, Motion::Locked)
        .with_motion(JointAxis::Swing1, Motion::Locked)
        .with_motion(JointAxis::Swing2, Motion::Locked);
    let mut a = locked_pair(locked);
    let mut b = locked_pair(JointDesc::fixed());
    assert_eq!(a.dof_count(), b.dof_count());

    for _ in 0..30 {
        a.step(1.0 / 60.0).expect("step");
        b.step(1.0 / 60.0).expect("step");
    }
    assert!(max_pose_difference(&a, &b) < TIGHT);
    assert_relative_eq!(a.joint_velocities()[0], b.joint_velocities()[0], epsilon = TIGHT);

    let impulse = nalgebra::Vector6::new(0.3, 0.0, -0.2, 1.0, 0.5, 0.0);
    let ra = a.impulse_response(2, &impulse).expect("response");
    let rb = b.impulse_response(2, &impulse).expect("response");
    assert_relative_eq!(ra, rb, epsilon = TIGHT);
}

fn spinning_ball(lock_twist: bool) -> Articulation {
    let mut artic =
        Articulation::new(ArticulationConfig::fixed_base().zero_gravity(), LinkDesc::sphere(1.0, 0.1))
            .expect("root");
    let mut ball = JointDesc::spherical().with_anchor(Vector3::zeros(), Vector3::new(0.0, 0.0, 0.5));
    if lock_twist {
        ball = ball
            .with_motion(JointAxis::Twist, Motion::Locked)
            .with_lock_mode(SphericalLockMode::Soft);
    }
    artic.add_link(0, LinkDesc::sphere(1.0, 0.05), ball).expect("link");
    let twist = artic.joint(1).and_then(|j| j.dof_of(JointAxis::Twist)).expect("twist slot");
    let mut qd = [0.0; 3];
    qd[twist] = 2.0;
    artic.set_joint_velocities(&qd).expect("velocities");
    artic
}

/// Test: a soft-locked twist axis holds near zero while the same joint
/// with the axis free spins.
#[test]
fn soft_lock_holds_twist() {
    let mut locked = spinning_ball(true);
    let mut free = spinning_ball(false);
    assert_eq!(locked.dof_count(), 3);
    let slot = locked.joint(1).and_then(|j| j.dof_of(JointAxis::Twist)).expect("slot");
    assert_eq!(slot, 2);

    for _ in 0..30 {
        locked.step(1.0 / 60.0).expect("step");
        free.step(1.0 / 60.0).expect("step");
    }
    let held = locked.joint_positions()[slot];
    assert!(held.abs() < 0.05, "locked twist drifted to {held}");
    let spun = free.joint_positions()[0];
    assert!(spun > 0.9, "free twist only reached {spun}");
}

/// Test: a contact row catches a falling body and carries its weight.
#[test]
fn contact_row_supports_falling_body() {
    let radius = 0.1;
    let mass = 2.0;
    let config = ArticulationConfig::floating_base()
        .root_pose(Isometry3::translation(0.0, 0.0, 0.5));
    let mut artic = Articulation::new(config, LinkDesc::sphere(mass, radius)).expect("body");
    let dt = 1.0 / 60.0;

    for _ in 0..120 {
        let separation = artic.links()[0].position().z - radius;
        let contact = ExternalConstraint::contact(
            0,
            Vector3::new(0.0, 0.0, -radius),
            Vector3::z(),
            separation,
            dt,
        );
        artic.add_external_constraint(contact).expect("contact");
        artic.step(dt).expect("step");
        assert!(artic.links()[0].position().z >= radius - 1e-6);
        assert!(artic.pending_external_constraints().is_empty());
    }

    assert_relative_eq!(artic.links()[0].position().z, radius, epsilon = 1e-3);
    assert_relative_eq!(artic.root_velocity()[5], 0.0, epsilon = 1e-3);
    let solved = artic.solved_external_constraints();
    assert_eq!(solved.len(), 1);
    assert_relative_eq!(solved[0].applied_impulse, mass * STANDARD_GRAVITY * dt, epsilon = 1e-3);
}

/// Test: a row with an empty impulse range is rejected.
#[test]
fn inverted_row_bounds_rejected() {
    let mut artic = Articulation::n_link_pendulum(1, 0.5, 1.0).expect("pendulum");
    let row = ExternalConstraint::new(1, nalgebra::Vector6::ith(0, 1.0)).with_bounds(1.0, -1.0);
    assert!(artic.add_external_constraint(row).is_err());
    let row = ExternalConstraint::new(5, nalgebra::Vector6::ith(0, 1.0));
    assert!(artic.add_external_constraint(row).is_err());
}
