//! Single-step against sub-stepped integration.

use approx::assert_relative_eq;
use nalgebra::Vector3;
use sim_articulation::{Articulation, ArticulationConfig, IntegrationMode, JointAxis, JointDrive};

use crate::fixtures::{TIGHT, horizontal_pendulum, max_pose_difference};

fn weightless_pendulum() -> Articulation {
    Articulation::n_link_pendulum_with(ArticulationConfig::fixed_base().zero_gravity(), 1, 0.5, 1.0)
        .expect("pendulum")
}

fn sub_stepped(mut artic: Articulation, substeps: u32) -> Articulation {
    let config = artic.config().clone().sub_stepped(substeps);
    artic.set_config(config).expect("config");
    artic
}

/// Test: with no rows, one sub-step reproduces the single-step poses.
#[test]
fn single_substep_matches_single_step_pendulum() {
    let mut single = horizontal_pendulum(3, 0.4);
    let mut tgs = sub_stepped(horizontal_pendulum(3, 0.4), 1);
    assert_eq!(tgs.config().integration, IntegrationMode::SubStepped { substeps: 1 });

    for _ in 0..20 {
        single.step(1.0 / 60.0).expect("step");
        tgs.step(1.0 / 60.0).expect("step");
    }
    let diff = max_pose_difference(&single, &tgs);
    assert!(diff < TIGHT, "poses differ by {diff}");
    assert_relative_eq!(single.joint_velocities(), tgs.joint_velocities(), epsilon = TIGHT);
}

/// Test: from the same state, one sub-step of a tumbling ball chain lands on
/// the single-step poses.
#[test]
fn single_substep_matches_single_step_free_chain() {
    let mut single = Articulation::floating_chain(4, 0.5).expect("chain");
    single.set_joint_velocities(&[0.5, 0.2, -0.3, 0.1, 0.4, 0.0, -0.2, 0.3]).expect("velocities");
    single.set_root_velocity(Vector3::new(0.3, 0.1, 0.0), Vector3::new(0.0, 0.5, 0.2));

    for _ in 0..20 {
        let mut tgs = sub_stepped(single.clone(), 1);
        single.step(1.0 / 60.0).expect("step");
        tgs.step(1.0 / 60.0).expect("step");
        let diff = max_pose_difference(&single, &tgs);
        assert!(diff < TIGHT, "poses differ by {diff}");
    }
}

/// Test: a sub-stepped joint stopped by its limit reports the velocity of
/// the motion it actually made over the step.
#[test]
fn sub_stepped_velocity_is_delta_motion_over_step() {
    let dt = 1.0 / 60.0;
    let mut artic = sub_stepped(weightless_pendulum(), 4);
    artic.set_joint_limit(1, JointAxis::Swing1, -0.2, 0.2).expect("limit");
    artic.set_joint_positions(&[0.15]).expect("positions");
    artic.set_joint_velocities(&[6.0]).expect("velocities");

    artic.step(dt).expect("step");
    let delta = artic.joint_delta_motion()[0];
    assert!(artic.joint_positions()[0] <= 0.2 + TIGHT);
    assert_relative_eq!(artic.joint_velocities()[0], delta / dt, epsilon = TIGHT);
    assert_relative_eq!(artic.joint_velocities()[0], 3.0, epsilon = 1e-3);

    for _ in 0..30 {
        artic.step(dt).expect("step");
        let delta = artic.joint_delta_motion()[0];
        assert_relative_eq!(artic.joint_velocities()[0], delta / dt, epsilon = TIGHT);
    }
}

/// Test: sub-stepped link velocities carry the pose change of a swinging
/// chain.
#[test]
fn sub_stepped_chain_velocity_matches_motion() {
    let dt = 1.0 / 60.0;
    let mut artic = sub_stepped(horizontal_pendulum(3, 0.4), 4);
    for _ in 0..10 {
        artic.step(dt).expect("step");
        let expected = artic.joint_delta_motion() / dt;
        assert_relative_eq!(artic.joint_velocities(), &expected, epsilon = 1e-8);
    }
}

/// Test: sub-stepping keeps a thrown limited joint in range.
#[test]
fn sub_stepped_limit_holds() {
    let mut artic = sub_stepped(weightless_pendulum(), 4);
    artic.set_joint_limit(1, JointAxis::Swing1, -0.2, 0.2).expect("limit");
    artic.set_joint_velocities(&[6.0]).expect("velocities");

    for _ in 0..240 {
        artic.step(1.0 / 120.0).expect("step");
        let q = artic.joint_positions()[0];
        assert!(q.abs() <= 0.2 + TIGHT, "limited joint at {q}");
    }
}

/// Test: a position drive converges when sub-stepped.
#[test]
fn sub_stepped_drive_converges() {
    let mut artic = sub_stepped(weightless_pendulum(), 4);
    artic
        .set_joint_drive(1, JointAxis::Swing1, JointDrive::force(150.0, 15.0, 1e6))
        .expect("drive");
    artic.set_drive_target(1, JointAxis::Swing1, -0.3, 0.0).expect("target");

    for _ in 0..480 {
        artic.step(1.0 / 120.0).expect("step");
    }
    assert_relative_eq!(artic.joint_positions()[0], -0.3, epsilon = 1e-3);
}

/// Test: the per-step joint motion record matches the position change.
#[test]
fn joint_delta_motion_tracks_position_change() {
    let mut artic = sub_stepped(horizontal_pendulum(2, 0.5), 4);
    for _ in 0..5 {
        let before = artic.joint_positions().clone();
        artic.step(1.0 / 60.0).expect("step");
        let moved = artic.joint_positions() - &before;
        assert_relative_eq!(artic.joint_delta_motion(), &moved, epsilon = TIGHT);
    }
}
