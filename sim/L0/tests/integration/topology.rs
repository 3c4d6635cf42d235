//! Tree edits, joint recompute, warnings and rejected operations.

use approx::assert_relative_eq;
use nalgebra::Vector3;
use proptest::prelude::*;
use sim_articulation::{
    Articulation, ArticulationConfig, ArticulationError, JointAxis, JointDesc, LinkDesc, MAX_LINKS,
    Motion, Topology, Warning,
};

proptest! {
    /// Parents precede children and every mask is the parent's mask plus
    /// the link's own bit, for any sequence of appends.
    #[test]
    fn appended_trees_keep_parent_order(choices in prop::collection::vec(0usize..1000, 0..(MAX_LINKS - 1))) {
        let mut topology = Topology::new();
        for choice in choices {
            let parent = choice % topology.len();
            topology.push(parent).expect("push");
        }
        prop_assert!(topology.is_consistent());
        for i in 1..topology.len() {
            let parent = topology.parent(i).expect("parent");
            prop_assert!(parent < i);
            prop_assert_eq!(topology.path_to_root(i), topology.path_to_root(parent) | (1u64 << i));
            prop_assert!(topology.is_ancestor(parent, i));
            prop_assert_eq!(topology.common_ancestor(parent, i), Some(parent));
        }
    }
}

/// Test: refreshing the joint model twice yields bit-identical caches.
#[test]
fn jcalc_is_idempotent() {
    let mut artic = Articulation::floating_chain(5, 0.4).expect("chain");
    artic
        .set_joint_positions(&[0.3, 0.1, -0.2, 0.4, 0.5, -0.6, 0.2, 0.1, 0.05])
        .expect("positions");
    artic.jcalc(false);
    let first = artic.data().clone();
    artic.jcalc(false);
    assert_eq!(&first, artic.data());
}

/// Test: locking an axis rebuilds the DOF layout and keeps the state of
/// the surviving axes.
#[test]
fn motion_change_remaps_dofs() {
    let mut artic =
        Articulation::new(ArticulationConfig::fixed_base(), LinkDesc::sphere(1.0, 0.1)).expect("root");
    artic
        .add_link(
            0,
            LinkDesc::sphere(1.0, 0.05),
            JointDesc::spherical().with_anchor(Vector3::zeros(), Vector3::new(0.0, 0.0, 0.5)),
        )
        .expect("link");
    artic.set_joint_positions(&[0.1, 0.2, 0.3]).expect("positions");
    artic.set_joint_motion(1, JointAxis::Twist, Motion::Locked).expect("lock");
    artic.jcalc(false);

    assert_eq!(artic.dof_count(), 2);
    let joint = artic.joint(1).expect("joint");
    assert_eq!(joint.axes(), &[JointAxis::Swing1, JointAxis::Swing2]);
    assert_relative_eq!(artic.joint_positions()[0], 0.2);
    assert_relative_eq!(artic.joint_positions()[1], 0.3);
}

/// Test: removing a leaf shifts later links down and the articulation
/// still steps.
#[test]
fn remove_leaf_link() {
    let mut artic = Articulation::branched_tree(2, 2).expect("tree");
    assert_eq!(artic.link_count(), 5);
    let last_pose = *artic.links()[4].pose();

    artic.remove_link(2).expect("remove");
    assert_eq!(artic.link_count(), 4);
    assert_eq!(artic.dof_count(), 3);
    assert!(artic.topology().is_consistent());
    assert_eq!(*artic.links()[3].pose(), last_pose);
    assert_eq!(artic.topology().parent(3), Some(2));

    artic.step(1.0 / 60.0).expect("step");
}

/// Test: structural mistakes are rejected with the matching error.
#[test]
fn invalid_edits_rejected() {
    let mut artic = Articulation::n_link_pendulum(2, 0.5, 1.0).expect("pendulum");
    assert!(matches!(artic.remove_link(1), Err(ArticulationError::NotALeaf(1))));
    assert!(matches!(artic.remove_link(0), Err(ArticulationError::EmptyArticulation)));
    assert!(matches!(
        artic.add_link(9, LinkDesc::default(), JointDesc::spherical()),
        Err(ArticulationError::InvalidParent { parent: 9, .. })
    ));
    assert!(artic
        .add_link(0, LinkDesc::new(0.0, Vector3::new(1.0, 1.0, 1.0)), JointDesc::spherical())
        .is_err());
    assert!(artic
        .add_link(0, LinkDesc::default(), JointDesc::revolute(JointAxis::X))
        .is_err());
    assert!(matches!(
        artic.set_joint_positions(&[0.0]),
        Err(ArticulationError::CacheSizeMismatch { .. })
    ));
    assert!(matches!(artic.step(0.0), Err(ArticulationError::InvalidTimestep(_))));
    assert!(artic.step(f64::NAN).is_err());
    assert_eq!(artic.link_count(), 3);
}

/// Test: an articulation holds at most the link limit.
#[test]
fn link_limit_enforced() {
    let mut artic =
        Articulation::new(ArticulationConfig::fixed_base(), LinkDesc::sphere(1.0, 0.1)).expect("root");
    for i in 1..MAX_LINKS {
        artic
            .add_link(i - 1, LinkDesc::sphere(0.1, 0.05), JointDesc::spherical())
            .expect("within limit");
    }
    let err = artic
        .add_link(0, LinkDesc::sphere(0.1, 0.05), JointDesc::spherical())
        .unwrap_err();
    assert!(err.is_resource_error());
    assert!(matches!(err, ArticulationError::TooManyLinks { .. }));
}

/// Test: an over-speed joint is clamped and the event counted, not
/// raised.
#[test]
fn velocity_clamp_is_a_warning() {
    let mut artic =
        Articulation::new(ArticulationConfig::fixed_base(), LinkDesc::sphere(1.0, 0.1)).expect("root");
    let hinge = JointDesc::revolute(JointAxis::Swing1)
        .with_anchor(Vector3::zeros(), Vector3::new(-0.5, 0.0, 0.0))
        .with_max_joint_velocity(0.5);
    artic.add_link(0, LinkDesc::sphere(1.0, 0.05), hinge).expect("link");

    for _ in 0..60 {
        artic.step(1.0 / 60.0).expect("step");
        assert!(artic.joint_velocities()[0].abs() <= 0.5 + 1e-12);
    }
    assert!(artic.warnings().count(Warning::VelocityClamped) > 0);
    artic.clear_warnings();
    assert!(!artic.warnings().any());
}

/// Test: non-finite joint state is reset during the step.
#[test]
fn non_finite_state_is_reset() {
    let mut artic = Articulation::n_link_pendulum(1, 0.5, 1.0).expect("pendulum");
    artic.set_joint_velocities(&[f64::NAN]).expect("velocities");
    artic.step(1.0 / 60.0).expect("step");
    assert!(artic.joint_velocities()[0].is_finite());
    assert_eq!(artic.warnings().count(Warning::BadJointState), 1);
}
