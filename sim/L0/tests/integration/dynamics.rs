//! Unconstrained dynamics through whole steps.
//!
//! No joint rows exist in these articulations, so every result comes from
//! the forward pass and the integrator alone.

use approx::assert_relative_eq;
use nalgebra::{DVector, Vector3};
use sim_articulation::{
    Articulation, ArticulationConfig, LinkDesc, STANDARD_GRAVITY, SolverKind, SpatialVector,
    create_solver,
};

use crate::fixtures::{TIGHT, horizontal_pendulum};

/// Test: a lone floating body follows semi-implicit Euler exactly.
#[test]
fn free_fall_matches_semi_implicit_euler() {
    let mut artic = Articulation::new(ArticulationConfig::floating_base(), LinkDesc::sphere(2.0, 0.3))
        .expect("articulation");
    let dt = 0.01;
    let steps = 100;
    for _ in 0..steps {
        artic.step(dt).expect("step");
    }

    let n = f64::from(steps);
    let v = artic.root_velocity();
    assert_relative_eq!(v[5], -STANDARD_GRAVITY * n * dt, epsilon = TIGHT);
    let z = artic.links()[0].position().z;
    assert_relative_eq!(z, -STANDARD_GRAVITY * dt * dt * n * (n + 1.0) / 2.0, epsilon = 1e-8);
    assert_relative_eq!(v.fixed_rows::<3>(0).norm(), 0.0, epsilon = TIGHT);
}

/// Test: one forward pass of a tumbling chain leaves linear momentum
/// unchanged; angular momentum changes only by the explicit-Euler term.
#[test]
fn forward_pass_conserves_momentum() {
    let mut artic = Articulation::floating_chain(4, 0.5).expect("chain");
    artic
        .set_joint_positions(&[0.3, 0.2, -0.1, 0.4, -0.5, 0.1, 0.2, 0.3])
        .expect("positions");
    artic
        .set_joint_velocities(&[0.8, -0.4, 0.3, 0.5, 1.0, -0.6, 0.2, 0.7])
        .expect("velocities");
    artic.set_root_velocity(Vector3::new(0.1, -0.3, 0.2), Vector3::new(0.5, 0.2, -0.1));

    let solver = create_solver(SolverKind::ReducedCoordinate);
    // Settle the link velocities onto the joint velocities first.
    solver.compute_unconstrained_velocities(&mut artic, 1e-12).expect("forward");
    let p0 = artic.linear_momentum();
    let l0 = artic.angular_momentum();

    solver.compute_unconstrained_velocities(&mut artic, 1e-4).expect("forward");
    let p1 = artic.linear_momentum();
    let l1 = artic.angular_momentum();

    assert_relative_eq!(p1, p0, epsilon = 1e-9);
    assert!(
        (l1 - l0).norm() < 1e-3 * (1.0 + l0.norm()),
        "angular momentum jumped from {l0:?} to {l1:?}"
    );
}

/// Test: a free chain in zero gravity keeps both momenta over a second of
/// stepping, single-stepped and sub-stepped.
#[test]
fn free_chain_conserves_momentum_over_steps() {
    for substeps in [None, Some(4)] {
        let mut artic = Articulation::floating_chain(4, 0.5).expect("chain");
        if let Some(n) = substeps {
            let config = artic.config().clone().sub_stepped(n);
            artic.set_config(config).expect("config");
        }
        artic.set_joint_velocities(&[0.5; 8]).expect("velocities");
        artic.set_root_velocity(Vector3::new(0.0, 0.2, 0.0), Vector3::new(0.5, 0.0, 0.0));
        let dt = 1.0 / 240.0;
        artic.step(dt).expect("step");
        let p0 = artic.linear_momentum();
        let l0 = artic.angular_momentum();

        for _ in 0..240 {
            artic.step(dt).expect("step");
        }
        let linear_drift = (artic.linear_momentum() - p0).norm();
        let angular_drift = (artic.angular_momentum() - l0).norm();
        assert!(
            linear_drift < 1e-8 * p0.norm(),
            "{substeps:?}: linear momentum drifted by {linear_drift} from {p0:?}"
        );
        assert!(
            angular_drift < 1e-8 * l0.norm(),
            "{substeps:?}: angular momentum drifted by {angular_drift} from {l0:?}"
        );
    }
}

/// Test: a horizontal pendulum released from rest swings down with the
/// gravity torque, and one step does not gain energy.
#[test]
fn released_pendulum_swings_down_without_energy_gain() {
    let mut artic = horizontal_pendulum(1, 0.5);
    let e0 = artic.total_energy();
    assert_relative_eq!(e0, 0.0, epsilon = TIGHT);

    artic.step(1.0 / 60.0).expect("step");

    // Gravity along −y on a bob at +x: torque about −z.
    let omega = artic.link_velocities()[1];
    assert!(omega[2] < 0.0, "child should spin about -z, got {omega:?}");
    assert!(artic.joint_velocities()[0] < 0.0);
    assert!(
        artic.total_energy() <= e0 + 1e-12,
        "energy grew to {}",
        artic.total_energy()
    );
}

/// Test: a double pendulum keeps its energy within the integrator's error
/// band over two seconds.
#[test]
fn double_pendulum_energy_stays_bounded() {
    let mut artic = horizontal_pendulum(2, 0.5);
    let e0 = artic.total_energy();
    // m·g·(0.5 + 1.0): the energy scale of the swing.
    let scale = 9.81 * 1.5;
    let mut lowest: f64 = 0.0;

    for _ in 0..480 {
        artic.step(1.0 / 240.0).expect("step");
        let e = artic.total_energy();
        assert!(e <= e0 + 0.05 * scale, "energy grew to {e}");
        lowest = lowest.min(artic.links()[2].position().y);
    }
    assert!(lowest < -0.5, "tip never dropped: lowest y {lowest}");
}

/// Test: forces from inverse dynamics reproduce the accelerations of a
/// forward pass on a fixed-base chain.
#[test]
fn inverse_dynamics_inverts_forward_pass() {
    let mut artic = Articulation::n_link_pendulum(3, 0.5, 1.0).expect("pendulum");
    artic.set_joint_positions(&[0.4, -0.3, 0.2]).expect("positions");
    artic.set_joint_velocities(&[0.5, -1.0, 0.3]).expect("velocities");
    let tau = [1.0, -0.5, 0.25];
    artic.set_joint_forces(&tau).expect("forces");

    let mut cache = artic.create_cache();
    let solver = create_solver(SolverKind::ReducedCoordinate);
    solver.compute_unconstrained_velocities(&mut artic, 1e-3).expect("forward");
    cache.joint_acceleration.copy_from(artic.joint_accelerations());

    artic.compute_inverse_dynamics(&mut cache).expect("inverse");
    for (k, expected) in tau.iter().enumerate() {
        assert_relative_eq!(cache.inverse_dynamics_force[k], *expected, epsilon = 1e-8);
    }
}

/// Test: on a floating chain inverse dynamics needs no root wrench and
/// returns the applied joint forces.
#[test]
fn inverse_dynamics_inverts_floating_forward_pass() {
    let mut artic = Articulation::floating_chain(3, 0.4).expect("chain");
    artic.set_joint_positions(&[0.3, 0.1, -0.2, 0.4, 0.5]).expect("positions");
    artic.set_joint_velocities(&[0.2, -0.4, 0.1, 0.3, -0.2]).expect("velocities");
    artic.set_root_velocity(Vector3::new(0.1, 0.0, -0.2), Vector3::new(0.3, 0.1, 0.0));
    let tau = [0.5, -0.2, 0.1, 0.3, -0.4];
    artic.set_joint_forces(&tau).expect("forces");

    let solver = create_solver(SolverKind::ReducedCoordinate);
    // Align link velocities with the joint velocities before reading them.
    solver.compute_unconstrained_velocities(&mut artic, 1e-12).expect("forward");
    let mut cache = artic.create_cache();
    solver.compute_unconstrained_velocities(&mut artic, 1e-3).expect("forward");
    cache.joint_acceleration.copy_from(artic.joint_accelerations());
    cache.root_acceleration = artic.link_accelerations()[0];

    artic.compute_inverse_dynamics(&mut cache).expect("inverse");
    for k in 0..6 {
        assert_relative_eq!(cache.inverse_dynamics_force[k], 0.0, epsilon = 1e-8);
    }
    for (k, expected) in tau.iter().enumerate() {
        assert_relative_eq!(cache.inverse_dynamics_force[6 + k], *expected, epsilon = 1e-8);
    }
}

/// Test: applying the generalized gravity force holds a bent chain still.
#[test]
fn gravity_compensation_holds_pose() {
    let mut artic = Articulation::n_link_pendulum(3, 0.5, 1.0).expect("pendulum");
    artic.set_joint_positions(&[0.7, -0.4, 0.9]).expect("positions");
    let mut cache = artic.create_cache();
    artic.compute_generalized_gravity_force(&mut cache).expect("gravity");
    let hold: Vec<f64> = cache.gravity_force.iter().copied().collect();
    artic.set_joint_forces(&hold).expect("forces");

    for _ in 0..10 {
        artic.step(1.0 / 120.0).expect("step");
    }
    for qd in artic.joint_velocities().iter() {
        assert_relative_eq!(*qd, 0.0, epsilon = 1e-8);
    }
    assert_relative_eq!(artic.joint_positions()[0], 0.7, epsilon = 1e-8);
}

/// Test: accelerations solved from the inverse-dynamics forces are the
/// accelerations that produced them.
#[test]
fn joint_acceleration_inverts_inverse_dynamics() {
    let mut artic = Articulation::branched_tree(2, 3).expect("tree");
    artic.set_joint_positions(&[0.2, -0.3, 0.1, 0.4, 0.0, -0.2]).expect("positions");
    let mut cache = artic.create_cache();
    cache.joint_velocity.copy_from_slice(&[0.3, -0.2, 0.5, 0.1, -0.4, 0.2]);
    let qdd = DVector::from_column_slice(&[1.0, -0.5, 0.25, 2.0, -1.5, 0.75]);
    cache.joint_acceleration.copy_from(&qdd);

    artic.compute_inverse_dynamics(&mut cache).expect("inverse");
    cache.joint_force.copy_from(&cache.inverse_dynamics_force);
    cache.joint_acceleration.fill(0.0);
    artic.compute_joint_acceleration(&mut cache).expect("acceleration");
    assert_relative_eq!(cache.joint_acceleration, qdd, epsilon = 1e-8);
}

/// Test: on a floating chain the solved accelerations need only the joint
/// forces back from inverse dynamics, with no root wrench.
#[test]
fn joint_acceleration_of_floating_chain_needs_no_root_wrench() {
    let mut artic = Articulation::floating_chain(3, 0.4).expect("chain");
    artic.set_joint_positions(&[0.3, 0.1, -0.2, 0.4, 0.5]).expect("positions");
    let mut cache = artic.create_cache();
    cache.joint_velocity.copy_from_slice(&[0.2, -0.4, 0.1, 0.3, -0.2]);
    cache.root_velocity = SpatialVector::new(0.1, 0.0, -0.2, 0.3, 0.1, 0.0);
    let tau = DVector::from_column_slice(&[0.5, -0.2, 0.1, 0.3, -0.4]);
    cache.joint_force.copy_from(&tau);

    artic.compute_joint_acceleration(&mut cache).expect("acceleration");
    artic.compute_inverse_dynamics(&mut cache).expect("inverse");
    assert_relative_eq!(cache.inverse_dynamics_force.rows(0, 6).norm(), 0.0, epsilon = 1e-8);
    assert_relative_eq!(cache.inverse_dynamics_force.rows(6, 5).into_owned(), tau, epsilon = 1e-8);
}

/// Test: the cache query agrees with a forward pass on the same state.
#[test]
fn joint_acceleration_matches_forward_pass() {
    let mut artic = Articulation::n_link_pendulum(3, 0.5, 1.0).expect("pendulum");
    artic.set_joint_positions(&[0.4, -0.3, 0.2]).expect("positions");
    artic.set_joint_velocities(&[0.5, -1.0, 0.3]).expect("velocities");
    artic.set_joint_forces(&[1.0, -0.5, 0.25]).expect("forces");

    let mut cache = artic.create_cache();
    artic.compute_joint_acceleration(&mut cache).expect("acceleration");
    let solver = create_solver(SolverKind::ReducedCoordinate);
    solver.compute_unconstrained_velocities(&mut artic, 1e-3).expect("forward");
    assert_relative_eq!(&cache.joint_acceleration, artic.joint_accelerations(), epsilon = 1e-7);
}

/// Test: link wrenches map to `Σ Jᵀ f`, and drive the joints exactly as the
/// equal joint forces do.
#[test]
fn generalized_external_force_acts_like_joint_force() {
    let mut artic = Articulation::n_link_pendulum(2, 0.5, 1.0).expect("pendulum");
    artic.set_joint_positions(&[0.3, -0.6]).expect("positions");
    let mut cache = artic.create_cache();
    cache.external_force[1] = SpatialVector::new(0.0, 0.2, 0.0, 1.0, 0.0, -0.5);
    cache.external_force[2] = SpatialVector::new(0.1, 0.0, 0.3, 0.0, 2.0, 0.0);

    artic.compute_generalized_external_force(&mut cache).expect("external");
    let mut expected = DVector::zeros(artic.coordinate_count());
    for (i, f) in cache.external_force.iter().enumerate() {
        let jac = artic.link_jacobian(i).expect("jacobian");
        expected += jac.tr_mul(&DVector::from_column_slice(f.as_slice()));
    }
    assert_relative_eq!(cache.generalized_external_force, expected, epsilon = 1e-12);

    artic.compute_joint_acceleration(&mut cache).expect("acceleration");
    let pushed = cache.joint_acceleration.clone();
    let mut forced = artic.create_cache();
    forced.joint_force.copy_from(&expected);
    artic.compute_joint_acceleration(&mut forced).expect("acceleration");
    assert_relative_eq!(pushed, forced.joint_acceleration, epsilon = 1e-9);
}
