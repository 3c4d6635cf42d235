//! Impulse response queries against applied impulses and the joint-space
//! mass matrix.

use approx::{assert_relative_eq, relative_eq};
use nalgebra::{DMatrix, Vector3};
use proptest::prelude::*;
use sim_articulation::{
    Articulation, ArticulationConfig, ExternalConstraint, JointDesc, LinkDesc, SpatialVector, Warning,
};

fn bent_chain() -> Articulation {
    let mut artic = Articulation::floating_chain(3, 0.4).expect("chain");
    artic.set_joint_positions(&[0.3, 0.1, -0.2, 0.4, 0.5]).expect("positions");
    artic
}

fn velocity_change(artic: &Articulation, link: usize, impulse: &SpatialVector) -> SpatialVector {
    let mut kicked = artic.clone();
    let before = kicked.link_velocities()[link];
    kicked
        .apply_external_impulse(link, impulse.fixed_rows::<3>(0).into_owned(), impulse.fixed_rows::<3>(3).into_owned())
        .expect("impulse");
    kicked.link_velocities()[link] - before
}

fn spatial_strategy() -> impl Strategy<Value = SpatialVector> {
    prop::array::uniform6(-5.0..5.0f64).prop_map(|a| SpatialVector::from_column_slice(&a))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Responses superpose: the kick from `a + b` is the sum of the kicks.
    #[test]
    fn response_superposes(a in spatial_strategy(), b in spatial_strategy(), link in 0usize..4) {
        let mut artic = bent_chain();
        let ra = artic.impulse_response(link, &a).expect("response");
        let rb = artic.impulse_response(link, &b).expect("response");
        let rab = artic.impulse_response(link, &(a + b)).expect("response");
        prop_assert!(relative_eq!(rab, ra + rb, epsilon = 1e-9, max_relative = 1e-9));

        // Queries leave state alone and match applying the impulse.
        let applied = velocity_change(&artic, link, &(a + b));
        prop_assert!(relative_eq!(applied, rab, epsilon = 1e-9, max_relative = 1e-9));
    }

    /// The parent/child shortcut agrees with the common-ancestor walk.
    #[test]
    fn two_link_paths_agree(
        a in spatial_strategy(),
        b in spatial_strategy(),
        link0 in 0usize..7,
        link1 in 0usize..7,
    ) {
        let mut artic = Articulation::branched_tree(2, 3).expect("tree");
        artic.set_joint_positions(&[0.2, -0.3, 0.1, 0.4, 0.0, -0.2]).expect("positions");
        let fast = artic.impulse_response_pair(link0, &a, link1, &b).expect("pair");
        let slow = artic.impulse_response_pair_general(link0, &a, link1, &b).expect("pair");
        prop_assert!(relative_eq!(fast.0, slow.0, epsilon = 1e-9, max_relative = 1e-9));
        prop_assert!(relative_eq!(fast.1, slow.1, epsilon = 1e-9, max_relative = 1e-9));
    }
}

/// Test: each link's response matrix is `J M⁻¹ Jᵀ`.
#[test]
fn response_matches_mass_matrix_form() {
    let mut artic = bent_chain();
    let mut cache = artic.create_cache();
    artic.compute_mass_matrix(&mut cache).expect("mass matrix");
    let m_inv = cache.mass_matrix.clone().try_inverse().expect("invertible");

    for link in 0..artic.link_count() {
        let jac = artic.link_jacobian(link).expect("jacobian");
        let expected: DMatrix<f64> = &jac * &m_inv * jac.transpose();
        let response = artic.response_matrix(link).expect("response");
        for r in 0..6 {
            for c in 0..6 {
                assert_relative_eq!(
                    response[(r, c)],
                    expected[(r, c)],
                    epsilon = 1e-6,
                    max_relative = 1e-7
                );
            }
        }
    }
}

/// Test: the response matrix is symmetric and a fixed base never moves.
#[test]
fn response_is_symmetric_and_base_is_rigid() {
    let mut artic = Articulation::branched_tree(3, 2).expect("tree");
    for link in 0..artic.link_count() {
        let r = artic.response_matrix(link).expect("response");
        assert_relative_eq!(r, r.transpose(), epsilon = 1e-8, max_relative = 1e-9);
    }
    let base = artic.response_matrix(0).expect("response");
    assert_relative_eq!(base.norm(), 0.0);
}

/// Test: repeated queries return identical results.
#[test]
fn response_queries_are_repeatable() {
    let mut artic = bent_chain();
    let impulse = SpatialVector::new(0.1, -0.2, 0.3, 1.0, 0.0, -0.5);
    let first = artic.impulse_response(3, &impulse).expect("response");
    let second = artic.impulse_response(3, &impulse).expect("response");
    assert_eq!(first, second);
    assert!(artic.impulse_response(9, &impulse).is_err());
}

/// Test: a small, light link on a ball joint at its centre responds to a
/// torque impulse with `τ / I` and raises no degenerate-inertia warning.
#[test]
fn small_ball_link_responds_to_torque() {
    let mut artic =
        Articulation::new(ArticulationConfig::fixed_base(), LinkDesc::sphere(1.0, 0.1)).expect("root");
    let joint = JointDesc::spherical().with_anchor(Vector3::new(0.0, 0.0, -0.2), Vector3::zeros());
    let link = artic.add_link(0, LinkDesc::sphere(0.1, 0.04), joint).expect("link");
    let inertia = 0.4 * 0.1 * 0.04 * 0.04;

    let impulse = SpatialVector::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0);
    let response = artic.impulse_response(link, &impulse).expect("response");
    let expected = SpatialVector::new(1e-3 / inertia, 0.0, 0.0, 0.0, 0.0, 0.0);
    assert_relative_eq!(response, expected, epsilon = 1e-9, max_relative = 1e-9);

    for _ in 0..10 {
        artic.step(1.0 / 60.0).expect("step");
    }
    assert_eq!(artic.warnings().count(Warning::DegenerateJointInertia), 0);
}

/// Test: each coefficient-matrix column is the row velocities a unit impulse
/// along one row produces.
#[test]
fn coefficient_matrix_matches_applied_impulses() {
    let mut artic = bent_chain();
    let rows = [
        ExternalConstraint::contact(3, Vector3::new(0.0, 0.0, -0.2), Vector3::z(), 0.0, 1.0 / 60.0),
        ExternalConstraint::contact(2, Vector3::new(0.05, 0.0, 0.1), Vector3::x(), 0.0, 1.0 / 60.0),
        ExternalConstraint::new(0, SpatialVector::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0)),
    ];
    let mut cache = artic.create_cache();
    artic.compute_coefficient_matrix(&rows, &mut cache).expect("coefficients");
    let a = &cache.coefficient_matrix;
    assert_eq!(a.shape(), (3, 3));
    assert_relative_eq!(a.clone(), a.transpose(), epsilon = 1e-9);

    for (c, pushed) in rows.iter().enumerate() {
        let mut kicked = artic.clone();
        let before = kicked.link_velocities().to_vec();
        let j = pushed.jacobian;
        kicked
            .apply_external_impulse(pushed.link, j.fixed_rows::<3>(0).into_owned(), j.fixed_rows::<3>(3).into_owned())
            .expect("impulse");
        for (r, row) in rows.iter().enumerate() {
            let dv = kicked.link_velocities()[row.link] - before[row.link];
            assert_relative_eq!(a[(r, c)], row.jacobian.dot(&dv), epsilon = 1e-8, max_relative = 1e-8);
        }
    }

    let stray = [ExternalConstraint::new(9, SpatialVector::zeros())];
    assert!(artic.compute_coefficient_matrix(&stray, &mut cache).is_err());
}
