//! Spatial algebra for 6D motion and force vectors.
//!
//! Every spatial quantity is expressed in world axes about a reference
//! point (in the solver that point is a link's centre of mass). Both motion
//! and force vectors are laid out `[angular; linear]`, so the power of a
//! force on a motion is a plain dot product. Functions here are pure math
//! with no articulation state.
//!
//! Moving the reference point never rotates anything:
//!
//! ```text
//! transport_motion((ω, v), d) = (ω, v + ω × d)
//! transport_force((τ, f), d)  = (τ − d × f, f)
//! transport_inertia(I, d)     = Xᵀ I X,   X = [[1, 0], [[d]×, 1]]
//! ```
//!
//! where `d` is the new reference point minus the old one.

use nalgebra::{Cholesky, Matrix3, Matrix6, Matrix6x3, Vector3, Vector6};

/// 6D spatial vector: `[angular (3), linear (3)]`.
pub type SpatialVector = Vector6<f64>;

/// 6×6 spatial matrix (inertia or response).
pub type SpatialMatrix = Matrix6<f64>;

/// Motion subspace of one joint: up to three spatial columns, unused
/// columns are zero.
pub type MotionMatrix = Matrix6x3<f64>;

/// Angular part of a spatial vector.
#[allow(clippy::inline_always)] // Hot path in every sweep
#[inline(always)]
#[must_use]
pub fn angular(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// Linear part of a spatial vector.
#[allow(clippy::inline_always)] // Hot path in every sweep
#[inline(always)]
#[must_use]
pub fn linear(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[3], v[4], v[5])
}

/// Assemble a spatial vector from its angular and linear parts.
#[allow(clippy::inline_always)] // Hot path in every sweep
#[inline(always)]
#[must_use]
pub fn spatial(angular: &Vector3<f64>, linear: &Vector3<f64>) -> SpatialVector {
    SpatialVector::new(
        angular.x, angular.y, angular.z, linear.x, linear.y, linear.z,
    )
}

/// Skew-symmetric cross-product matrix `[v]×`.
#[must_use]
pub fn cross_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Move the reference point of a motion vector by `d`.
#[allow(clippy::inline_always)] // Hot path in every sweep
#[inline(always)]
#[must_use]
pub fn transport_motion(m: &SpatialVector, d: &Vector3<f64>) -> SpatialVector {
    let w = angular(m);
    spatial(&w, &(linear(m) + w.cross(d)))
}

/// Move the reference point of a force vector by `d`.
#[allow(clippy::inline_always)] // Hot path in every sweep
#[inline(always)]
#[must_use]
pub fn transport_force(f: &SpatialVector, d: &Vector3<f64>) -> SpatialVector {
    let force = linear(f);
    spatial(&(angular(f) - d.cross(&force)), &force)
}

/// Move the reference point of a spatial inertia by `d` (`Xᵀ I X`).
///
/// The linear-linear block is untouched, so mass is preserved exactly.
#[must_use]
pub fn transport_inertia(inertia: &SpatialMatrix, d: &Vector3<f64>) -> SpatialMatrix {
    let s = cross_matrix(d);
    let st = s.transpose();
    let a = inertia.fixed_view::<3, 3>(0, 0);
    let b = inertia.fixed_view::<3, 3>(0, 3);
    let c = inertia.fixed_view::<3, 3>(3, 0);
    let dd = inertia.fixed_view::<3, 3>(3, 3);

    let bottom_left = c + dd * s;
    let top_left = a + b * s + st * bottom_left;
    let top_right = b + st * dd;

    let mut out = SpatialMatrix::zeros();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&top_left);
    out.fixed_view_mut::<3, 3>(0, 3).copy_from(&top_right);
    out.fixed_view_mut::<3, 3>(3, 0).copy_from(&bottom_left);
    out.fixed_view_mut::<3, 3>(3, 3).copy_from(&dd);
    out
}

/// Spatial inertia of a rigid body about its centre of mass, in world axes.
///
/// `rotation` maps the principal frame to world.
///
/// ```text
/// I = [R diag(i) Rᵀ   0  ]
///     [    0        m·1₃ ]
/// ```
#[must_use]
pub fn rigid_inertia(mass: f64, principal: &Vector3<f64>, rotation: &Matrix3<f64>) -> SpatialMatrix {
    let rotational = rotation * Matrix3::from_diagonal(principal) * rotation.transpose();
    let mut out = SpatialMatrix::zeros();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotational);
    out.fixed_view_mut::<3, 3>(3, 3)
        .copy_from(&(Matrix3::identity() * mass));
    out
}

/// `½(M + Mᵀ)`.
#[must_use]
pub fn symmetrize(m: &SpatialMatrix) -> SpatialMatrix {
    (m + m.transpose()) * 0.5
}

/// Inverse of a symmetric positive-definite spatial inertia.
///
/// Returns `None` when the matrix is not positive definite.
#[must_use]
pub fn invert_inertia(inertia: &SpatialMatrix) -> Option<SpatialMatrix> {
    Cholesky::new(symmetrize(inertia)).map(|c| symmetrize(&c.inverse()))
}

/// `I − (Is·D⁻¹)·Isᵀ`: the inertia a joint passes on to its parent.
#[must_use]
pub fn subtract_outer(
    inertia: &SpatialMatrix,
    is_inv_d: &MotionMatrix,
    is: &MotionMatrix,
) -> SpatialMatrix {
    inertia - is_inv_d * is.transpose()
}

/// Fraction of a diagonal entry that must survive elimination for a joint
/// block pivot to be accepted. Scale-free, so tiny links invert as well as
/// heavy ones.
pub const JOINT_PIVOT_TOLERANCE: f64 = 1e-10;

/// Invert the leading `dof × dof` block of a joint-space inertia `SᵀIS`.
///
/// The block is factored with Cholesky; a pivot whose square falls below
/// [`JOINT_PIVOT_TOLERANCE`] times its diagonal entry marks the block as
/// singular. Entries outside the block are zero in the result. Returns
/// `None` when the block is singular or not positive definite.
#[must_use]
pub fn invert_joint_block(st_is: &Matrix3<f64>, dof: usize) -> Option<Matrix3<f64>> {
    let mut out = Matrix3::zeros();
    match dof {
        0 => {}
        1 => {
            let d = st_is[(0, 0)];
            if !(d > 0.0 && d.is_finite()) {
                return None;
            }
            out[(0, 0)] = 1.0 / d;
        }
        2 => {
            let block = st_is.fixed_view::<2, 2>(0, 0).into_owned();
            let block = (block + block.transpose()) * 0.5;
            let chol = Cholesky::new(block)?;
            let l = chol.l();
            if !pivots_survive(&[block[(0, 0)], block[(1, 1)]], &[l[(0, 0)], l[(1, 1)]]) {
                return None;
            }
            out.fixed_view_mut::<2, 2>(0, 0).copy_from(&chol.inverse());
        }
        _ => {
            let block = (st_is + st_is.transpose()) * 0.5;
            let chol = Cholesky::new(block)?;
            let l = chol.l();
            let diag = [block[(0, 0)], block[(1, 1)], block[(2, 2)]];
            if !pivots_survive(&diag, &[l[(0, 0)], l[(1, 1)], l[(2, 2)]]) {
                return None;
            }
            out = chol.inverse();
        }
    }
    Some(out)
}

fn pivots_survive(diag: &[f64], pivots: &[f64]) -> bool {
    diag.iter()
        .zip(pivots)
        .all(|(&d, &l)| d > 0.0 && l * l > JOINT_PIVOT_TOLERANCE * d)
}

/// Pack the `dof` joint scalars starting at `offset` into a zero-padded 3-vector.
#[allow(clippy::inline_always)] // Hot path in every sweep
#[inline(always)]
#[must_use]
pub fn joint_vector(values: &[f64], offset: usize, dof: usize) -> Vector3<f64> {
    let mut out = Vector3::zeros();
    for k in 0..dof {
        out[k] = values[offset + k];
    }
    out
}
