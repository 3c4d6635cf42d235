//! Link Jacobians in generalized coordinates.
//!
//! Walks from a link to the root, transporting each ancestor joint's world
//! motion subspace to the link's centre of mass:
//!
//! | coordinate            | column                                   |
//! |-----------------------|------------------------------------------|
//! | joint DOF of link `j` | `transport(S_j[:, k], x_i − x_j)`        |
//! | floating root `k`     | `transport(e_k, x_i − x_0)`              |
//!
//! Rows are `[ω; v]` of the link's centre of mass.

use nalgebra::{DMatrix, Vector3};
use sim_articulation_types::{ArticulationError, Result};

use crate::spatial::{SpatialVector, transport_motion};
use crate::types::Articulation;

impl Articulation {
    /// 6×`coordinate_count` Jacobian of link `i`'s centre-of-mass velocity.
    ///
    /// Uses the motion subspaces of the last jcalc.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn link_jacobian(&self, i: usize) -> Result<DMatrix<f64>> {
        if i >= self.links.len() {
            return Err(ArticulationError::LinkOutOfRange {
                index: i,
                count: self.links.len(),
            });
        }
        let mut jac = DMatrix::zeros(6, self.coordinate_count());
        self.fill_link_jacobian(i, &mut jac, 0);
        Ok(jac)
    }

    /// Write link `i`'s Jacobian into rows `row..row + 6` of `out`.
    pub(crate) fn fill_link_jacobian(&self, i: usize, out: &mut DMatrix<f64>, row: usize) {
        let x_i = self.links[i].pose.translation.vector;
        let root_cols = self.root_coordinates();

        let mut j = i;
        while j != 0 {
            if let Some(joint) = self.links[j].joint.as_ref() {
                let d: Vector3<f64> = x_i - self.links[j].pose.translation.vector;
                for k in 0..joint.core.dof {
                    let s: SpatialVector = self.data.motion_matrix[j].column(k).into_owned();
                    let col = transport_motion(&s, &d);
                    out.fixed_view_mut::<6, 1>(row, root_cols + joint.core.offset + k)
                        .copy_from(&col);
                }
            }
            j = self.topology.parent_of(j);
        }

        if root_cols == 6 {
            let d = x_i - self.links[0].pose.translation.vector;
            for k in 0..6 {
                let col = transport_motion(&SpatialVector::ith(k, 1.0), &d);
                out.fixed_view_mut::<6, 1>(row, k).copy_from(&col);
            }
        }
    }

    /// Stack every link's Jacobian into a `6·links × coordinate_count`
    /// matrix.
    pub(crate) fn fill_dense_jacobian(&self, out: &mut DMatrix<f64>) {
        out.fill(0.0);
        for i in 0..self.links.len() {
            self.fill_link_jacobian(i, out, 6 * i);
        }
    }
}
