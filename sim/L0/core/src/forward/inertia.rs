//! Inertia stage: articulated-body inertias, the floating-base inverse and
//! the per-link response matrices.
//!
//! Articulated inertias depend only on poses, so this stage is shared by the
//! forward pass and by impulse queries made outside a step.

use crate::response::build_response_matrices;
use crate::spatial::{
    SpatialMatrix, invert_inertia, invert_joint_block, subtract_outer, symmetrize,
    transport_inertia,
};
use crate::types::{Articulation, Warning};
use nalgebra::Matrix3;

/// Bottom-up articulated inertia with per-joint `Is`, `(SᵀIS)⁻¹` and
/// `Is·(SᵀIS)⁻¹`:
///
/// ```text
/// I_A[p] += transport(I_A[i] − Is·D⁻¹·Isᵀ, x_p − x_i)
/// ```
pub(crate) fn fwd_inertia(artic: &mut Articulation) {
    let Articulation {
        config,
        topology,
        links,
        data,
        warnings,
        ..
    } = artic;

    for (i, link) in links.iter().enumerate() {
        data.spatial_inertia[i] = link.spatial_inertia();
        data.articulated_inertia[i] = data.spatial_inertia[i];
    }

    for i in (1..links.len()).rev() {
        let dof = links[i].joint.as_ref().map_or(0, |j| j.core.dof);
        let s = data.motion_matrix[i];
        let is = data.articulated_inertia[i] * s;
        let st_is = s.transpose() * is;
        let inv = invert_joint_block(&st_is, dof).unwrap_or_else(|| {
            warnings.record_at(Warning::DegenerateJointInertia, i);
            Matrix3::zeros()
        });
        let is_inv_d = is * inv;
        data.is[i] = is;
        data.inv_st_is[i] = inv;
        data.is_inv_d[i] = is_inv_d;

        let passed_on = subtract_outer(&data.articulated_inertia[i], &is_inv_d, &is);
        let p = topology.parent_of(i);
        let composed = data.articulated_inertia[p] + transport_inertia(&passed_on, &(-data.rw[i]));
        data.articulated_inertia[p] = symmetrize(&composed);
    }

    data.base_inv_inertia = if config.fix_base {
        SpatialMatrix::zeros()
    } else {
        invert_inertia(&data.articulated_inertia[0]).unwrap_or_else(|| {
            warnings.record_at(Warning::SingularBaseInertia, links.len());
            SpatialMatrix::zeros()
        })
    };

    build_response_matrices(topology, data, config.fix_base);
    data.caches_valid = true;
}

impl Articulation {
    /// Rebuild inertia-dependent caches at the current poses.
    pub(crate) fn update_inertia_caches(&mut self) {
        fwd_inertia(self);
    }
}
