//! Impulse response: how link velocities change when impulses are applied.
//!
//! Impulses travel as `Z = −impulse`. Going up a joint, the part of `Z` the
//! joint can absorb with its own motion is removed (`propagate_impulse_up`);
//! coming down, the parent's velocity change is transported to the child and
//! the joint's reaction is added (`propagate_velocity_down`).
//!
//! The per-link response matrix maps a unit impulse on a link to that link's
//! velocity change, with every other link free to react. It is built
//! root-to-leaf once per forward pass and makes single-link queries a 6×6
//! product.

use nalgebra::Vector3;
use sim_articulation_types::{ArticulationError, MAX_LINKS, Result};

use crate::spatial::{SpatialMatrix, SpatialVector, transport_force, transport_motion};
use crate::topology::Topology;
use crate::types::{Articulation, ArticulationData};

/// Carry `Z` from link `i` to its parent, removing what joint `i` absorbs.
#[allow(clippy::inline_always)]
#[inline(always)]
#[must_use]
pub fn propagate_impulse_up(data: &ArticulationData, i: usize, z: &SpatialVector) -> SpatialVector {
    let st_z = data.motion_matrix[i].transpose() * z;
    let reduced = z - data.is_inv_d[i] * st_z;
    transport_force(&reduced, &(-data.rw[i]))
}

/// Velocity change of link `i` given its parent's velocity change and the
/// `Z` applied to link `i`'s subtree. Also returns the joint's velocity
/// change (zero past the joint's DOF count).
#[allow(clippy::inline_always)]
#[inline(always)]
#[must_use]
pub fn propagate_velocity_down(
    data: &ArticulationData,
    i: usize,
    z: &SpatialVector,
    parent_dv: &SpatialVector,
) -> (SpatialVector, Vector3<f64>) {
    let p_dv = transport_motion(parent_dv, &data.rw[i]);
    let s = &data.motion_matrix[i];
    let rhs = -(s.transpose() * z) - data.is[i].transpose() * p_dv;
    let joint_dv = data.inv_st_is[i] * rhs;
    (p_dv + s * joint_dv, joint_dv)
}

/// Build every link's response matrix root-to-leaf.
pub(crate) fn build_response_matrices(topology: &Topology, data: &mut ArticulationData, fix_base: bool) {
    data.response[0] = if fix_base {
        SpatialMatrix::zeros()
    } else {
        data.base_inv_inertia
    };
    for i in 1..topology.len() {
        let p = topology.parent_of(i);
        let mut response = SpatialMatrix::zeros();
        for k in 0..6 {
            let z = -SpatialVector::ith(k, 1.0);
            let zp = propagate_impulse_up(data, i, &z);
            let dv_p = data.response[p] * (-zp);
            let (column, _) = propagate_velocity_down(data, i, &z, &dv_p);
            response.set_column(k, &column);
        }
        data.response[i] = response;
    }
}

/// Velocity changes of two links under simultaneous impulses.
///
/// Uses the parent/child shortcut when one link is the other's parent and
/// walks to the common ancestor otherwise.
#[must_use]
pub fn two_link_response(
    topology: &Topology,
    data: &ArticulationData,
    link0: usize,
    imp0: &SpatialVector,
    link1: usize,
    imp1: &SpatialVector,
) -> (SpatialVector, SpatialVector) {
    if link0 != link1 && topology.parent(link1) == Some(link0) {
        parent_child_response(data, link0, imp0, link1, imp1)
    } else if link0 != link1 && topology.parent(link0) == Some(link1) {
        let (dv1, dv0) = parent_child_response(data, link1, imp1, link0, imp0);
        (dv0, dv1)
    } else {
        general_two_link_response(topology, data, link0, imp0, link1, imp1)
    }
}

/// Two-link response when `parent` is the direct parent of `child`.
#[must_use]
pub fn parent_child_response(
    data: &ArticulationData,
    parent: usize,
    imp_parent: &SpatialVector,
    child: usize,
    imp_child: &SpatialVector,
) -> (SpatialVector, SpatialVector) {
    let z1 = -imp_child;
    let z0_from_child = propagate_impulse_up(data, child, &z1);
    let dv0 = data.response[parent] * (imp_parent - z0_from_child);
    let (dv1, _) = propagate_velocity_down(data, child, &z1, &dv0);
    (dv0, dv1)
}

/// Two-link response through the common ancestor, for any pair of links.
#[must_use]
pub fn general_two_link_response(
    topology: &Topology,
    data: &ArticulationData,
    link0: usize,
    imp0: &SpatialVector,
    link1: usize,
    imp1: &SpatialVector,
) -> (SpatialVector, SpatialVector) {
    if link0 == link1 {
        let dv = data.response[link0] * (imp0 + imp1);
        return (dv, dv);
    }

    let Some(common) = topology.common_ancestor(link0, link1) else {
        return (SpatialVector::zeros(), SpatialVector::zeros());
    };
    let mut branch0 = Branch::new();
    let z_common0 = branch0.climb(topology, data, link0, -imp0, common);
    let mut branch1 = Branch::new();
    let z_common1 = branch1.climb(topology, data, link1, -imp1, common);

    let dv_common = data.response[common] * (-(z_common0 + z_common1));
    (
        branch0.descend(data, dv_common),
        branch1.descend(data, dv_common),
    )
}

/// Links and `Z` values along one path from a link up to an ancestor.
struct Branch {
    links: [usize; MAX_LINKS],
    z: [SpatialVector; MAX_LINKS],
    len: usize,
}

impl Branch {
    fn new() -> Self {
        Self {
            links: [0; MAX_LINKS],
            z: [SpatialVector::zeros(); MAX_LINKS],
            len: 0,
        }
    }

    /// Walk from `link` up to `ancestor`, returning `Z` arriving there.
    fn climb(
        &mut self,
        topology: &Topology,
        data: &ArticulationData,
        mut link: usize,
        mut z: SpatialVector,
        ancestor: usize,
    ) -> SpatialVector {
        while link != ancestor {
            self.links[self.len] = link;
            self.z[self.len] = z;
            self.len += 1;
            z = propagate_impulse_up(data, link, &z);
            link = topology.parent_of(link);
        }
        z
    }

    /// Carry the ancestor's velocity change back down the branch.
    fn descend(&self, data: &ArticulationData, ancestor_dv: SpatialVector) -> SpatialVector {
        let mut dv = ancestor_dv;
        for k in (0..self.len).rev() {
            dv = propagate_velocity_down(data, self.links[k], &self.z[k], &dv).0;
        }
        dv
    }
}

impl Articulation {
    /// Rebuild inertia and response caches if poses changed since the last
    /// forward pass.
    pub fn update_response_caches(&mut self) {
        if !self.data.caches_valid {
            self.jcalc(false);
            self.update_inertia_caches();
        }
    }

    fn check_query_link(&self, i: usize) -> Result<()> {
        if i < self.links.len() {
            Ok(())
        } else {
            Err(ArticulationError::LinkOutOfRange {
                index: i,
                count: self.links.len(),
            })
        }
    }

    /// Response matrix of link `i`: its velocity change per unit impulse.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn response_matrix(&mut self, i: usize) -> Result<SpatialMatrix> {
        self.check_query_link(i)?;
        self.update_response_caches();
        Ok(self.data.response[i])
    }

    /// Velocity change of link `i` under `impulse` applied at its centre of
    /// mass. State is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn impulse_response(&mut self, i: usize, impulse: &SpatialVector) -> Result<SpatialVector> {
        self.check_query_link(i)?;
        self.update_response_caches();
        Ok(self.data.response[i] * impulse)
    }

    /// Velocity changes of two links under simultaneous impulses. State is
    /// not modified.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn impulse_response_pair(
        &mut self,
        link0: usize,
        imp0: &SpatialVector,
        link1: usize,
        imp1: &SpatialVector,
    ) -> Result<(SpatialVector, SpatialVector)> {
        self.check_query_link(link0)?;
        self.check_query_link(link1)?;
        self.update_response_caches();
        Ok(two_link_response(&self.topology, &self.data, link0, imp0, link1, imp1))
    }

    /// [`Articulation::impulse_response_pair`] always taking the
    /// common-ancestor path.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn impulse_response_pair_general(
        &mut self,
        link0: usize,
        imp0: &SpatialVector,
        link1: usize,
        imp1: &SpatialVector,
    ) -> Result<(SpatialVector, SpatialVector)> {
        self.check_query_link(link0)?;
        self.check_query_link(link1)?;
        self.update_response_caches();
        Ok(general_two_link_response(&self.topology, &self.data, link0, imp0, link1, imp1))
    }

    /// Apply one impulse per link (at each centre of mass) and fold the
    /// result into link and joint velocities.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] unless there is one
    /// impulse per link.
    pub fn apply_impulses(&mut self, impulses: &[SpatialVector]) -> Result<()> {
        let n = self.links.len();
        if impulses.len() != n {
            return Err(ArticulationError::size_mismatch("impulses", n, impulses.len()));
        }
        self.update_response_caches();

        let z = &mut self.scratch.z;
        for (zi, imp) in z.iter_mut().zip(impulses) {
            *zi = -imp;
        }
        for i in (1..n).rev() {
            let p = self.topology.parent_of(i);
            let up = propagate_impulse_up(&self.data, i, &z[i]);
            z[p] += up;
        }

        let dv = &mut self.scratch.link_delta_v;
        dv[0] = if self.config.fix_base {
            SpatialVector::zeros()
        } else {
            self.data.base_inv_inertia * (-z[0])
        };
        self.data.motion_velocity[0] += dv[0];
        for i in 1..n {
            let p = self.topology.parent_of(i);
            let (link_dv, joint_dv) = propagate_velocity_down(&self.data, i, &z[i], &dv[p]);
            dv[i] = link_dv;
            self.data.motion_velocity[i] += link_dv;
            if let Some(joint) = self.links[i].joint.as_ref() {
                for k in 0..joint.core.dof {
                    self.data.joint_velocity[joint.core.offset + k] += joint_dv[k];
                }
            }
        }
        Ok(())
    }

    /// Apply a single impulse and torque impulse at link `i`'s centre of
    /// mass.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn apply_external_impulse(
        &mut self,
        i: usize,
        angular: Vector3<f64>,
        linear: Vector3<f64>,
    ) -> Result<()> {
        self.check_query_link(i)?;
        let mut impulses = std::mem::take(&mut self.scratch.impulses);
        impulses.iter_mut().for_each(|imp| *imp = SpatialVector::zeros());
        impulses[i] = crate::spatial::spatial(&angular, &linear);
        let result = self.apply_impulses(&impulses);
        self.scratch.impulses = impulses;
        result
    }
}
