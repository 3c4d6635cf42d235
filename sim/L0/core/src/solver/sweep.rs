//! Root-to-leaf Gauss-Seidel sweep over every row in the tree.
//!
//! Each link sees its parent's velocity change so far, solves its own rows,
//! recurses into its children and hands its accumulated `Z` back up. Link
//! velocities stay untouched; the sweep only grows `deferred_z`, which
//! [`flush_velocities`] later folds in.

use crate::response::{propagate_impulse_up, propagate_velocity_down};
use crate::spatial::{SpatialMatrix, SpatialVector};
use crate::topology::Topology;
use crate::types::{Articulation, ArticulationData, Link};

use super::{ExternalConstraint, InternalConstraint, LinkRows, LockedAxisConstraint};

struct Sweep<'a> {
    topology: &'a Topology,
    links: &'a [Link],
    data: &'a ArticulationData,
    rows: &'a [LinkRows],
    internal: &'a mut [InternalConstraint],
    locks: &'a [LockedAxisConstraint],
    external: &'a mut [ExternalConstraint],
    impulses: &'a mut [SpatialVector],
    dt: f64,
    elapsed: f64,
    velocity_iteration: bool,
}

impl Sweep<'_> {
    fn root(&mut self, inv_inertia: &SpatialMatrix, fix_base: bool) {
        let mut root_dv = if fix_base {
            SpatialVector::zeros()
        } else {
            inv_inertia * (-self.data.deferred_z[0])
        };
        let mut root_v = self.data.motion_velocity[0] + root_dv;
        let mut z = SpatialVector::zeros();

        let (start, end) = self.rows[0].external;
        for row in &mut self.external[start..end] {
            row.solve(&mut root_v, &mut root_dv, &mut z, self.velocity_iteration);
        }

        let topology = self.topology;
        for &c in topology.children(0) {
            let child_z = self.link(c, &root_dv);
            z += child_z;
            if !fix_base {
                root_dv += inv_inertia * (-child_z);
            }
        }
        self.impulses[0] = z;
    }

    /// Solve link `i`'s subtree and return the `Z` it passes to its parent.
    fn link(&mut self, i: usize, parent_dv: &SpatialVector) -> SpatialVector {
        let (data, topology) = (self.data, self.topology);
        let p = topology.parent_of(i);
        let mut parent_v = data.motion_velocity[p] + parent_dv;
        let (mut dv, _) = propagate_velocity_down(data, i, &data.deferred_z[i], parent_dv);
        let mut child_v = data.motion_velocity[i] + dv;

        // Z on the parent (i0) and on this link's subtree (i1).
        let mut i0 = SpatialVector::zeros();
        let mut i1 = SpatialVector::zeros();

        if let Some(joint) = self.links[i].joint.as_ref() {
            let max_joint_velocity = joint.desc.max_joint_velocity;
            let (start, end) = self.rows[i].internal;
            for row in &mut self.internal[start..end] {
                if row.recip_response == 0.0 {
                    continue;
                }
                let q = data.joint_position[joint.core.offset + row.slot];
                let impulse = row.solve(
                    q,
                    &parent_v,
                    &child_v,
                    self.dt,
                    self.elapsed,
                    max_joint_velocity,
                    self.velocity_iteration,
                );
                if impulse != 0.0 {
                    parent_v += row.delta_va * impulse;
                    child_v += row.delta_vb * impulse;
                    dv += row.delta_vb * impulse;
                    i0 += row.row0 * impulse;
                    i1 -= row.row1 * impulse;
                }
            }

            let relative_motion = data.delta_motion[i] - data.delta_motion[p];
            let (start, end) = self.rows[i].locks;
            for lock in &self.locks[start..end] {
                if lock.recip_response == 0.0 {
                    continue;
                }
                let delta_p = lock.axis.dot(&relative_motion);
                let impulse = lock.solve(
                    &parent_v,
                    &child_v,
                    delta_p,
                    max_joint_velocity,
                    self.velocity_iteration,
                );
                if impulse != 0.0 {
                    parent_v += lock.delta_va * impulse;
                    child_v += lock.delta_vb * impulse;
                    dv += lock.delta_vb * impulse;
                    i0 += lock.axis * impulse;
                    i1 -= lock.axis * impulse;
                }
            }
        }

        let (start, end) = self.rows[i].external;
        for row in &mut self.external[start..end] {
            row.solve(&mut child_v, &mut dv, &mut i1, self.velocity_iteration);
        }

        let children = topology.children(i);
        for (n, &c) in children.iter().enumerate() {
            let child_z = self.link(c, &dv);
            i1 += child_z;
            if n + 1 < children.len() {
                dv += data.response[i] * (-child_z);
            }
        }

        self.impulses[i] = i1;
        i0 + propagate_impulse_up(data, i, &i1)
    }
}

/// One solver sweep over every link. `elapsed` is the time already covered
/// by earlier sub-steps of this step and shifts drive targets along their
/// target velocity.
pub(crate) fn solve(artic: &mut Articulation, dt: f64, velocity_iteration: bool, elapsed: f64) {
    let Articulation {
        config,
        topology,
        links,
        data,
        constraints,
        scratch,
        ..
    } = artic;
    let n = links.len();
    scratch.ensure(n, data.dof_count());
    let inv_inertia = data.base_inv_inertia;

    let mut sweep = Sweep {
        topology: &*topology,
        links: links.as_slice(),
        data: &*data,
        rows: &constraints.rows,
        internal: &mut constraints.internal,
        locks: &constraints.locks,
        external: &mut constraints.external,
        impulses: &mut scratch.impulses[..n],
        dt,
        elapsed,
        velocity_iteration,
    };
    sweep.root(&inv_inertia, config.fix_base);

    for (z, imp) in data.deferred_z.iter_mut().zip(&scratch.impulses) {
        *z += imp;
    }
}

/// Fold every deferred impulse into link and joint velocities and clear the
/// deferred state.
pub(crate) fn flush_velocities(artic: &mut Articulation) {
    let Articulation {
        config,
        topology,
        links,
        data,
        scratch,
        ..
    } = artic;
    let n = links.len();
    scratch.ensure(n, data.dof_count());
    let dv = &mut scratch.link_delta_v;
    let joint_dv = &mut scratch.joint_delta_v;
    joint_dv.iter_mut().for_each(|d| *d = 0.0);

    dv[0] = if config.fix_base {
        SpatialVector::zeros()
    } else {
        data.base_inv_inertia * (-data.deferred_z[0])
    };
    for i in 1..n {
        let p = topology.parent_of(i);
        let (link_dv, jdv) = propagate_velocity_down(data, i, &data.deferred_z[i], &dv[p]);
        dv[i] = link_dv;
        if let Some(joint) = links[i].joint.as_ref() {
            for k in 0..joint.core.dof {
                joint_dv[joint.core.offset + k] = jdv[k];
            }
        }
    }

    for (v, d) in data.motion_velocity.iter_mut().zip(dv.iter()) {
        *v += d;
    }
    for (qd, d) in data.joint_velocity.iter_mut().zip(joint_dv.iter()) {
        *qd += d;
    }
    data.deferred_z.iter_mut().for_each(|z| *z = SpatialVector::zeros());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::solver::internal::setup;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use sim_articulation_types::{JointAxis, JointDrive};

    #[test]
    fn test_flush_matches_direct_application() {
        let mut a = Articulation::floating_chain(4, 0.3).unwrap();
        a.forward_dynamics(1e-3).unwrap();
        let mut b = a.clone();

        let imp = SpatialVector::new(0.1, -0.2, 0.05, 1.0, 0.0, -0.5);
        a.apply_external_impulse(2, Vector3::new(0.1, -0.2, 0.05), Vector3::new(1.0, 0.0, -0.5))
            .unwrap();

        // Deferred: Z accumulated up the path, then flushed.
        let mut z = -imp;
        let mut i = 2;
        loop {
            b.data.deferred_z[i] += z;
            let Some(p) = b.topology.parent(i) else { break };
            z = propagate_impulse_up(&b.data, i, &z);
            i = p;
        }
        flush_velocities(&mut b);

        for (va, vb) in a.link_velocities().iter().zip(b.link_velocities()) {
            assert_relative_eq!(va, vb, epsilon = 1e-10);
        }
        for (qa, qb) in a.joint_velocities().iter().zip(b.joint_velocities().iter()) {
            assert_relative_eq!(qa, qb, epsilon = 1e-10);
        }
        assert!(b.data.deferred_z.iter().all(|z| *z == SpatialVector::zeros()));
    }

    #[test]
    fn test_velocity_drive_reaches_target_in_one_row() {
        let mut artic = Articulation::n_link_pendulum(1, 0.5, 1.0).unwrap();
        artic
            .set_joint_drive(1, JointAxis::Swing1, JointDrive::velocity(1e6))
            .unwrap();
        artic.set_drive_target(1, JointAxis::Swing1, 0.0, 2.0).unwrap();
        artic.forward_dynamics(1e-3).unwrap();
        setup(&mut artic, 1e-3, 1e-3, false);
        solve(&mut artic, 1e-3, false, 0.0);
        flush_velocities(&mut artic);
        assert_relative_eq!(artic.joint_velocities()[0], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_no_rows_leaves_velocities_alone() {
        let mut artic = Articulation::n_link_pendulum(3, 0.5, 1.0).unwrap();
        artic.set_joint_velocities(&[0.3, -0.1, 0.2]).unwrap();
        artic.forward_dynamics(1e-3).unwrap();
        let before = artic.joint_velocities().clone();
        setup(&mut artic, 1e-3, 1e-3, false);
        solve(&mut artic, 1e-3, false, 0.0);
        flush_velocities(&mut artic);
        assert_eq!(artic.joint_velocities(), &before);
    }
}
