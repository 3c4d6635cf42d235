//! The articulation aggregate: topology, links, joint state and caches.
//!
//! Links are stored in index order with every parent before its children,
//! so a plain forward loop is a root-to-leaf pass and a reverse loop is a
//! leaf-to-root pass. The joint of link `i` is stored on link `i`.

use std::sync::Arc;

use nalgebra::{DVector, Isometry3, Matrix3, Vector3};
use sim_articulation_types::{
    ArticulationConfig, ArticulationError, JointAxis, JointDesc, JointDrive, LinkDesc, Motion,
    Result,
};
use tracing::debug;

use super::data::ArticulationData;
use super::joint::Joint;
use super::link::Link;
use super::scratch::ScratchData;
use super::warning::WarningTable;
use crate::backend::{ArticulationSolver, SolverKind, create_solver};
use crate::jcalc::child_pose;
use crate::solver::{ConstraintSet, ExternalConstraint, InternalConstraint};
use crate::spatial::{SpatialVector, spatial};
use crate::topology::Topology;

/// A kinematic tree of rigid links advanced in reduced coordinates.
#[derive(Debug, Clone)]
pub struct Articulation {
    pub(crate) config: ArticulationConfig,
    pub(crate) topology: Topology,
    pub(crate) links: Vec<Link>,
    pub(crate) data: ArticulationData,
    pub(crate) constraints: ConstraintSet,
    pub(crate) scratch: ScratchData,
    pub(crate) warnings: WarningTable,
    pub(crate) solver: Arc<dyn ArticulationSolver>,
    pub(crate) dof_count: usize,
}

impl Articulation {
    /// Create an articulation holding only its root link.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the root's mass properties
    /// are invalid.
    pub fn new(config: ArticulationConfig, root: LinkDesc) -> Result<Self> {
        config.validate()?;
        root.validate()?;
        let pose = config.root_pose;
        let mut artic = Self {
            config,
            topology: Topology::new(),
            links: vec![Link::new(root, pose, None)],
            data: ArticulationData::new(1, 0),
            constraints: ConstraintSet::default(),
            scratch: ScratchData::default(),
            warnings: WarningTable::default(),
            solver: create_solver(SolverKind::default()),
            dof_count: 0,
        };
        artic.scratch.ensure(1, 0);
        artic.constraints.resize_links(1);
        Ok(artic)
    }

    /// Replace the solver backend.
    #[must_use]
    pub fn with_solver(mut self, kind: SolverKind) -> Self {
        self.solver = create_solver(kind);
        self
    }

    /// Backend that runs the solver phases.
    #[must_use]
    pub fn solver_kind(&self) -> SolverKind {
        self.solver.kind()
    }

    // ==================== Topology edits ====================

    /// Attach a new link below `parent`. Returns the new link's index.
    ///
    /// The child is placed by forward kinematics at zero joint positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist, the articulation is
    /// full, or either descriptor is invalid.
    pub fn add_link(&mut self, parent: usize, link: LinkDesc, joint: JointDesc) -> Result<usize> {
        link.validate()?;
        let index = self.links.len();
        joint.validate(index)?;
        self.topology.push(parent)?;

        let parent_pose = self.links[parent].pose;
        let joint = Joint::new(joint);
        let pose = child_pose(&parent_pose, &joint, &[0.0; 3]);
        self.links.push(Link::new(link, pose, Some(joint)));
        self.data.resize_links(self.links.len());
        self.constraints.resize_links(self.links.len());
        self.rebuild_joint_layout();
        self.update_kinematics();

        debug!(link = index, parent, dofs = self.dof_count, "added link");
        Ok(index)
    }

    /// Remove leaf link `i`. Later links shift down by one index.
    ///
    /// # Errors
    ///
    /// Returns an error for the root, an out-of-range index or a link with
    /// children.
    pub fn remove_link(&mut self, i: usize) -> Result<()> {
        self.topology.remove_leaf(i)?;
        self.links.remove(i);
        self.data.remove_link(i);
        self.constraints.clear();
        self.constraints.resize_links(self.links.len());
        self.rebuild_joint_layout();
        self.update_kinematics();
        debug!(link = i, links = self.links.len(), "removed link");
        Ok(())
    }

    // ==================== Accessors ====================

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &ArticulationConfig {
        &self.config
    }

    /// Mutable configuration; gravity, solver and integration settings take
    /// effect on the next step.
    ///
    /// # Errors
    ///
    /// Returns an error if the new configuration is invalid. The old
    /// configuration is kept in that case.
    pub fn set_config(&mut self, config: ArticulationConfig) -> Result<()> {
        config.validate()?;
        if config.fix_base != self.config.fix_base {
            self.data.motion_velocity[0] = SpatialVector::zeros();
            self.data.caches_valid = false;
        }
        self.config = config;
        Ok(())
    }

    /// Parent/child structure.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Number of links, root included.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Total DOFs from the last jcalc.
    #[must_use]
    pub fn dof_count(&self) -> usize {
        self.dof_count
    }

    /// All links in index order.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Link `i`.
    #[must_use]
    pub fn link(&self, i: usize) -> Option<&Link> {
        self.links.get(i)
    }

    /// Inbound joint of link `i`.
    #[must_use]
    pub fn joint(&self, i: usize) -> Option<&Joint> {
        self.links.get(i)?.joint.as_ref()
    }

    /// State and caches.
    #[must_use]
    pub fn data(&self) -> &ArticulationData {
        &self.data
    }

    /// Recorded numerical warnings.
    #[must_use]
    pub fn warnings(&self) -> &WarningTable {
        &self.warnings
    }

    /// Reset the warning counters.
    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }

    /// Joint positions, indexed by DOF.
    #[must_use]
    pub fn joint_positions(&self) -> &DVector<f64> {
        &self.data.joint_position
    }

    /// Joint velocities, indexed by DOF.
    #[must_use]
    pub fn joint_velocities(&self) -> &DVector<f64> {
        &self.data.joint_velocity
    }

    /// Joint accelerations of the last step.
    #[must_use]
    pub fn joint_accelerations(&self) -> &DVector<f64> {
        &self.data.joint_acceleration
    }

    /// Applied joint forces.
    #[must_use]
    pub fn joint_forces(&self) -> &DVector<f64> {
        &self.data.joint_force
    }

    /// Link velocities `[ω; v]` at the centres of mass.
    #[must_use]
    pub fn link_velocities(&self) -> &[SpatialVector] {
        &self.data.motion_velocity
    }

    /// Link accelerations of the last step or forward pass.
    #[must_use]
    pub fn link_accelerations(&self) -> &[SpatialVector] {
        &self.data.motion_acceleration
    }

    /// Spatial force each link's inbound joint transmitted in the last
    /// forward pass.
    #[must_use]
    pub fn transmitted_forces(&self) -> &[SpatialVector] {
        &self.data.transmitted_force
    }

    /// Joint motion integrated over the last step, after limit clamping.
    #[must_use]
    pub fn joint_delta_motion(&self) -> &DVector<f64> {
        &self.data.joint_delta_motion
    }

    /// Rotation vector and translation each link moved over the last step.
    #[must_use]
    pub fn link_delta_motion(&self) -> &[SpatialVector] {
        &self.data.delta_motion
    }

    /// Internal rows of the last setup.
    #[must_use]
    pub fn internal_constraints(&self) -> &[InternalConstraint] {
        &self.constraints.internal
    }

    /// External rows queued for the next step.
    #[must_use]
    pub fn pending_external_constraints(&self) -> &[ExternalConstraint] {
        &self.constraints.external
    }

    /// External rows of the last step with their applied impulses.
    #[must_use]
    pub fn solved_external_constraints(&self) -> &[ExternalConstraint] {
        &self.constraints.solved_external
    }

    // ==================== State setters ====================

    fn check_dof_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len == self.dof_count {
            Ok(())
        } else {
            Err(ArticulationError::size_mismatch(what, self.dof_count, len))
        }
    }

    fn check_link(&self, i: usize) -> Result<()> {
        if i < self.links.len() {
            Ok(())
        } else {
            Err(ArticulationError::LinkOutOfRange {
                index: i,
                count: self.links.len(),
            })
        }
    }

    fn joint_mut(&mut self, i: usize) -> Result<&mut Joint> {
        self.check_link(i)?;
        self.links[i]
            .joint
            .as_mut()
            .ok_or_else(|| ArticulationError::invalid_joint(i, "the root link has no joint"))
    }

    /// Set every joint position and re-pose the tree.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] if `q` is not one
    /// value per DOF.
    pub fn set_joint_positions(&mut self, q: &[f64]) -> Result<()> {
        self.jcalc(false);
        self.check_dof_len("joint positions", q.len())?;
        self.data.joint_position.copy_from_slice(q);
        self.update_kinematics();
        Ok(())
    }

    /// Set every joint velocity.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] on a length mismatch.
    pub fn set_joint_velocities(&mut self, qd: &[f64]) -> Result<()> {
        self.jcalc(false);
        self.check_dof_len("joint velocities", qd.len())?;
        self.data.joint_velocity.copy_from_slice(qd);
        Ok(())
    }

    /// Set every applied joint force; they persist until changed.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] on a length mismatch.
    pub fn set_joint_forces(&mut self, tau: &[f64]) -> Result<()> {
        self.jcalc(false);
        self.check_dof_len("joint forces", tau.len())?;
        self.data.joint_force.copy_from_slice(tau);
        Ok(())
    }

    /// Teleport the root and re-pose the tree from the joint positions.
    ///
    /// Accumulated sub-step motion is discarded.
    pub fn set_root_pose(&mut self, pose: Isometry3<f64>) {
        self.links[0].pose = pose;
        self.teleport_links();
    }

    /// Re-run forward kinematics from the root pose with zeroed joint deltas.
    pub fn teleport_links(&mut self) {
        self.jcalc(false);
        self.data.joint_delta_motion.fill(0.0);
        for dm in &mut self.data.delta_motion {
            *dm = SpatialVector::zeros();
        }
        for z in &mut self.data.deferred_z {
            *z = SpatialVector::zeros();
        }
        self.update_kinematics();
        self.jcalc(true);
    }

    /// Set the root's velocity. Ignored for a fixed base.
    pub fn set_root_velocity(&mut self, angular: Vector3<f64>, linear: Vector3<f64>) {
        if !self.config.fix_base {
            self.data.motion_velocity[0] = spatial(&angular, &linear);
        }
    }

    /// Root velocity `[ω; v]`.
    #[must_use]
    pub fn root_velocity(&self) -> SpatialVector {
        self.data.motion_velocity[0]
    }

    /// Add an acceleration to link `i` for the next step only.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn set_external_acceleration(
        &mut self,
        i: usize,
        angular: Vector3<f64>,
        linear: Vector3<f64>,
    ) -> Result<()> {
        self.check_link(i)?;
        self.links[i].external_acceleration = spatial(&angular, &linear);
        Ok(())
    }

    /// Apply a force and torque (about the centre of mass) to link `i` for
    /// the next step only.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::LinkOutOfRange`] for a bad index.
    pub fn apply_external_force(
        &mut self,
        i: usize,
        torque: Vector3<f64>,
        force: Vector3<f64>,
    ) -> Result<()> {
        self.check_link(i)?;
        let link = &mut self.links[i];
        let inv_i = link.world_inertia().try_inverse().unwrap_or_else(Matrix3::zeros);
        let acc = spatial(&(inv_i * torque), &(force / link.desc.mass));
        link.external_acceleration += acc;
        Ok(())
    }

    /// Set the drive target of one axis of link `i`'s joint.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad index, the root or a non-finite target.
    pub fn set_drive_target(
        &mut self,
        i: usize,
        axis: JointAxis,
        position: f64,
        velocity: f64,
    ) -> Result<()> {
        if !position.is_finite() || !velocity.is_finite() {
            return Err(ArticulationError::invalid_joint(i, "drive target must be finite"));
        }
        let joint = self.joint_mut(i)?;
        joint.desc.drive_position[axis.index()] = position;
        joint.desc.drive_velocity[axis.index()] = velocity;
        Ok(())
    }

    /// Replace the drive of one axis of link `i`'s joint.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad index, the root or invalid drive gains.
    pub fn set_joint_drive(&mut self, i: usize, axis: JointAxis, drive: JointDrive) -> Result<()> {
        let joint = self.joint_mut(i)?;
        let desc = joint.desc.clone().with_drive(axis, drive);
        desc.validate(i)?;
        joint.desc = desc;
        Ok(())
    }

    /// Change the motion of one axis. The DOF layout is rebuilt at the next
    /// jcalc; state of surviving axes is kept.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad index, the root, or a motion the joint
    /// type cannot take.
    pub fn set_joint_motion(&mut self, i: usize, axis: JointAxis, motion: Motion) -> Result<()> {
        let joint = self.joint_mut(i)?;
        let desc = joint.desc.clone().with_motion(axis, motion);
        desc.validate(i)?;
        if desc.motion != joint.desc.motion {
            joint.dirty = true;
        }
        joint.desc = desc;
        Ok(())
    }

    /// Limit one axis to `[low, high]` and mark it limited.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad index, the root or an invalid range.
    pub fn set_joint_limit(&mut self, i: usize, axis: JointAxis, low: f64, high: f64) -> Result<()> {
        let joint = self.joint_mut(i)?;
        let desc = joint.desc.clone().with_limit(axis, low, high);
        desc.validate(i)?;
        if desc.motion != joint.desc.motion {
            joint.dirty = true;
        }
        joint.desc = desc;
        Ok(())
    }

    /// Set the friction coefficient of link `i`'s joint.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad index, the root or a negative coefficient.
    pub fn set_joint_friction(&mut self, i: usize, coefficient: f64) -> Result<()> {
        let joint = self.joint_mut(i)?;
        let desc = joint.desc.clone().with_friction(coefficient);
        desc.validate(i)?;
        joint.desc = desc;
        Ok(())
    }

    /// Queue a one-dimensional external row (e.g. a contact) for the next
    /// step.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad link index or an empty impulse range.
    pub fn add_external_constraint(&mut self, constraint: ExternalConstraint) -> Result<()> {
        self.check_link(constraint.link)?;
        if constraint.min_impulse > constraint.max_impulse {
            return Err(ArticulationError::invalid_config(
                "external constraint min_impulse exceeds max_impulse",
            ));
        }
        self.constraints.external.push(constraint);
        Ok(())
    }

    /// Drop queued external rows.
    pub fn clear_external_constraints(&mut self) {
        self.constraints.external.clear();
    }

    /// Advance the articulation by `dt` with the configured integrator.
    ///
    /// External accelerations and queued external rows are consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::InvalidTimestep`] if `dt` is not
    /// positive and finite.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        check_timestep(dt)?;
        let solver = Arc::clone(&self.solver);
        solver.step(self, dt)
    }
}

pub(crate) fn check_timestep(dt: f64) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(ArticulationError::InvalidTimestep(dt))
    }
}
