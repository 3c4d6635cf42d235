//! Per-step caches and per-DOF state of an articulation.
//!
//! Joint vectors (`joint_*`) are indexed by DOF; everything else by link.
//! Link quantities are world-frame spatial vectors about each link's centre
//! of mass.

use nalgebra::{DVector, Isometry3, Matrix3, Vector3};

use crate::spatial::{MotionMatrix, SpatialMatrix, SpatialVector};

/// Dynamic state and per-step caches.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticulationData {
    // ==================== Joint state (persistent) ====================
    /// Joint positions.
    pub joint_position: DVector<f64>,
    /// Joint velocities.
    pub joint_velocity: DVector<f64>,
    /// Joint accelerations of the last step.
    pub joint_acceleration: DVector<f64>,
    /// Applied joint forces, held until changed.
    pub joint_force: DVector<f64>,

    // ==================== Link state ====================
    /// Link velocities `[ω; v]` of the centre of mass.
    pub motion_velocity: Vec<SpatialVector>,
    /// Link accelerations of the last step.
    pub motion_acceleration: Vec<SpatialVector>,

    // ==================== Kinematic caches (jcalc) ====================
    /// World motion subspace of each link's inbound joint.
    pub(crate) motion_matrix: Vec<MotionMatrix>,
    /// Child centre of mass minus parent centre of mass.
    pub(crate) rw: Vec<Vector3<f64>>,
    /// Child centre of mass minus the joint anchor.
    pub(crate) lever: Vec<Vector3<f64>>,

    // ==================== Dynamics caches (forward pass) ====================
    pub(crate) spatial_inertia: Vec<SpatialMatrix>,
    pub(crate) articulated_inertia: Vec<SpatialMatrix>,
    /// `I_A·S`.
    pub(crate) is: Vec<MotionMatrix>,
    /// `I_A·S·(SᵀI_A S)⁻¹`.
    pub(crate) is_inv_d: Vec<MotionMatrix>,
    /// `(SᵀI_A S)⁻¹`, zero padded.
    pub(crate) inv_st_is: Vec<Matrix3<f64>>,
    /// Inverse articulated inertia of a floating base.
    pub(crate) base_inv_inertia: SpatialMatrix,
    /// Isolated zero-acceleration force of each link.
    pub(crate) bias_force: Vec<SpatialVector>,
    /// Articulated zero-acceleration force.
    pub(crate) articulated_bias: Vec<SpatialVector>,
    /// `Σ ω × (I ω)` over the links at the start of the step.
    pub(crate) gyroscopic_torque: Vector3<f64>,
    /// Velocity-product acceleration across each joint.
    pub(crate) coriolis: Vec<SpatialVector>,
    /// `τ − Sᵀ(Z_A + I_A c)`.
    pub(crate) qst_zic: Vec<Vector3<f64>>,
    /// Spatial force transmitted through each inbound joint.
    pub(crate) transmitted_force: Vec<SpatialVector>,
    /// Velocity change of a link per unit impulse on that link.
    pub(crate) response: Vec<SpatialMatrix>,

    // ==================== Solver state ====================
    /// Impulses not yet folded into velocities (`Z` convention: minus the
    /// applied impulse, accumulated into each link's subtree).
    pub(crate) deferred_z: Vec<SpatialVector>,
    /// Link velocities at the start of the step.
    pub(crate) pre_velocity: Vec<SpatialVector>,
    /// Joint velocities at the start of the step.
    pub(crate) pre_joint_velocity: DVector<f64>,
    /// Rotation vector and translation accumulated over the sub-steps.
    pub(crate) delta_motion: Vec<SpatialVector>,
    /// Joint motion accumulated over the sub-steps.
    pub(crate) joint_delta_motion: DVector<f64>,
    /// Uncommitted link poses while sub-stepping.
    pub(crate) accumulated_pose: Vec<Isometry3<f64>>,
    /// Link poses at the start of the step.
    pub(crate) pre_pose: Vec<Isometry3<f64>>,

    /// Timestep of the current step.
    pub(crate) dt: f64,
    /// Inertia and response caches match the current poses.
    pub(crate) caches_valid: bool,
}

impl ArticulationData {
    /// Storage for `links` links and `dofs` DOFs, zero initialized.
    #[must_use]
    pub fn new(links: usize, dofs: usize) -> Self {
        Self {
            joint_position: DVector::zeros(dofs),
            joint_velocity: DVector::zeros(dofs),
            joint_acceleration: DVector::zeros(dofs),
            joint_force: DVector::zeros(dofs),
            motion_velocity: vec![SpatialVector::zeros(); links],
            motion_acceleration: vec![SpatialVector::zeros(); links],
            motion_matrix: vec![MotionMatrix::zeros(); links],
            rw: vec![Vector3::zeros(); links],
            lever: vec![Vector3::zeros(); links],
            spatial_inertia: vec![SpatialMatrix::zeros(); links],
            articulated_inertia: vec![SpatialMatrix::zeros(); links],
            is: vec![MotionMatrix::zeros(); links],
            is_inv_d: vec![MotionMatrix::zeros(); links],
            inv_st_is: vec![Matrix3::zeros(); links],
            base_inv_inertia: SpatialMatrix::zeros(),
            bias_force: vec![SpatialVector::zeros(); links],
            articulated_bias: vec![SpatialVector::zeros(); links],
            gyroscopic_torque: Vector3::zeros(),
            coriolis: vec![SpatialVector::zeros(); links],
            qst_zic: vec![Vector3::zeros(); links],
            transmitted_force: vec![SpatialVector::zeros(); links],
            response: vec![SpatialMatrix::zeros(); links],
            deferred_z: vec![SpatialVector::zeros(); links],
            pre_velocity: vec![SpatialVector::zeros(); links],
            pre_joint_velocity: DVector::zeros(dofs),
            delta_motion: vec![SpatialVector::zeros(); links],
            joint_delta_motion: DVector::zeros(dofs),
            accumulated_pose: vec![Isometry3::identity(); links],
            pre_pose: vec![Isometry3::identity(); links],
            dt: 0.0,
            caches_valid: false,
        }
    }

    /// Number of links the caches are sized for.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.motion_velocity.len()
    }

    /// Number of DOFs the joint vectors are sized for.
    #[must_use]
    pub fn dof_count(&self) -> usize {
        self.joint_position.len()
    }

    /// Resize the per-link caches, keeping existing link state.
    pub(crate) fn resize_links(&mut self, links: usize) {
        let z6 = SpatialVector::zeros();
        let m6 = SpatialMatrix::zeros();
        self.motion_velocity.resize(links, z6);
        self.motion_acceleration.resize(links, z6);
        self.motion_matrix.resize(links, MotionMatrix::zeros());
        self.rw.resize(links, Vector3::zeros());
        self.lever.resize(links, Vector3::zeros());
        self.spatial_inertia.resize(links, m6);
        self.articulated_inertia.resize(links, m6);
        self.is.resize(links, MotionMatrix::zeros());
        self.is_inv_d.resize(links, MotionMatrix::zeros());
        self.inv_st_is.resize(links, Matrix3::zeros());
        self.bias_force.resize(links, z6);
        self.articulated_bias.resize(links, z6);
        self.coriolis.resize(links, z6);
        self.qst_zic.resize(links, Vector3::zeros());
        self.transmitted_force.resize(links, z6);
        self.response.resize(links, m6);
        self.deferred_z.resize(links, z6);
        self.pre_velocity.resize(links, z6);
        self.delta_motion.resize(links, z6);
        self.accumulated_pose.resize(links, Isometry3::identity());
        self.pre_pose.resize(links, Isometry3::identity());
        self.caches_valid = false;
    }

    /// Replace the joint vectors after a DOF layout change.
    pub(crate) fn replace_joint_state(
        &mut self,
        position: DVector<f64>,
        velocity: DVector<f64>,
        force: DVector<f64>,
    ) {
        let dofs = position.len();
        self.joint_position = position;
        self.joint_velocity = velocity;
        self.joint_force = force;
        self.joint_acceleration = DVector::zeros(dofs);
        self.pre_joint_velocity = DVector::zeros(dofs);
        self.joint_delta_motion = DVector::zeros(dofs);
        self.caches_valid = false;
    }

    /// Drop a link's entry from every per-link cache.
    pub(crate) fn remove_link(&mut self, i: usize) {
        self.motion_velocity.remove(i);
        self.motion_acceleration.remove(i);
        self.motion_matrix.remove(i);
        self.rw.remove(i);
        self.lever.remove(i);
        self.spatial_inertia.remove(i);
        self.articulated_inertia.remove(i);
        self.is.remove(i);
        self.is_inv_d.remove(i);
        self.inv_st_is.remove(i);
        self.bias_force.remove(i);
        self.articulated_bias.remove(i);
        self.coriolis.remove(i);
        self.qst_zic.remove(i);
        self.transmitted_force.remove(i);
        self.response.remove(i);
        self.deferred_z.remove(i);
        self.pre_velocity.remove(i);
        self.delta_motion.remove(i);
        self.accumulated_pose.remove(i);
        self.pre_pose.remove(i);
        self.caches_valid = false;
    }
}
