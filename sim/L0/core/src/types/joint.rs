//! Runtime joint: descriptor plus the DOF layout computed by jcalc.

use sim_articulation_types::{JointAxis, JointDesc, Motion};

/// How a joint's positions map to the child's pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JointKinematics {
    /// No DOFs; the child is rigidly attached.
    #[default]
    Fixed,
    /// One translation along a parent joint-frame axis.
    Prismatic,
    /// One or two rotations composed in `Twist, Swing1, Swing2` order
    /// (revolute joints and swing/twist-limited spherical joints).
    Explicit,
    /// Three rotations; the pose is integrated with the exponential map and
    /// positions are the rotation-vector components along the child
    /// joint-frame axes.
    Ball,
}

/// DOF layout of one joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointCore {
    /// Number of DOFs.
    pub dof: usize,
    /// Axis of each DOF. Soft-locked axes come last.
    pub axes: [JointAxis; 3],
    /// Trailing DOFs held by soft lock rows.
    pub locked_axes: usize,
    /// DOFs with [`Motion::Limited`].
    pub limited_axes: usize,
    /// Index of the first DOF in the articulation's joint vectors.
    pub offset: usize,
    /// Position-to-pose map.
    pub kinematics: JointKinematics,
}

impl Default for JointCore {
    fn default() -> Self {
        Self {
            dof: 0,
            axes: [JointAxis::Twist; 3],
            locked_axes: 0,
            limited_axes: 0,
            offset: 0,
            kinematics: JointKinematics::Fixed,
        }
    }
}

/// Inbound joint of a non-root link.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub(crate) desc: JointDesc,
    pub(crate) core: JointCore,
    pub(crate) dirty: bool,
}

impl Joint {
    pub(crate) fn new(desc: JointDesc) -> Self {
        Self {
            desc,
            core: JointCore::default(),
            dirty: true,
        }
    }

    /// Descriptor.
    #[must_use]
    pub fn desc(&self) -> &JointDesc {
        &self.desc
    }

    /// DOF layout from the last jcalc.
    #[must_use]
    pub fn core(&self) -> &JointCore {
        &self.core
    }

    /// Number of DOFs.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.core.dof
    }

    /// First DOF index in the articulation's joint vectors.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.core.offset
    }

    /// Axis of each DOF.
    #[must_use]
    pub fn axes(&self) -> &[JointAxis] {
        &self.core.axes[..self.core.dof]
    }

    /// Position-to-pose map.
    #[must_use]
    pub fn kinematics(&self) -> JointKinematics {
        self.core.kinematics
    }

    /// Whether the axis set changed since the last jcalc.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// DOF slot of `axis`, if the axis is part of the subspace.
    #[must_use]
    pub fn dof_of(&self, axis: JointAxis) -> Option<usize> {
        self.axes().iter().position(|a| *a == axis)
    }

    /// Whether DOF `k` is held by a soft lock row.
    #[must_use]
    pub fn is_soft_locked(&self, k: usize) -> bool {
        k >= self.core.dof - self.core.locked_axes
    }

    /// Motion of DOF `k`.
    #[must_use]
    pub fn dof_motion(&self, k: usize) -> Motion {
        self.desc.motion[self.core.axes[k].index()]
    }
}
