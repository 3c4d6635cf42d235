//! Joint descriptors for reduced-coordinate articulations.
//!
//! A joint connects a child link to its parent and is described by two
//! attachment frames (one local to each link) and a per-axis motion table
//! over the six joint-frame axes. Rotational axes are `Twist`, `Swing1`,
//! `Swing2` (about joint-frame x, y, z); translational axes are `X`, `Y`, `Z`.

use nalgebra::{Isometry3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ArticulationError, Result};

/// Type of joint connecting a link to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointType {
    /// No relative motion.
    #[default]
    Fix,
    /// Translation along a single axis.
    Prismatic,
    /// Rotation about a single axis.
    Revolute,
    /// Rotation about up to three axes.
    Spherical,
}

impl std::fmt::Display for JointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fix => write!(f, "fix"),
            Self::Prismatic => write!(f, "prismatic"),
            Self::Revolute => write!(f, "revolute"),
            Self::Spherical => write!(f, "spherical"),
        }
    }
}

/// One of the six joint-frame axes.
///
/// The discriminant is the axis' slot in the per-axis tables of
/// [`JointDesc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum JointAxis {
    /// Rotation about joint-frame x.
    Twist = 0,
    /// Rotation about joint-frame y.
    Swing1 = 1,
    /// Rotation about joint-frame z.
    Swing2 = 2,
    /// Translation along joint-frame x.
    X = 3,
    /// Translation along joint-frame y.
    Y = 4,
    /// Translation along joint-frame z.
    Z = 5,
}

impl JointAxis {
    /// All axes in table order (rotations first).
    pub const ALL: [Self; 6] = [
        Self::Twist,
        Self::Swing1,
        Self::Swing2,
        Self::X,
        Self::Y,
        Self::Z,
    ];

    /// Table slot of this axis.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the axis is a rotation.
    #[must_use]
    pub const fn is_rotational(self) -> bool {
        (self as u8) < 3
    }

    /// Unit direction of the axis in the joint frame.
    #[must_use]
    pub fn unit(self) -> Vector3<f64> {
        match self {
            Self::Twist | Self::X => Vector3::x(),
            Self::Swing1 | Self::Y => Vector3::y(),
            Self::Swing2 | Self::Z => Vector3::z(),
        }
    }
}

/// Motion permitted along one joint axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Motion {
    /// No motion along this axis.
    #[default]
    Locked,
    /// Motion bounded by a [`JointLimit`].
    Limited,
    /// Unbounded motion.
    Free,
}

/// Position limits for one axis (radians or meters).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointLimit {
    /// Lower bound.
    pub low: f64,
    /// Upper bound.
    pub high: f64,
}

impl JointLimit {
    /// Create a limit pair.
    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Symmetric limit `[-half_range, half_range]`.
    #[must_use]
    pub const fn symmetric(half_range: f64) -> Self {
        Self {
            low: -half_range,
            high: half_range,
        }
    }

    /// Clamp a position into the limit.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }
}

/// How drive gains are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DriveType {
    /// Drive disabled.
    #[default]
    None,
    /// Spring-damper producing a force (mass dependent).
    Force,
    /// Spring-damper producing an acceleration (mass independent).
    Acceleration,
    /// Infinitely stiff position target; only `max_force` bounds it.
    Target,
    /// Infinitely stiff velocity target; only `max_force` bounds it.
    Velocity,
}

/// Per-axis drive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointDrive {
    /// Position gain.
    pub stiffness: f64,
    /// Velocity gain.
    pub damping: f64,
    /// Bound on the drive impulse per step (force or impulse, see
    /// `ArticulationConfig::drive_limits_are_forces`).
    pub max_force: f64,
    /// Gain interpretation.
    pub drive_type: DriveType,
}

impl JointDrive {
    /// Force spring-damper drive.
    #[must_use]
    pub const fn force(stiffness: f64, damping: f64, max_force: f64) -> Self {
        Self {
            stiffness,
            damping,
            max_force,
            drive_type: DriveType::Force,
        }
    }

    /// Acceleration spring-damper drive.
    #[must_use]
    pub const fn acceleration(stiffness: f64, damping: f64, max_force: f64) -> Self {
        Self {
            stiffness,
            damping,
            max_force,
            drive_type: DriveType::Acceleration,
        }
    }

    /// Rigid position target.
    #[must_use]
    pub const fn target(max_force: f64) -> Self {
        Self {
            stiffness: 0.0,
            damping: 0.0,
            max_force,
            drive_type: DriveType::Target,
        }
    }

    /// Rigid velocity target.
    #[must_use]
    pub const fn velocity(max_force: f64) -> Self {
        Self {
            stiffness: 0.0,
            damping: 0.0,
            max_force,
            drive_type: DriveType::Velocity,
        }
    }

    /// Whether the drive produces any impulse.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self.drive_type {
            DriveType::None => false,
            DriveType::Target | DriveType::Velocity => self.max_force > 0.0,
            DriveType::Force | DriveType::Acceleration => {
                self.max_force > 0.0 && (self.stiffness > 0.0 || self.damping > 0.0)
            }
        }
    }
}

/// How locked axes of a spherical joint are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SphericalLockMode {
    /// Locked axes are removed from the joint's motion subspace.
    #[default]
    Hard,
    /// The joint keeps three DOFs and locked axes are held by soft
    /// lock rows in the constraint solver.
    Soft,
}

/// Default bound on joint speed (rad/s or m/s).
pub const DEFAULT_MAX_JOINT_VELOCITY: f64 = 100.0;

/// Complete description of a joint.
///
/// # Example
///
/// ```
/// use sim_articulation_types::{JointAxis, JointDesc, JointDrive, Motion};
/// use nalgebra::Vector3;
///
/// let hinge = JointDesc::revolute(JointAxis::Swing2)
///     .with_anchor(Vector3::new(0.0, -0.5, 0.0), Vector3::new(0.0, 0.5, 0.0))
///     .with_limit(JointAxis::Swing2, -1.0, 1.0)
///     .with_drive(JointAxis::Swing2, JointDrive::force(100.0, 10.0, 1e3));
///
/// assert_eq!(hinge.motion[JointAxis::Swing2.index()], Motion::Limited);
/// assert!(hinge.validate(1).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointDesc {
    /// Joint type.
    pub joint_type: JointType,
    /// Joint frame relative to the parent link's frame.
    pub parent_pose: Isometry3<f64>,
    /// Joint frame relative to the child link's frame.
    pub child_pose: Isometry3<f64>,
    /// Motion per axis, indexed by [`JointAxis::index`].
    pub motion: [Motion; 6],
    /// Limits per axis (used when the axis is [`Motion::Limited`]).
    pub limits: [JointLimit; 6],
    /// Drive per axis.
    pub drives: [JointDrive; 6],
    /// Drive target position per axis.
    pub drive_position: [f64; 6],
    /// Drive target velocity per axis.
    pub drive_velocity: [f64; 6],
    /// Coulomb friction coefficient applied to the transmitted joint force.
    pub friction_coefficient: f64,
    /// Bound on the speed of each DOF.
    pub max_joint_velocity: f64,
    /// Enforcement of locked spherical axes.
    pub lock_mode: SphericalLockMode,
}

impl Default for JointDesc {
    fn default() -> Self {
        Self {
            joint_type: JointType::Fix,
            parent_pose: Isometry3::identity(),
            child_pose: Isometry3::identity(),
            motion: [Motion::Locked; 6],
            limits: [JointLimit::default(); 6],
            drives: [JointDrive::default(); 6],
            drive_position: [0.0; 6],
            drive_velocity: [0.0; 6],
            friction_coefficient: 0.0,
            max_joint_velocity: DEFAULT_MAX_JOINT_VELOCITY,
            lock_mode: SphericalLockMode::Hard,
        }
    }
}

impl JointDesc {
    /// A fixed joint.
    #[must_use]
    pub fn fixed() -> Self {
        Self::default()
    }

    /// A revolute joint free about `axis`.
    #[must_use]
    pub fn revolute(axis: JointAxis) -> Self {
        Self {
            joint_type: JointType::Revolute,
            ..Self::default()
        }
        .with_motion(axis, Motion::Free)
    }

    /// A prismatic joint free along `axis`.
    #[must_use]
    pub fn prismatic(axis: JointAxis) -> Self {
        Self {
            joint_type: JointType::Prismatic,
            ..Self::default()
        }
        .with_motion(axis, Motion::Free)
    }

    /// A spherical joint with all three rotations free.
    #[must_use]
    pub fn spherical() -> Self {
        Self {
            joint_type: JointType::Spherical,
            ..Self::default()
        }
        .with_motion(JointAxis::Twist, Motion::Free)
        .with_motion(JointAxis::Swing1, Motion::Free)
        .with_motion(JointAxis::Swing2, Motion::Free)
    }

    /// Set both attachment frames.
    #[must_use]
    pub fn with_poses(mut self, parent_pose: Isometry3<f64>, child_pose: Isometry3<f64>) -> Self {
        self.parent_pose = parent_pose;
        self.child_pose = child_pose;
        self
    }

    /// Set the attachment points, keeping both joint frames aligned with
    /// their link frames.
    #[must_use]
    pub fn with_anchor(mut self, in_parent: Vector3<f64>, in_child: Vector3<f64>) -> Self {
        self.parent_pose = Isometry3::translation(in_parent.x, in_parent.y, in_parent.z);
        self.child_pose = Isometry3::translation(in_child.x, in_child.y, in_child.z);
        self
    }

    /// Set the motion of one axis.
    #[must_use]
    pub fn with_motion(mut self, axis: JointAxis, motion: Motion) -> Self {
        self.motion[axis.index()] = motion;
        self
    }

    /// Limit one axis to `[low, high]`.
    #[must_use]
    pub fn with_limit(mut self, axis: JointAxis, low: f64, high: f64) -> Self {
        self.motion[axis.index()] = Motion::Limited;
        self.limits[axis.index()] = JointLimit::new(low, high);
        self
    }

    /// Set the drive of one axis.
    #[must_use]
    pub fn with_drive(mut self, axis: JointAxis, drive: JointDrive) -> Self {
        self.drives[axis.index()] = drive;
        self
    }

    /// Set the drive target of one axis.
    #[must_use]
    pub fn with_drive_target(mut self, axis: JointAxis, position: f64, velocity: f64) -> Self {
        self.drive_position[axis.index()] = position;
        self.drive_velocity[axis.index()] = velocity;
        self
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, coefficient: f64) -> Self {
        self.friction_coefficient = coefficient;
        self
    }

    /// Set the joint speed bound.
    #[must_use]
    pub fn with_max_joint_velocity(mut self, max_joint_velocity: f64) -> Self {
        self.max_joint_velocity = max_joint_velocity;
        self
    }

    /// Set the locked-axis mode for spherical joints.
    #[must_use]
    pub fn with_lock_mode(mut self, lock_mode: SphericalLockMode) -> Self {
        self.lock_mode = lock_mode;
        self
    }

    /// Motion of one axis.
    #[must_use]
    pub fn axis_motion(&self, axis: JointAxis) -> Motion {
        self.motion[axis.index()]
    }

    /// Number of axes that are not locked.
    #[must_use]
    pub fn unlocked_axis_count(&self) -> usize {
        self.motion.iter().filter(|m| **m != Motion::Locked).count()
    }

    /// Check the descriptor against its joint type.
    ///
    /// `link` is only used to label the error.
    pub fn validate(&self, link: usize) -> Result<()> {
        let rotational = JointAxis::ALL[..3]
            .iter()
            .filter(|a| self.axis_motion(**a) != Motion::Locked)
            .count();
        let translational = JointAxis::ALL[3..]
            .iter()
            .filter(|a| self.axis_motion(**a) != Motion::Locked)
            .count();

        match self.joint_type {
            JointType::Fix if rotational + translational > 0 => {
                return Err(ArticulationError::invalid_joint(
                    link,
                    "fixed joint must lock every axis",
                ));
            }
            JointType::Revolute if rotational != 1 || translational != 0 => {
                return Err(ArticulationError::invalid_joint(
                    link,
                    format!(
                        "revolute joint needs exactly one rotational axis, got {rotational} rotational and {translational} translational"
                    ),
                ));
            }
            JointType::Prismatic if translational != 1 || rotational != 0 => {
                return Err(ArticulationError::invalid_joint(
                    link,
                    format!(
                        "prismatic joint needs exactly one translational axis, got {translational} translational and {rotational} rotational"
                    ),
                ));
            }
            JointType::Spherical if translational != 0 => {
                return Err(ArticulationError::invalid_joint(
                    link,
                    "spherical joint cannot translate",
                ));
            }
            _ => {}
        }

        for axis in JointAxis::ALL {
            let i = axis.index();
            if self.motion[i] == Motion::Limited {
                let limit = self.limits[i];
                if !(limit.low.is_finite() && limit.high.is_finite()) || limit.low > limit.high {
                    return Err(ArticulationError::invalid_joint(
                        link,
                        format!(
                            "limit on {axis:?} must be finite with low <= high, got [{}, {}]",
                            limit.low, limit.high
                        ),
                    ));
                }
            }
            let drive = self.drives[i];
            if !(drive.stiffness >= 0.0 && drive.damping >= 0.0 && drive.max_force >= 0.0) {
                return Err(ArticulationError::invalid_joint(
                    link,
                    format!("drive on {axis:?} needs non-negative gains and max force"),
                ));
            }
            if !(self.drive_position[i].is_finite() && self.drive_velocity[i].is_finite()) {
                return Err(ArticulationError::invalid_joint(
                    link,
                    format!("drive target on {axis:?} must be finite"),
                ));
            }
        }

        if !(self.friction_coefficient >= 0.0) || !self.friction_coefficient.is_finite() {
            return Err(ArticulationError::invalid_joint(
                link,
                "friction coefficient must be non-negative",
            ));
        }
        if !(self.max_joint_velocity > 0.0) {
            return Err(ArticulationError::invalid_joint(
                link,
                "max joint velocity must be positive",
            ));
        }

        Ok(())
    }
}
