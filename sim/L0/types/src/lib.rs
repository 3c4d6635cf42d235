//! Descriptor types for reduced-coordinate articulations.
//!
//! This crate provides the data that describes an articulation before it is
//! simulated:
//!
//! - [`LinkDesc`] - mass properties, damping and velocity bounds of a link
//! - [`JointDesc`] - joint type, attachment frames, per-axis motion, limits
//!   and drives
//! - [`ArticulationConfig`] - base fixity, gravity, solver iterations and
//!   integration mode
//! - [`ArticulationError`] - errors returned by construction and stepping
//!
//! # Design Philosophy
//!
//! These types are **pure data**. The solver in `sim-articulation` consumes
//! them; nothing here depends on solver state.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Coordinate System
//!
//! - Z: up (default gravity is -Z)
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_articulation_types::{ArticulationConfig, JointAxis, JointDesc, LinkDesc};
//! use nalgebra::Vector3;
//!
//! let config = ArticulationConfig::fixed_base();
//! let link = LinkDesc::sphere(1.0, 0.1);
//! let joint = JointDesc::revolute(JointAxis::Twist)
//!     .with_anchor(Vector3::zeros(), Vector3::new(0.0, 0.0, 0.5));
//!
//! assert!(config.validate().is_ok());
//! assert!(link.validate().is_ok());
//! assert!(joint.validate(1).is_ok());
//! ```

#![doc(html_root_url = "https://docs.rs/sim-articulation-types/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::neg_cmp_op_on_partial_ord, // !(x > 0.0) is intentional for NaN rejection
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
mod joint;

pub use body::LinkDesc;
pub use config::{ArticulationConfig, IntegrationMode, STANDARD_GRAVITY, SolverConfig};
pub use error::ArticulationError;
pub use joint::{
    DEFAULT_MAX_JOINT_VELOCITY, DriveType, JointAxis, JointDesc, JointDrive, JointLimit,
    JointType, Motion, SphericalLockMode,
};

/// Result type for articulation operations.
pub type Result<T> = std::result::Result<T, ArticulationError>;

/// Maximum number of links in one articulation (one bit per link in the
/// path-to-root mask).
pub const MAX_LINKS: usize = 64;

/// Version of the field layout of the serializable descriptor types.
pub const SERIAL_FORMAT_VERSION: u32 = 1;
