//! Reduced-coordinate articulated rigid-body solver.
//!
//! This crate advances kinematic trees of rigid links joined by joints with
//! configurable DOFs, limits, drives and friction. It follows Featherstone's
//! articulated-body formulation:
//!
//! - joint positions and velocities are the state; link poses follow by
//!   forward kinematics
//! - one step: forward dynamics, joint-row setup, Gauss-Seidel sweeps,
//!   integration
//! - impulses are propagated through the tree in `O(depth)`, never through
//!   a dense mass matrix
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ spatial · topology · jcalc                                   │
//! │ 6D algebra, tree + ancestor masks, DOF layout and subspaces  │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ forward → response → solver → integrate                      │
//! │ unconstrained velocities, impulse response, joint rows,      │
//! │ single-step or sub-stepped position/velocity update          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It owns no
//! collision detection, island building or scheduling: a caller merges
//! contact rows through [`ExternalConstraint`] and steps each articulation
//! on its own thread.
//!
//! # Quick Start
//!
//! ```
//! use sim_articulation::{Articulation, JointAxis};
//!
//! let mut artic = Articulation::n_link_pendulum(2, 0.5, 1.0)?;
//! artic.set_joint_limit(1, JointAxis::Swing1, -0.5, 0.5)?;
//! artic.set_joint_positions(&[0.4, 0.0])?;
//!
//! for _ in 0..100 {
//!     artic.step(1.0 / 240.0)?;
//! }
//! assert!(artic.joint_positions()[0] <= 0.5 + 1e-6);
//! # Ok::<(), sim_articulation::ArticulationError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/sim-articulation/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::neg_cmp_op_on_partial_ord,  // !(x >= 0.0) is intentional for NaN rejection
    clippy::too_many_lines,             // Physics passes naturally have many steps
    clippy::doc_markdown,               // Not all technical terms need backticks
    clippy::many_single_char_names,     // i, p, q, s follow the dynamics literature
)]

// 6D spatial algebra
pub mod spatial;

// Kinematic tree and ancestor masks
pub mod topology;

// Joint model: DOF layout, forward kinematics, motion subspaces
pub mod jcalc;

// Articulation, links, joints, per-step state
pub mod types;

// Featherstone forward dynamics
pub mod forward;

// Impulse response
pub mod response;

// Joint and external rows, Gauss-Seidel sweeps
pub mod solver;

// Single-step and sub-stepped integration
pub(crate) mod integrate;

// Generalized-coordinate queries
mod cache;
mod energy;
mod inverse;
mod jacobian;

// Solver capability interface
pub mod backend;

pub use backend::{ArticulationSolver, ReducedCoordinateSolver, SolverKind, create_solver};
pub use cache::ArticulationCache;
pub use solver::{ExternalConstraint, InternalConstraint, LockedAxisConstraint};
pub use spatial::{MotionMatrix, SpatialMatrix, SpatialVector};
pub use topology::Topology;
pub use types::{
    Articulation, ArticulationData, Joint, JointCore, JointKinematics, Link, NUM_WARNINGS,
    ScratchData, Warning, WarningStat, WarningTable,
};

pub use sim_articulation_types::{
    ArticulationConfig, ArticulationError, DEFAULT_MAX_JOINT_VELOCITY, DriveType, IntegrationMode,
    JointAxis, JointDesc, JointDrive, JointLimit, JointType, LinkDesc, MAX_LINKS, Motion, Result,
    STANDARD_GRAVITY, SolverConfig, SphericalLockMode,
};
