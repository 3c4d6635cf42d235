//! Integration tests for the articulation solver.
//!
//! These tests drive whole steps through the public API:
//! - Unconstrained dynamics: free fall, momentum, energy, inverse dynamics
//! - Impulse response: superposition, agreement with `J M⁻¹ Jᵀ`
//! - Joint rows: limits, drives, friction, locked axes, external rows
//! - Integrators: single-step against sub-stepped
//! - Topology edits, warnings and rejected operations

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

pub mod fixtures;

pub mod constraints;
pub mod dynamics;
pub mod integrators;
pub mod response;
pub mod topology;
