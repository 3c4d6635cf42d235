//! Error types for articulation construction and stepping.

use thiserror::Error;

/// Errors returned synchronously by articulation operations.
///
/// Numerical ill-conditioning during a step is never reported here; it is
/// recovered in place and recorded in the articulation's warning table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArticulationError {
    /// A joint descriptor is inconsistent with its joint type.
    #[error("invalid joint configuration for link {link}: {reason}")]
    InvalidJointConfig {
        /// Child link index of the offending joint.
        link: usize,
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid articulation or solver configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass or inertia.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Adding a link would exceed the articulation capacity.
    #[error("articulation capacity exceeded: at most {max} links")]
    TooManyLinks {
        /// Maximum number of links per articulation.
        max: usize,
    },

    /// The parent index does not name an existing link.
    #[error("invalid parent link {parent} (articulation has {count} links)")]
    InvalidParent {
        /// Requested parent index.
        parent: usize,
        /// Current link count.
        count: usize,
    },

    /// A link index is out of range.
    #[error("link index {index} out of range (articulation has {count} links)")]
    LinkOutOfRange {
        /// Requested link index.
        index: usize,
        /// Current link count.
        count: usize,
    },

    /// Only leaf links can be removed.
    #[error("link {0} has children and cannot be removed")]
    NotALeaf(usize),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// A cache or state vector does not match the articulation's dimensions.
    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    CacheSizeMismatch {
        /// Name of the mismatched buffer.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// The root link cannot be removed.
    #[error("articulation must keep its root link")]
    EmptyArticulation,
}

impl ArticulationError {
    /// Create an invalid joint configuration error.
    #[must_use]
    pub fn invalid_joint(link: usize, reason: impl Into<String>) -> Self {
        Self::InvalidJointConfig {
            link,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create a size mismatch error.
    #[must_use]
    pub fn size_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::CacheSizeMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Check if this error comes from an invalid descriptor.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidJointConfig { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidMassProperties { .. }
                | Self::InvalidTimestep(_)
        )
    }

    /// Check if this error comes from an out-of-range index or capacity limit.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::TooManyLinks { .. }
                | Self::InvalidParent { .. }
                | Self::LinkOutOfRange { .. }
                | Self::NotALeaf(_)
                | Self::CacheSizeMismatch { .. }
                | Self::EmptyArticulation
        )
    }
}
