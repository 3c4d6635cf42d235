//! Articulation cache: a snapshot of joint state plus generalized-coordinate
//! quantities computed on request.
//!
//! Every computation uses the articulation's current poses. Velocities and
//! accelerations come from the cache, so a caller can evaluate
//! configurations' dynamics terms without stepping.

use nalgebra::{DMatrix, DVector};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sim_articulation_types::{ArticulationError, Result};

use crate::inverse::RootMotion;
use crate::solver::ExternalConstraint;
use crate::spatial::SpatialVector;
use crate::types::Articulation;

/// Joint state and generalized dynamics terms of one articulation.
///
/// Generalized vectors have [`Articulation::coordinate_count`] entries: the
/// floating root's `[ω; v]` first (when the base floats), then the joint
/// DOFs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArticulationCache {
    /// Joint positions.
    pub joint_position: DVector<f64>,
    /// Joint velocities.
    pub joint_velocity: DVector<f64>,
    /// Joint accelerations.
    pub joint_acceleration: DVector<f64>,
    /// Applied joint forces.
    pub joint_force: DVector<f64>,
    /// Root velocity `[ω; v]`.
    pub root_velocity: SpatialVector,
    /// Root acceleration `[α; a]`.
    pub root_acceleration: SpatialVector,
    /// External wrench `[τ; f]` on each link, at its centre of mass in world
    /// axes.
    pub external_force: Vec<SpatialVector>,

    /// Joint-space mass matrix.
    pub mass_matrix: DMatrix<f64>,
    /// Stacked link Jacobians, `6·links` rows.
    pub dense_jacobian: DMatrix<f64>,
    /// Generalized force that holds the articulation against gravity.
    pub gravity_force: DVector<f64>,
    /// Generalized Coriolis and centrifugal force at the cached velocities.
    pub coriolis_force: DVector<f64>,
    /// Generalized force producing the cached accelerations.
    pub inverse_dynamics_force: DVector<f64>,
    /// The link external wrenches mapped to generalized force, `Jᵀ f`.
    pub generalized_external_force: DVector<f64>,
    /// Velocity change along each queried row per unit impulse along each
    /// row, `A = J M⁻¹ Jᵀ`.
    pub coefficient_matrix: DMatrix<f64>,
}

impl ArticulationCache {
    fn new(links: usize, dofs: usize, coordinates: usize) -> Self {
        Self {
            joint_position: DVector::zeros(dofs),
            joint_velocity: DVector::zeros(dofs),
            joint_acceleration: DVector::zeros(dofs),
            joint_force: DVector::zeros(dofs),
            root_velocity: SpatialVector::zeros(),
            root_acceleration: SpatialVector::zeros(),
            external_force: vec![SpatialVector::zeros(); links],
            mass_matrix: DMatrix::zeros(coordinates, coordinates),
            dense_jacobian: DMatrix::zeros(6 * links, coordinates),
            gravity_force: DVector::zeros(coordinates),
            coriolis_force: DVector::zeros(coordinates),
            inverse_dynamics_force: DVector::zeros(coordinates),
            generalized_external_force: DVector::zeros(coordinates),
            coefficient_matrix: DMatrix::zeros(0, 0),
        }
    }

    /// Number of joint DOFs the cache was created for.
    #[must_use]
    pub fn dof_count(&self) -> usize {
        self.joint_position.len()
    }
}

impl Articulation {
    /// Create a cache sized for the current layout, filled with the current
    /// state.
    #[must_use]
    pub fn create_cache(&mut self) -> ArticulationCache {
        self.jcalc(false);
        let mut cache = ArticulationCache::new(self.links.len(), self.dof_count, self.coordinate_count());
        self.fill_cache_state(&mut cache);
        cache
    }

    fn check_cache(&self, cache: &ArticulationCache) -> Result<()> {
        let coordinates = self.coordinate_count();
        if cache.dof_count() != self.dof_count {
            return Err(ArticulationError::size_mismatch("cache DOFs", self.dof_count, cache.dof_count()));
        }
        if cache.mass_matrix.nrows() != coordinates {
            return Err(ArticulationError::size_mismatch(
                "cache coordinates",
                coordinates,
                cache.mass_matrix.nrows(),
            ));
        }
        if cache.dense_jacobian.nrows() != 6 * self.links.len() {
            return Err(ArticulationError::size_mismatch(
                "cache Jacobian rows",
                6 * self.links.len(),
                cache.dense_jacobian.nrows(),
            ));
        }
        if cache.external_force.len() != self.links.len() {
            return Err(ArticulationError::size_mismatch(
                "cache external forces",
                self.links.len(),
                cache.external_force.len(),
            ));
        }
        Ok(())
    }

    fn fill_cache_state(&self, cache: &mut ArticulationCache) {
        cache.joint_position.copy_from(&self.data.joint_position);
        cache.joint_velocity.copy_from(&self.data.joint_velocity);
        cache.joint_acceleration.copy_from(&self.data.joint_acceleration);
        cache.joint_force.copy_from(&self.data.joint_force);
        cache.root_velocity = self.data.motion_velocity[0];
        cache.root_acceleration = self.data.motion_acceleration[0];
    }

    /// Copy the current joint and root state into `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] if the cache was
    /// created for a different layout.
    pub fn copy_internal_state_to_cache(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.jcalc(false);
        self.check_cache(cache)?;
        self.fill_cache_state(cache);
        Ok(())
    }

    /// Write the cached joint positions, velocities and forces and the root
    /// velocity back, and re-pose the tree.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] if the cache was
    /// created for a different layout.
    pub fn apply_cache(&mut self, cache: &ArticulationCache) -> Result<()> {
        self.jcalc(false);
        self.check_cache(cache)?;
        self.data.joint_position.copy_from(&cache.joint_position);
        self.data.joint_velocity.copy_from(&cache.joint_velocity);
        self.data.joint_force.copy_from(&cache.joint_force);
        if !self.config.fix_base {
            self.data.motion_velocity[0] = cache.root_velocity;
        }
        self.teleport_links();
        Ok(())
    }

    fn prepare_cache_query(&mut self, cache: &ArticulationCache) -> Result<()> {
        self.jcalc(false);
        self.check_cache(cache)?;
        self.update_response_caches();
        Ok(())
    }

    /// Joint-space mass matrix at the current poses.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache.
    pub fn compute_mass_matrix(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.prepare_cache_query(cache)?;
        let n = self.coordinate_count();
        let root_cols = self.root_coordinates();
        let qd = vec![0.0; self.dof_count];
        let mut qdd = vec![0.0; self.dof_count];
        let mut column = vec![0.0; n];
        for k in 0..n {
            let mut root = RootMotion::default();
            if k < root_cols {
                root.acceleration[k] = 1.0;
            } else {
                qdd[k - root_cols] = 1.0;
            }
            self.rnea(&root, &qd, &qdd, false, &mut column);
            cache.mass_matrix.column_mut(k).copy_from_slice(&column);
            if k >= root_cols {
                qdd[k - root_cols] = 0.0;
            }
        }
        Ok(())
    }

    /// Generalized force that holds the articulation still against gravity.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache.
    pub fn compute_generalized_gravity_force(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.prepare_cache_query(cache)?;
        let zeros = vec![0.0; self.dof_count];
        let mut out = vec![0.0; self.coordinate_count()];
        self.rnea(&RootMotion::default(), &zeros, &zeros, true, &mut out);
        cache.gravity_force.copy_from_slice(&out);
        Ok(())
    }

    /// Generalized Coriolis and centrifugal force at the cached joint and
    /// root velocities.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache.
    pub fn compute_coriolis_and_centrifugal_force(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.prepare_cache_query(cache)?;
        let zeros = vec![0.0; self.dof_count];
        let root = RootMotion {
            velocity: cache.root_velocity,
            acceleration: SpatialVector::zeros(),
        };
        let mut out = vec![0.0; self.coordinate_count()];
        self.rnea(&root, cache.joint_velocity.as_slice(), &zeros, false, &mut out);
        cache.coriolis_force.copy_from_slice(&out);
        Ok(())
    }

    /// Stacked link Jacobians at the current poses.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache.
    pub fn compute_dense_jacobian(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.jcalc(false);
        self.check_cache(cache)?;
        self.fill_dense_jacobian(&mut cache.dense_jacobian);
        Ok(())
    }

    /// Generalized force producing the cached joint and root accelerations
    /// at the cached velocities, under gravity.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache.
    pub fn compute_inverse_dynamics(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.prepare_cache_query(cache)?;
        let root = RootMotion {
            velocity: cache.root_velocity,
            acceleration: cache.root_acceleration,
        };
        let mut out = vec![0.0; self.coordinate_count()];
        self.rnea(
            &root,
            cache.joint_velocity.as_slice(),
            cache.joint_acceleration.as_slice(),
            true,
            &mut out,
        );
        cache.inverse_dynamics_force.copy_from_slice(&out);
        Ok(())
    }

    /// Generalized force of the cached link wrenches, `Σ Jᵢᵀ fᵢ`.
    ///
    /// Also refreshes `dense_jacobian`.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache.
    pub fn compute_generalized_external_force(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.jcalc(false);
        self.check_cache(cache)?;
        self.fill_dense_jacobian(&mut cache.dense_jacobian);
        let wrenches = DVector::from_iterator(
            6 * cache.external_force.len(),
            cache.external_force.iter().flat_map(|f| f.iter().copied()),
        );
        cache.generalized_external_force = cache.dense_jacobian.tr_mul(&wrenches);
        Ok(())
    }

    /// Joint and root accelerations produced by the cached joint forces and
    /// link wrenches at the cached velocities, under gravity.
    ///
    /// Solves `M q̈ = τ + Jᵀ f − C − G`, where a floating root carries no
    /// applied wrench of its own. The result lands in `joint_acceleration`
    /// and `root_acceleration`. Also refreshes `mass_matrix`,
    /// `dense_jacobian` and `generalized_external_force`.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache,
    /// or [`ArticulationError::InvalidMassProperties`] if the mass matrix
    /// cannot be factored.
    pub fn compute_joint_acceleration(&mut self, cache: &mut ArticulationCache) -> Result<()> {
        self.compute_mass_matrix(cache)?;
        self.compute_generalized_external_force(cache)?;

        let root_cols = self.root_coordinates();
        let root = RootMotion {
            velocity: cache.root_velocity,
            acceleration: SpatialVector::zeros(),
        };
        let zeros = vec![0.0; self.dof_count];
        let mut bias = vec![0.0; self.coordinate_count()];
        self.rnea(&root, cache.joint_velocity.as_slice(), &zeros, true, &mut bias);

        let mut rhs = &cache.generalized_external_force - DVector::from_vec(bias);
        let mut joint_rows = rhs.rows_mut(root_cols, self.dof_count);
        joint_rows += &cache.joint_force;
        let chol = cache
            .mass_matrix
            .clone()
            .cholesky()
            .ok_or_else(|| ArticulationError::invalid_mass("joint-space mass matrix is not positive definite"))?;
        let qdd = chol.solve(&rhs);

        cache.joint_acceleration.copy_from(&qdd.rows(root_cols, self.dof_count));
        cache.root_acceleration = if root_cols == 0 {
            SpatialVector::zeros()
        } else {
            qdd.fixed_rows::<6>(0).into_owned()
        };
        Ok(())
    }

    /// Coupling of a set of rows through the tree: entry `(r, c)` is the
    /// velocity change along row `r` from a unit impulse along row `c`.
    ///
    /// Only each row's link and Jacobian are read. Also refreshes
    /// `mass_matrix` and `dense_jacobian`.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] for a stale cache,
    /// [`ArticulationError::LinkOutOfRange`] for a row on a missing link, or
    /// [`ArticulationError::InvalidMassProperties`] if the mass matrix
    /// cannot be factored.
    pub fn compute_coefficient_matrix(
        &mut self,
        rows: &[ExternalConstraint],
        cache: &mut ArticulationCache,
    ) -> Result<()> {
        let links = self.links.len();
        if let Some(row) = rows.iter().find(|r| r.link >= links) {
            return Err(ArticulationError::LinkOutOfRange {
                index: row.link,
                count: links,
            });
        }
        self.compute_mass_matrix(cache)?;
        self.fill_dense_jacobian(&mut cache.dense_jacobian);

        let n = self.coordinate_count();
        let mut row_jacobian = DMatrix::zeros(rows.len(), n);
        for (r, row) in rows.iter().enumerate() {
            let link_rows = cache.dense_jacobian.fixed_rows::<6>(6 * row.link);
            row_jacobian.row_mut(r).copy_from(&(row.jacobian.transpose() * link_rows));
        }
        let chol = cache
            .mass_matrix
            .clone()
            .cholesky()
            .ok_or_else(|| ArticulationError::invalid_mass("joint-space mass matrix is not positive definite"))?;
        let m_inv_jt = chol.solve(&row_jacobian.transpose());
        cache.coefficient_matrix = &row_jacobian * m_inv_jt;
        Ok(())
    }

    /// Gather per-axis joint values into DOF order.
    ///
    /// `maximum` holds six entries per link in [`JointAxis`] order, root
    /// included; `reduced` receives one entry per DOF.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] if either slice has
    /// the wrong length.
    ///
    /// [`JointAxis`]: sim_articulation_types::JointAxis
    pub fn pack_joint_data(&mut self, maximum: &[f64], reduced: &mut [f64]) -> Result<()> {
        self.check_joint_data(maximum, reduced)?;
        for (i, link) in self.links.iter().enumerate() {
            let Some(joint) = link.joint.as_ref() else {
                continue;
            };
            let core = &joint.core;
            for k in 0..core.dof {
                reduced[core.offset + k] = maximum[6 * i + core.axes[k].index()];
            }
        }
        Ok(())
    }

    /// Scatter DOF-ordered joint values into six entries per link. Axes
    /// without a DOF are zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`ArticulationError::CacheSizeMismatch`] if either slice has
    /// the wrong length.
    pub fn unpack_joint_data(&mut self, reduced: &[f64], maximum: &mut [f64]) -> Result<()> {
        self.check_joint_data(maximum, reduced)?;
        maximum.fill(0.0);
        for (i, link) in self.links.iter().enumerate() {
            let Some(joint) = link.joint.as_ref() else {
                continue;
            };
            let core = &joint.core;
            for k in 0..core.dof {
                maximum[6 * i + core.axes[k].index()] = reduced[core.offset + k];
            }
        }
        Ok(())
    }

    fn check_joint_data(&mut self, maximum: &[f64], reduced: &[f64]) -> Result<()> {
        self.jcalc(false);
        if maximum.len() != 6 * self.links.len() {
            return Err(ArticulationError::size_mismatch(
                "per-axis joint data",
                6 * self.links.len(),
                maximum.len(),
            ));
        }
        if reduced.len() != self.dof_count {
            return Err(ArticulationError::size_mismatch("joint data", self.dof_count, reduced.len()));
        }
        Ok(())
    }
}
