//! One-dimensional rows supplied from outside the articulation, such as
//! contacts and user constraints, solved inside the same tree sweep as the
//! joint rows.

use nalgebra::Vector3;

use super::{CFM, ConstraintSet, LinkRows, MIN_RESPONSE};
use crate::spatial::{SpatialVector, spatial};
use crate::topology::Topology;
use crate::types::{ArticulationData, Warning, WarningTable};

/// A row acting on one link, expressed at the link's centre of mass.
///
/// The row drives `jacobian · v_link` toward `velocity_target +
/// bias_velocity` with an accumulated impulse kept in
/// `[min_impulse, max_impulse]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalConstraint {
    /// Link the row acts on.
    pub link: usize,
    /// Row direction `[angular; linear]` at the link's centre of mass.
    pub jacobian: SpatialVector,
    /// Desired row velocity.
    pub velocity_target: f64,
    /// Extra velocity that corrects position error. Only its negative
    /// (separating) part is kept during velocity iterations.
    pub bias_velocity: f64,
    /// Lower bound on the accumulated impulse.
    pub min_impulse: f64,
    /// Upper bound on the accumulated impulse.
    pub max_impulse: f64,
    /// Impulse applied during the last step.
    pub applied_impulse: f64,
    pub(crate) delta_v: SpatialVector,
    pub(crate) response: f64,
    pub(crate) recip_response: f64,
}

impl ExternalConstraint {
    /// An unbounded row with zero target.
    #[must_use]
    pub fn new(link: usize, jacobian: SpatialVector) -> Self {
        Self {
            link,
            jacobian,
            velocity_target: 0.0,
            bias_velocity: 0.0,
            min_impulse: f64::NEG_INFINITY,
            max_impulse: f64::INFINITY,
            applied_impulse: 0.0,
            delta_v: SpatialVector::zeros(),
            response: 0.0,
            recip_response: 0.0,
        }
    }

    /// A non-penetration contact on `link`.
    ///
    /// `lever` is the contact point minus the link's centre of mass and
    /// `normal` points away from the obstacle. A positive `separation`
    /// adds the velocity that closes it in one `dt`; a negative one
    /// (penetration) pushes out with the same rate.
    #[must_use]
    pub fn contact(link: usize, lever: Vector3<f64>, normal: Vector3<f64>, separation: f64, dt: f64) -> Self {
        let n = normal.normalize();
        let mut row = Self::new(link, spatial(&lever.cross(&n), &n));
        row.min_impulse = 0.0;
        row.bias_velocity = -separation / dt;
        row
    }

    /// Set the target velocity.
    #[must_use]
    pub fn with_target(mut self, velocity_target: f64) -> Self {
        self.velocity_target = velocity_target;
        self
    }

    /// Set the position-error bias velocity.
    #[must_use]
    pub fn with_bias(mut self, bias_velocity: f64) -> Self {
        self.bias_velocity = bias_velocity;
        self
    }

    /// Set the accumulated impulse bounds.
    #[must_use]
    pub fn with_bounds(mut self, min_impulse: f64, max_impulse: f64) -> Self {
        self.min_impulse = min_impulse;
        self.max_impulse = max_impulse;
        self
    }

    /// Unit response of the last setup.
    #[must_use]
    pub fn response(&self) -> f64 {
        self.response
    }

    /// Solve once against the link's current velocity, updating the link
    /// velocity, its delta velocity and its `Z` accumulator.
    pub(crate) fn solve(
        &mut self,
        link_v: &mut SpatialVector,
        link_dv: &mut SpatialVector,
        z: &mut SpatialVector,
        velocity_iteration: bool,
    ) {
        if self.recip_response == 0.0 {
            return;
        }
        let bias = if velocity_iteration {
            self.bias_velocity.min(0.0)
        } else {
            self.bias_velocity
        };
        let v = self.jacobian.dot(link_v);
        let delta = (self.velocity_target + bias - v) * self.recip_response;
        let total = (self.applied_impulse + delta).clamp(self.min_impulse, self.max_impulse);
        let delta = total - self.applied_impulse;
        if delta == 0.0 {
            return;
        }
        self.applied_impulse = total;
        *link_v += self.delta_v * delta;
        *link_dv += self.delta_v * delta;
        *z -= self.jacobian * delta;
    }
}

/// Sort queued rows by link, compute their responses and record each
/// link's row range.
pub(crate) fn prepare(
    constraints: &mut ConstraintSet,
    topology: &Topology,
    data: &ArticulationData,
    warnings: &mut WarningTable,
) {
    constraints.external.sort_by_key(|c| c.link);
    let mut start = 0;
    for link in 0..topology.len() {
        let mut end = start;
        while end < constraints.external.len() && constraints.external[end].link == link {
            let row = &mut constraints.external[end];
            row.applied_impulse = 0.0;
            row.delta_v = data.response[link] * row.jacobian;
            row.response = row.jacobian.dot(&row.delta_v);
            row.recip_response = if row.response > MIN_RESPONSE {
                1.0 / (row.response + CFM)
            } else {
                warnings.record_at(Warning::DegenerateResponse, link);
                0.0
            };
            end += 1;
        }
        let rows: &mut LinkRows = &mut constraints.rows[link];
        rows.external = (start, end);
        start = end;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_contact_only_pushes() {
        let mut row = ExternalConstraint::contact(1, Vector3::zeros(), Vector3::z(), 0.0, 0.01);
        row.delta_v = SpatialVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        row.response = 1.0;
        row.recip_response = 1.0;

        // Approaching at 2 m/s: the row stops the approach.
        let mut v = SpatialVector::new(0.0, 0.0, 0.0, 0.0, 0.0, -2.0);
        let mut dv = SpatialVector::zeros();
        let mut z = SpatialVector::zeros();
        row.solve(&mut v, &mut dv, &mut z, false);
        assert_relative_eq!(v[5], 0.0, epsilon = 1e-12);
        assert_relative_eq!(row.applied_impulse, 2.0, epsilon = 1e-12);
        assert_relative_eq!(z[5], -2.0, epsilon = 1e-12);

        // Separating: the accumulated impulse may shrink to zero but not pull.
        let mut v = SpatialVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 5.0);
        row.solve(&mut v, &mut dv, &mut z, false);
        assert_relative_eq!(row.applied_impulse, 0.0);
        assert_relative_eq!(v[5], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_iterations_drop_positive_bias() {
        let mut row = ExternalConstraint::new(0, SpatialVector::ith(3, 1.0)).with_bias(1.0);
        row.delta_v = SpatialVector::ith(3, 1.0);
        row.recip_response = 1.0;
        let mut v = SpatialVector::zeros();
        let (mut dv, mut z) = (SpatialVector::zeros(), SpatialVector::zeros());
        row.solve(&mut v, &mut dv, &mut z, true);
        assert_eq!(row.applied_impulse, 0.0);
        row.solve(&mut v, &mut dv, &mut z, false);
        assert_relative_eq!(v[3], 1.0, epsilon = 1e-12);
    }
}
