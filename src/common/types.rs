//! Common types used throughout pose_planning

use itertools::Itertools;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Weight of one radian of rotation against one unit of translation
/// in [`configuration_distance`].
pub const ROTATION_WEIGHT: f64 = 1.0;

/// Rigid-body pose: 3D translation plus unit-quaternion orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    pub translation: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Configuration {
    pub fn new(translation: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self { translation, orientation }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// Builds the orientation as `Rx(angles[0]) * Ry(angles[1]) * Rz(angles[2])`.
    pub fn from_euler(translation: Vector3<f64>, angles: [f64; 3]) -> Self {
        let orientation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angles[0])
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angles[1])
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles[2]);
        Self::new(translation, orientation)
    }

    /// Lerp on the translation, slerp (shortest arc) on the orientation.
    ///
    /// `t` is clamped to `[0, 1]`; the endpoints are returned unchanged.
    pub fn interpolate(&self, other: &Configuration, t: f64) -> Configuration {
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *other;
        }

        let translation = self.translation.lerp(&other.translation, t);
        let orientation = if self.orientation == other.orientation {
            self.orientation
        } else {
            self.orientation
                .try_slerp(&other.orientation, t, 1.0e-12)
                .unwrap_or(if t < 0.5 { self.orientation } else { other.orientation })
        };

        Configuration { translation, orientation }
    }

    pub fn distance(&self, other: &Configuration) -> f64 {
        configuration_distance(self, other)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::identity()
    }
}

/// Geodesic angle in `[0, pi]` of the rotation taking `a` onto `b`.
///
/// Uses the chord form `4 * atan2(|a - b|, |a + b|)` with `b` moved to the
/// same hemisphere as `a`; it is exactly zero for identical inputs and
/// exactly symmetric.
pub fn rotation_angle(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    let qa: &Quaternion<f64> = a.quaternion();
    let qb: &Quaternion<f64> = b.quaternion();
    let (diff, sum) = if qa.coords.dot(&qb.coords) < 0.0 {
        ((qa.coords + qb.coords).norm(), (qa.coords - qb.coords).norm())
    } else {
        ((qa.coords - qb.coords).norm(), (qa.coords + qb.coords).norm())
    };
    4.0 * diff.atan2(sum)
}

/// Configuration-space metric: translation distance plus weighted rotation angle.
///
/// Both terms are metrics, so the sum satisfies the triangle inequality the
/// vantage-point index relies on, and both grow linearly along
/// [`Configuration::interpolate`].
pub fn configuration_distance(a: &Configuration, b: &Configuration) -> f64 {
    let translation = (a.translation - b.translation).norm();
    translation + ROTATION_WEIGHT * rotation_angle(&a.orientation, &b.orientation)
}

/// Path represented as a sequence of configurations
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationPath {
    pub waypoints: Vec<Configuration>,
}

impl ConfigurationPath {
    pub fn new() -> Self {
        Self { waypoints: Vec::new() }
    }

    pub fn from_waypoints(waypoints: Vec<Configuration>) -> Self {
        Self { waypoints }
    }

    pub fn push(&mut self, waypoint: Configuration) {
        self.waypoints.push(waypoint);
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<&Configuration> {
        self.waypoints.first()
    }

    pub fn last(&self) -> Option<&Configuration> {
        self.waypoints.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Configuration> {
        self.waypoints.iter()
    }

    /// Consecutive waypoint pairs
    pub fn edges(&self) -> impl Iterator<Item = (&Configuration, &Configuration)> + '_ {
        self.waypoints.iter().tuple_windows()
    }

    /// Sum of [`configuration_distance`] over all edges
    pub fn total_length(&self) -> f64 {
        self.edges().map(|(a, b)| configuration_distance(a, b)).sum()
    }
}

impl Default for ConfigurationPath {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Configuration>> for ConfigurationPath {
    fn from(waypoints: Vec<Configuration>) -> Self {
        Self { waypoints }
    }
}

/// Handle of a mobile object registered with a collision oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MobileHandle(pub usize);
