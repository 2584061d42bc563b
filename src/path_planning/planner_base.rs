//! Shared machinery of the sampling-based planners
//!
//! Configuration sampling, the configuration-space metric, the collision
//! oracle adapter and discretized edge checking.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;

use crate::common::{
    configuration_distance, CollisionOracle, Configuration, ConfigurationPath, MobileHandle,
    PlannerError, PlannerResult,
};

/// Closed sampling interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Interval { min, max }
    }

    /// Degenerate interval holding a single value
    pub fn fixed(value: f64) -> Self {
        Interval { min: value, max: value }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.sample(Uniform::new_inclusive(self.min, self.max))
    }
}

/// Sampling intervals for the six configuration coordinates.
///
/// The three angles are Euler angles about X, Y and Z; they are only used
/// to draw orientations.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingBounds {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
    pub roll: Interval,
    pub pitch: Interval,
    pub yaw: Interval,
}

impl SamplingBounds {
    pub fn new(
        x: Interval,
        y: Interval,
        z: Interval,
        roll: Interval,
        pitch: Interval,
        yaw: Interval,
    ) -> PlannerResult<Self> {
        let bounds = SamplingBounds { x, y, z, roll, pitch, yaw };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Box `[min, max]^3` with unrestricted orientation
    pub fn cube(min: f64, max: f64) -> PlannerResult<Self> {
        let full_turn = Interval::new(-std::f64::consts::PI, std::f64::consts::PI);
        Self::new(
            Interval::new(min, max),
            Interval::new(min, max),
            Interval::new(min, max),
            full_turn,
            full_turn,
            full_turn,
        )
    }

    pub fn validate(&self) -> PlannerResult<()> {
        let named = [
            ("x", &self.x),
            ("y", &self.y),
            ("z", &self.z),
            ("roll", &self.roll),
            ("pitch", &self.pitch),
            ("yaw", &self.yaw),
        ];
        for (name, interval) in named.iter() {
            if !interval.is_valid() {
                return Err(PlannerError::InvalidParameter(format!(
                    "{} interval [{}, {}] is empty or not finite",
                    name, interval.min, interval.max
                )));
            }
        }
        Ok(())
    }
}

/// Rejects edge checking resolutions that would never end the bisection
pub fn validate_spacing(max_spacing: f64) -> PlannerResult<()> {
    if max_spacing.is_finite() && max_spacing > 0.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!(
            "max_spacing must be positive, got {}",
            max_spacing
        )))
    }
}

/// Oracle calls issued by a [`PlannerBase`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionStats {
    /// Single-configuration collision queries
    pub configuration_checks: usize,
    /// Top-level edge checks
    pub edge_checks: usize,
}

/// Sampling, metric and collision checking for one mobile object
pub struct PlannerBase<O: CollisionOracle> {
    bounds: SamplingBounds,
    oracle: O,
    mobile: MobileHandle,
    rng: StdRng,
    stats: CollisionStats,
}

impl<O: CollisionOracle> PlannerBase<O> {
    /// Registers `geometry` as the mobile object with `oracle`.
    pub fn new(
        mut oracle: O,
        geometry: O::Geometry,
        bounds: SamplingBounds,
        seed: u64,
    ) -> PlannerResult<Self> {
        bounds.validate()?;
        let mobile = oracle.register_mobile_object(geometry);
        Ok(PlannerBase {
            bounds,
            oracle,
            mobile,
            rng: StdRng::seed_from_u64(seed),
            stats: CollisionStats::default(),
        })
    }

    pub fn bounds(&self) -> &SamplingBounds {
        &self.bounds
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn mobile(&self) -> MobileHandle {
        self.mobile
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CollisionStats::default();
    }

    /// Fresh seed drawn from the planner's random source
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Uniform position in the bounds, orientation composed from uniform
    /// Euler angles about X, then Y, then Z.
    pub fn random_configuration(&mut self) -> Configuration {
        let rng = &mut self.rng;
        let translation = Vector3::new(
            self.bounds.x.sample(rng),
            self.bounds.y.sample(rng),
            self.bounds.z.sample(rng),
        );
        let angles = [
            self.bounds.roll.sample(rng),
            self.bounds.pitch.sample(rng),
            self.bounds.yaw.sample(rng),
        ];
        Configuration::from_euler(translation, angles)
    }

    pub fn configuration_distance(&self, a: &Configuration, b: &Configuration) -> f64 {
        configuration_distance(a, b)
    }

    /// True if the mobile collides when placed at `configuration`
    pub fn in_collision(&mut self, configuration: &Configuration) -> bool {
        self.stats.configuration_checks += 1;
        self.oracle
            .set_pose(self.mobile, &configuration.translation, &configuration.orientation);
        self.oracle.query_collision()
    }

    /// Minimum separation between the mobile at `configuration` and the scene
    pub fn clearance(&mut self, configuration: &Configuration) -> f64 {
        self.oracle
            .set_pose(self.mobile, &configuration.translation, &configuration.orientation);
        self.oracle.query_clearance()
    }

    /// True if the straight motion from `start` to `end` is collision free,
    /// tested by recursive bisection down to `max_spacing`.
    ///
    /// The endpoints themselves are not tested. Fails with
    /// [`PlannerError::InvalidParameter`] unless `max_spacing` is positive
    /// and finite.
    pub fn is_edge_free(
        &mut self,
        start: &Configuration,
        end: &Configuration,
        max_spacing: f64,
    ) -> PlannerResult<bool> {
        validate_spacing(max_spacing)?;
        self.stats.edge_checks += 1;
        Ok(self.is_segment_free(start, end, max_spacing))
    }

    fn is_segment_free(
        &mut self,
        start: &Configuration,
        end: &Configuration,
        max_spacing: f64,
    ) -> bool {
        if configuration_distance(start, end) <= max_spacing {
            return true;
        }

        let middle = start.interpolate(end, 0.5);
        if self.in_collision(&middle) {
            return false;
        }

        self.is_segment_free(start, &middle, max_spacing)
            && self.is_segment_free(&middle, end, max_spacing)
    }

    /// Greedy shortcutting: from each kept waypoint jump to the farthest later
    /// waypoint reachable by a free straight edge.
    ///
    /// Keeps both endpoints and never adds waypoints. Every edge of the
    /// result has passed [`is_edge_free`](Self::is_edge_free); if some input
    /// edge collides and no shortcut skips it, the path is rejected with
    /// [`PlannerError::InvalidParameter`].
    pub fn optimize(
        &mut self,
        path: &ConfigurationPath,
        max_spacing: f64,
    ) -> PlannerResult<ConfigurationPath> {
        validate_spacing(max_spacing)?;
        let waypoints = &path.waypoints;
        if waypoints.len() <= 1 {
            return Ok(path.clone());
        }

        let last = waypoints.len() - 1;
        let mut optimized = vec![waypoints[0]];
        let mut current = 0;

        while current < last {
            let mut next = None;
            for candidate in ((current + 1)..=last).rev() {
                if self.is_edge_free(&waypoints[current], &waypoints[candidate], max_spacing)? {
                    next = Some(candidate);
                    break;
                }
            }
            let next = next.ok_or_else(|| {
                PlannerError::InvalidParameter(format!(
                    "path edge {} -> {} is in collision",
                    current,
                    current + 1
                ))
            })?;
            optimized.push(waypoints[next]);
            current = next;
        }

        log::debug!(
            "shortcutting reduced path from {} to {} waypoints",
            waypoints.len(),
            optimized.len()
        );
        Ok(ConfigurationPath::from_waypoints(optimized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Obstacle, ObstacleWorld, RigidBody};
    use nalgebra::Point3;

    fn empty_base(seed: u64) -> PlannerBase<ObstacleWorld> {
        PlannerBase::new(
            ObstacleWorld::new(),
            RigidBody::sphere(0.2),
            SamplingBounds::cube(-5.0, 5.0).unwrap(),
            seed,
        )
        .unwrap()
    }

    // wall across x = 0 with a window around (0, 3, 0)
    fn wall_base() -> PlannerBase<ObstacleWorld> {
        let world = ObstacleWorld::with_obstacles(vec![
            Obstacle::from_corners(Point3::new(-0.2, -5.0, -5.0), Point3::new(0.2, 2.0, 5.0)),
            Obstacle::from_corners(Point3::new(-0.2, 4.0, -5.0), Point3::new(0.2, 5.0, 5.0)),
        ]);
        let bounds = SamplingBounds::cube(-5.0, 5.0).unwrap();
        PlannerBase::new(world, RigidBody::sphere(0.2), bounds, 1).unwrap()
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let good = Interval::new(0.0, 1.0);
        let result = SamplingBounds::new(good, Interval::new(2.0, 1.0), good, good, good, good);
        assert!(matches!(result, Err(PlannerError::InvalidParameter(_))));

        let not_finite = Interval::new(0.0, f64::NAN);
        let result = SamplingBounds::new(good, good, not_finite, good, good, good);
        assert!(result.is_err());

        assert!(SamplingBounds::new(good, good, Interval::fixed(0.0), good, good, good).is_ok());
    }

    #[test]
    fn test_random_configurations_within_bounds() {
        let bounds = SamplingBounds::new(
            Interval::new(-1.0, 1.0),
            Interval::new(2.0, 3.0),
            Interval::fixed(0.5),
            Interval::fixed(0.0),
            Interval::fixed(0.0),
            Interval::new(0.0, 1.0),
        )
        .unwrap();
        let mut base =
            PlannerBase::new(ObstacleWorld::new(), RigidBody::sphere(0.1), bounds, 3).unwrap();

        for _ in 0..200 {
            let c = base.random_configuration();
            assert!(c.translation.x >= -1.0 && c.translation.x <= 1.0);
            assert!(c.translation.y >= 2.0 && c.translation.y <= 3.0);
            assert_eq!(c.translation.z, 0.5);
            // yaw only, so the rotation axis is +-Z
            let angle = c.orientation.angle();
            assert!(angle <= 1.0 + 1e-9);
            if let Some(axis) = c.orientation.axis() {
                assert!(axis.z.abs() > 1.0 - 1e-9);
            }
        }
    }

    #[test]
    fn test_sampling_is_seeded() {
        let mut a = empty_base(42);
        let mut b = empty_base(42);
        for _ in 0..10 {
            assert_eq!(a.random_configuration(), b.random_configuration());
        }
    }

    #[test]
    fn test_edge_check_respects_spacing() {
        let mut base = wall_base();
        let left = Configuration::from_translation(-2.0, 0.0, 0.0);
        let right = Configuration::from_translation(2.0, 0.0, 0.0);

        assert!(!base.in_collision(&left));
        assert!(!base.in_collision(&right));
        assert!(!base.is_edge_free(&left, &right, 0.1).unwrap());
        // coarse enough that no midpoint is ever tested
        assert!(base.is_edge_free(&left, &right, 10.0).unwrap());

        let through_window_a = Configuration::from_translation(-2.0, 3.0, 0.0);
        let through_window_b = Configuration::from_translation(2.0, 3.0, 0.0);
        assert!(base.is_edge_free(&through_window_a, &through_window_b, 0.05).unwrap());
    }

    #[test]
    fn test_collision_stats() {
        let mut base = empty_base(0);
        let a = Configuration::from_translation(0.0, 0.0, 0.0);
        let b = Configuration::from_translation(2.0, 0.0, 0.0);
        assert!(base.is_edge_free(&a, &b, 0.125).unwrap());

        // bisection of length 2 down to 1/8 tests 1 + 2 + 4 + 8 midpoints
        let stats = base.stats();
        assert_eq!(stats.edge_checks, 1);
        assert_eq!(stats.configuration_checks, 15);

        base.reset_stats();
        assert_eq!(base.stats(), CollisionStats::default());
    }

    #[test]
    fn test_clearance() {
        let mut base = wall_base();
        let c = Configuration::from_translation(-2.0, 0.0, 0.0);
        assert!((base.clearance(&c) - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_optimize_shortcuts_free_space() {
        let mut base = empty_base(0);
        let path = ConfigurationPath::from_waypoints(
            (0..6)
                .map(|i| Configuration::from_translation(i as f64, (i % 2) as f64, 0.0))
                .collect(),
        );
        let optimized = base.optimize(&path, 0.1).unwrap();
        assert_eq!(optimized.len(), 2);
        assert_eq!(optimized.first(), path.first());
        assert_eq!(optimized.last(), path.last());
    }

    #[test]
    fn test_optimize_keeps_detour_around_wall() {
        let mut base = wall_base();
        let path = ConfigurationPath::from_waypoints(vec![
            Configuration::from_translation(-2.0, 0.0, 0.0),
            Configuration::from_translation(-1.0, 1.0, 0.0),
            Configuration::from_translation(-1.0, 3.0, 0.0),
            Configuration::from_translation(1.0, 3.0, 0.0),
            Configuration::from_translation(1.0, 1.0, 0.0),
            Configuration::from_translation(2.0, 0.0, 0.0),
        ]);
        let optimized = base.optimize(&path, 0.05).unwrap();

        assert!(optimized.len() >= 3);
        assert!(optimized.len() <= path.len());
        assert_eq!(optimized.first(), path.first());
        assert_eq!(optimized.last(), path.last());
        let edges: Vec<_> = optimized.edges().map(|(a, b)| (*a, *b)).collect();
        for (a, b) in edges {
            assert!(base.is_edge_free(&a, &b, 0.05).unwrap());
        }
    }

    #[test]
    fn test_edge_check_rejects_bad_spacing() {
        let mut base = empty_base(0);
        let a = Configuration::from_translation(0.0, 0.0, 0.0);
        let b = Configuration::from_translation(1.0, 0.0, 0.0);

        for spacing in [-1.0, 0.0, f64::NAN, f64::INFINITY].iter() {
            assert!(matches!(
                base.is_edge_free(&a, &b, *spacing),
                Err(PlannerError::InvalidParameter(_))
            ));
        }
        assert_eq!(base.stats(), CollisionStats::default());

        let path = ConfigurationPath::from_waypoints(vec![a, b, a]);
        assert!(matches!(base.optimize(&path, -0.5), Err(PlannerError::InvalidParameter(_))));
    }

    #[test]
    fn test_optimize_rejects_colliding_input_edge() {
        let mut base = wall_base();
        // the middle edge crosses the solid part of the wall
        let path = ConfigurationPath::from_waypoints(vec![
            Configuration::from_translation(-2.0, 0.0, 0.0),
            Configuration::from_translation(-1.0, 0.0, 0.0),
            Configuration::from_translation(1.0, 0.0, 0.0),
            Configuration::from_translation(2.0, 0.0, 0.0),
        ]);
        assert!(matches!(base.optimize(&path, 0.05), Err(PlannerError::InvalidParameter(_))));
    }
}
