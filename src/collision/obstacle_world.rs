//! Sphere/box obstacle world
//!
//! A small collision oracle: static obstacles are spheres and axis-aligned
//! boxes, mobile objects are rigid sets of spheres. Every query is answered
//! from signed distances, so collision and clearance always agree.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use crate::common::{CollisionOracle, MobileHandle};

/// Static obstacle
#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    Sphere { center: Point3<f64>, radius: f64 },
    /// Axis-aligned box
    Cuboid { center: Point3<f64>, half_extents: Vector3<f64> },
}

impl Obstacle {
    pub fn sphere(x: f64, y: f64, z: f64, radius: f64) -> Self {
        Obstacle::Sphere {
            center: Point3::new(x, y, z),
            radius,
        }
    }

    pub fn cuboid(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Obstacle::Cuboid { center, half_extents }
    }

    /// Box spanning the two corners
    pub fn from_corners(min: Point3<f64>, max: Point3<f64>) -> Self {
        Obstacle::Cuboid {
            center: nalgebra::center(&min, &max),
            half_extents: (max - min).abs() * 0.5,
        }
    }

    /// Signed distance from `p` to the obstacle surface, negative inside
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        match self {
            Obstacle::Sphere { center, radius } => (p - center).norm() - radius,
            Obstacle::Cuboid { center, half_extents } => {
                let q = (p - center).abs() - half_extents;
                let outside = q.map(|v| v.max(0.0)).norm();
                let inside = q.max().min(0.0);
                outside + inside
            }
        }
    }
}

/// Sphere in the body frame of a mobile object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

/// Mobile geometry approximated by a union of spheres
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RigidBody {
    pub spheres: Vec<BodySphere>,
}

impl RigidBody {
    /// Single sphere at the body origin
    pub fn sphere(radius: f64) -> Self {
        Self::default().with_sphere(Point3::origin(), radius)
    }

    /// `count` spheres evenly spaced along the body x axis, centred on the origin
    pub fn rod(length: f64, radius: f64, count: usize) -> Self {
        let count = count.max(1);
        let spheres = (0..count)
            .map(|i| {
                let x = if count == 1 {
                    0.0
                } else {
                    -0.5 * length + length * i as f64 / (count - 1) as f64
                };
                BodySphere {
                    center: Point3::new(x, 0.0, 0.0),
                    radius,
                }
            })
            .collect();
        Self { spheres }
    }

    pub fn with_sphere(mut self, center: Point3<f64>, radius: f64) -> Self {
        self.spheres.push(BodySphere { center, radius });
        self
    }
}

#[derive(Debug, Clone)]
struct Mobile {
    body: RigidBody,
    /// `None` until the first `set_pose`
    pose: Option<Isometry3<f64>>,
}

impl Mobile {
    fn world_spheres(&self) -> Vec<(Point3<f64>, f64)> {
        match &self.pose {
            Some(pose) => self
                .body
                .spheres
                .iter()
                .map(|s| (pose * s.center, s.radius))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Collision oracle over static spheres/boxes and sphere-set mobiles
#[derive(Debug, Clone, Default)]
pub struct ObstacleWorld {
    obstacles: Vec<Obstacle>,
    mobiles: Vec<Mobile>,
    active: Option<usize>,
}

impl ObstacleWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obstacles(obstacles: Vec<Obstacle>) -> Self {
        Self {
            obstacles,
            ..Self::default()
        }
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn mobile_count(&self) -> usize {
        self.mobiles.len()
    }

    fn clearance_of(&self, index: usize) -> f64 {
        let spheres = self.mobiles[index].world_spheres();
        let mut clearance = f64::INFINITY;

        for (center, radius) in &spheres {
            for obstacle in &self.obstacles {
                clearance = clearance.min(obstacle.signed_distance(center) - radius);
            }
        }

        for (other_index, other) in self.mobiles.iter().enumerate() {
            if other_index == index {
                continue;
            }
            for (other_center, other_radius) in other.world_spheres() {
                for (center, radius) in &spheres {
                    let gap = (center - other_center).norm() - radius - other_radius;
                    clearance = clearance.min(gap);
                }
            }
        }

        clearance
    }
}

impl CollisionOracle for ObstacleWorld {
    type Geometry = RigidBody;

    fn register_mobile_object(&mut self, geometry: RigidBody) -> MobileHandle {
        self.mobiles.push(Mobile { body: geometry, pose: None });
        MobileHandle(self.mobiles.len() - 1)
    }

    /// # Panics
    ///
    /// Panics if `handle` was not returned by this world.
    fn set_pose(
        &mut self,
        handle: MobileHandle,
        translation: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
    ) {
        let mobile = &mut self.mobiles[handle.0];
        mobile.pose = Some(Isometry3::from_parts(Translation3::from(*translation), *orientation));
        self.active = Some(handle.0);
    }

    fn query_collision(&self) -> bool {
        self.query_clearance() <= 0.0
    }

    fn query_clearance(&self) -> f64 {
        self.active.map_or(f64::INFINITY, |index| self.clearance_of(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn place(world: &mut ObstacleWorld, handle: MobileHandle, x: f64, y: f64, z: f64, yaw: f64) {
        world.set_pose(
            handle,
            &Vector3::new(x, y, z),
            &UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        );
    }

    #[test]
    fn test_cuboid_signed_distance() {
        let cuboid =
            Obstacle::from_corners(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let outside = cuboid.signed_distance(&Point3::new(3.0, 0.0, 0.0));
        assert_abs_diff_eq!(outside, 2.0, epsilon = 1e-12);
        let inside = cuboid.signed_distance(&Point3::new(0.0, 0.5, 0.0));
        assert_abs_diff_eq!(inside, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(
            cuboid.signed_distance(&Point3::new(2.0, 2.0, 1.0)),
            2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sphere_collision_and_clearance() {
        let mut world = ObstacleWorld::with_obstacles(vec![Obstacle::sphere(5.0, 0.0, 0.0, 1.0)]);
        let robot = world.register_mobile_object(RigidBody::sphere(0.5));

        place(&mut world, robot, 0.0, 0.0, 0.0, 0.0);
        assert!(!world.query_collision());
        assert_abs_diff_eq!(world.query_clearance(), 3.5, epsilon = 1e-12);

        place(&mut world, robot, 4.0, 0.0, 0.0, 0.0);
        assert!(world.query_collision());
        assert!(world.query_clearance() < 0.0);
    }

    #[test]
    fn test_orientation_matters_for_rods() {
        // a thin wall at x = 1 with the rod centred at the origin
        let mut world = ObstacleWorld::with_obstacles(vec![Obstacle::from_corners(
            Point3::new(1.0, -5.0, -5.0),
            Point3::new(1.2, 5.0, 5.0),
        )]);
        let rod = world.register_mobile_object(RigidBody::rod(3.0, 0.1, 7));

        place(&mut world, rod, 0.0, 0.0, 0.0, 0.0);
        assert!(world.query_collision());

        place(&mut world, rod, 0.0, 0.0, 0.0, FRAC_PI_2);
        assert!(!world.query_collision());
    }

    #[test]
    fn test_mobiles_see_each_other() {
        let mut world = ObstacleWorld::new();
        let a = world.register_mobile_object(RigidBody::sphere(1.0));
        let b = world.register_mobile_object(RigidBody::sphere(1.0));
        assert_eq!(world.mobile_count(), 2);

        // b has no pose yet, so it is not in the scene
        place(&mut world, a, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(world.query_clearance(), f64::INFINITY);

        place(&mut world, b, 1.5, 0.0, 0.0, 0.0);
        assert!(world.query_collision());

        place(&mut world, b, 3.0, 0.0, 0.0, 0.0);
        assert!(!world.query_collision());
        assert_abs_diff_eq!(world.query_clearance(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_active_mobile() {
        let world = ObstacleWorld::with_obstacles(vec![Obstacle::sphere(0.0, 0.0, 0.0, 1.0)]);
        assert!(!world.query_collision());
        assert_eq!(world.query_clearance(), f64::INFINITY);
    }
}
