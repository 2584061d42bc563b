//! Common traits defining interfaces for the planners and their collaborators

use nalgebra::{UnitQuaternion, Vector3};

use crate::common::error::PlannerResult;
use crate::common::types::*;

/// Trait for motion planning algorithms over rigid-body configurations
pub trait MotionPlanner {
    /// Plan a path from start to target
    fn find_path(&mut self, start: Configuration, target: Configuration)
        -> PlannerResult<ConfigurationPath>;
}

/// Boundary to an external collision-detection library.
///
/// Queries always refer to the mobile object whose pose was set last.
pub trait CollisionOracle {
    /// Shape description accepted when registering a mobile object
    type Geometry;

    /// Register a mobile object and return its handle
    fn register_mobile_object(&mut self, geometry: Self::Geometry) -> MobileHandle;

    /// Place a mobile object; must be called before every query
    fn set_pose(
        &mut self,
        handle: MobileHandle,
        translation: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
    );

    /// True if the mobile intersects any static or other dynamic geometry
    fn query_collision(&self) -> bool;

    /// Minimum separation between the mobile and everything else
    fn query_clearance(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    // A single half-space `z < 0` is solid
    struct Floor {
        height: f64,
    }

    impl CollisionOracle for Floor {
        type Geometry = ();

        fn register_mobile_object(&mut self, _geometry: ()) -> MobileHandle {
            MobileHandle(0)
        }

        fn set_pose(
            &mut self,
            _handle: MobileHandle,
            translation: &Vector3<f64>,
            _orientation: &UnitQuaternion<f64>,
        ) {
            self.height = translation.z;
        }

        fn query_collision(&self) -> bool {
            self.height < 0.0
        }

        fn query_clearance(&self) -> f64 {
            self.height
        }
    }

    #[test]
    fn test_collision_oracle_trait() {
        let mut floor = Floor { height: 0.0 };
        let handle = floor.register_mobile_object(());
        floor.set_pose(handle, &Vector3::new(0.0, 0.0, -1.0), &UnitQuaternion::identity());
        assert!(floor.query_collision());
        floor.set_pose(handle, &Vector3::new(0.0, 0.0, 2.0), &UnitQuaternion::identity());
        assert!(!floor.query_collision());
        assert_eq!(floor.query_clearance(), 2.0);
    }
}
