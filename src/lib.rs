//! pose_planning - sampling-based motion planning for a rigid body in 3D
//!
//! This crate provides a vantage-point tree for nearest-neighbour search
//! over arbitrary metrics, a sphere/box collision world, and a
//! bidirectional RRT planner over position + orientation configurations.

// Core modules
pub mod common;
pub mod utils;

// Collision checking and planning
pub mod collision;
pub mod path_planning;

// Re-export common types for convenience
pub use common::{Configuration, ConfigurationPath, MobileHandle};
pub use common::{CollisionOracle, MotionPlanner};
pub use common::{PlannerError, PlannerResult};
