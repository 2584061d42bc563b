//! Collision oracles
//!
//! Implementations of [`CollisionOracle`](crate::common::CollisionOracle).

pub mod obstacle_world;

pub use obstacle_world::*;
