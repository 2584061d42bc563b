//! Common types, traits, and error definitions for pose_planning
//!
//! This module provides the foundational building blocks shared by the
//! index, the collision world and the planners.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
