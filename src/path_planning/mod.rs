// Path planning over rigid-body configurations

pub mod planner_base;
pub mod rrt_connect;

pub use planner_base::*;
pub use rrt_connect::*;
