//! Utility modules for pose_planning

pub mod vp_tree;

pub use vp_tree::{FnMetric, Metric, Nearest, SearchStats, VpTree, BUCKET_SIZE};
