// Bidirectional RRT for a rod passing through a window in a wall

use std::error::Error;

use nalgebra::{Point3, Vector3};

use pose_planning::collision::{Obstacle, ObstacleWorld, RigidBody};
use pose_planning::path_planning::{
    BidirectionalRrt, Interval, PlannerBase, PlanningBudget, RrtConnectConfig, SamplingBounds,
};
use pose_planning::Configuration;

fn window_wall() -> ObstacleWorld {
    // wall in the plane x = 0, window spanning y in [-1, 1] and z in [-0.4, 0.4]
    ObstacleWorld::with_obstacles(vec![
        Obstacle::from_corners(Point3::new(-0.1, -5.0, -5.0), Point3::new(0.1, -1.0, 5.0)),
        Obstacle::from_corners(Point3::new(-0.1, 1.0, -5.0), Point3::new(0.1, 5.0, 5.0)),
        Obstacle::from_corners(Point3::new(-0.1, -1.0, -5.0), Point3::new(0.1, 1.0, -0.4)),
        Obstacle::from_corners(Point3::new(-0.1, -1.0, 0.4), Point3::new(0.1, 1.0, 5.0)),
        Obstacle::sphere(2.5, 0.0, 0.0, 0.8),
    ])
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("RRT-Connect 6D planning start!");

    // the rod is longer than the window is tall, so it must be turned to fit
    let rod = RigidBody::rod(1.4, 0.1, 8);
    let bounds = SamplingBounds::new(
        Interval::new(-4.0, 4.0),
        Interval::new(-4.0, 4.0),
        Interval::new(-2.0, 2.0),
        Interval::new(-std::f64::consts::PI, std::f64::consts::PI),
        Interval::new(-std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2),
        Interval::new(-std::f64::consts::PI, std::f64::consts::PI),
    )?;
    let base = PlannerBase::new(window_wall(), rod, bounds, 42)?;

    let mut config = RrtConnectConfig::new(PlanningBudget::Iterations(200_000));
    config.radius = 0.5;
    config.max_spacing = 0.05;
    config.shortcut = true;
    let mut planner = BidirectionalRrt::new(base, config)?;

    let upright = [0.0, 0.0, std::f64::consts::FRAC_PI_2];
    let start = Configuration::from_euler(Vector3::new(-3.0, 0.0, 0.0), upright);
    let target = Configuration::from_euler(Vector3::new(3.0, 2.0, 1.0), upright);

    match planner.plan(start, target) {
        Ok(outcome) => {
            println!(
                "Found path with {} waypoints, length {:.3}",
                outcome.path.len(),
                outcome.path.total_length()
            );
            println!(
                "iterations: {}, tree nodes: {} + {}, rejected extensions: {}",
                outcome.stats.iterations,
                outcome.stats.start_tree_nodes,
                outcome.stats.target_tree_nodes,
                outcome.stats.extensions_rejected
            );
            println!(
                "vp-tree search: {} distance evaluations over {} nodes",
                outcome.stats.search.distance_evaluations, outcome.stats.search.nodes_visited
            );
            let checks = planner.base().stats();
            println!(
                "collision checks: {} configurations, {} edges",
                checks.configuration_checks, checks.edge_checks
            );
            for (i, waypoint) in outcome.path.iter().enumerate() {
                let (roll, pitch, yaw) = waypoint.orientation.euler_angles();
                println!(
                    "{:3}: [{:7.3}, {:7.3}, {:7.3}] rpy [{:6.3}, {:6.3}, {:6.3}]",
                    i,
                    waypoint.translation.x,
                    waypoint.translation.y,
                    waypoint.translation.z,
                    roll,
                    pitch,
                    yaw
                );
            }
        }
        Err(e) => println!("Planning failed: {}", e),
    }

    println!("Done");
    Ok(())
}
