//! Bidirectional RRT path planning over rigid-body configurations
//!
//! Grows one tree from the start and one from the target. Every iteration
//! each tree is extended toward its own random sample by at most the radius
//! of the node it grows from; a freshly added node is then tested for a
//! straight, collision-free bridge to the nearest node of the other tree.
//!
//! Each tree is an append-only arena of [`TreeNode`]s indexed by a
//! [`VpTree`] of node ids. Parent links are ids into the same arena.

use std::time::Instant;

use crate::common::{
    configuration_distance, CollisionOracle, Configuration, ConfigurationPath, MotionPlanner,
    PlannerError, PlannerResult,
};
use crate::path_planning::planner_base::{validate_spacing, PlannerBase};
use crate::utils::{Metric, SearchStats, VpTree};

/// Bisection steps used to clamp a sample to a node's radius
pub const STEER_BISECTION_STEPS: usize = 32;

/// Index of a node in its tree's arena
pub type NodeId = usize;

/// Node of one RRT tree
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub configuration: Configuration,
    pub parent: Option<NodeId>,
    /// Largest step allowed when growing from this node
    pub radius: f64,
    /// Times this node was picked as nearest to a sample
    pub trials: usize,
    /// Times growing from this node succeeded
    pub successes: usize,
}

impl TreeNode {
    pub fn new(configuration: Configuration, parent: Option<NodeId>, radius: f64) -> Self {
        TreeNode {
            configuration,
            parent,
            radius,
            trials: 0,
            successes: 0,
        }
    }
}

struct NodeMetric<'a> {
    nodes: &'a [TreeNode],
}

impl Metric<NodeId> for NodeMetric<'_> {
    type Query = Configuration;

    fn distance(&self, a: &NodeId, b: &NodeId) -> f64 {
        configuration_distance(&self.nodes[*a].configuration, &self.nodes[*b].configuration)
    }

    fn query_distance(&self, item: &NodeId, query: &Configuration) -> f64 {
        configuration_distance(&self.nodes[*item].configuration, query)
    }
}

/// One side of the bidirectional search: node arena plus its nearest-neighbour index
pub struct SearchTree {
    nodes: Vec<TreeNode>,
    index: VpTree<NodeId>,
}

impl SearchTree {
    /// Tree holding only `root`
    pub fn new(root: Configuration, radius: f64, seed: u64) -> Self {
        let mut tree = SearchTree {
            nodes: Vec::new(),
            index: VpTree::with_seed(seed),
        };
        tree.insert(root, None, radius);
        tree
    }

    pub fn insert(
        &mut self,
        configuration: Configuration,
        parent: Option<NodeId>,
        radius: f64,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::new(configuration, parent, radius));
        let metric = NodeMetric { nodes: &self.nodes };
        self.index.add(id, &metric);
        id
    }

    /// Node closest to `configuration`, with the cost of finding it
    pub fn nearest(&self, configuration: &Configuration) -> Option<(NodeId, SearchStats)> {
        let metric = NodeMetric { nodes: &self.nodes };
        self.index
            .nearest_neighbour_with_stats(configuration, &metric)
            .map(|nearest| (*nearest.item, nearest.stats))
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Configurations from `id` up to the root, in that order
    pub fn branch(&self, id: NodeId) -> Vec<Configuration> {
        let mut configurations = Vec::new();
        let mut node_index = Some(id);

        while let Some(index) = node_index {
            let node = &self.nodes[index];
            configurations.push(node.configuration);
            node_index = node.parent;
        }

        configurations
    }
}

/// How long [`BidirectionalRrt::plan`] may search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanningBudget {
    /// Stop after this many growth iterations
    Iterations(usize),
    /// Stop once this instant has passed
    Deadline(Instant),
    /// Search until a path is found; never returns for an unreachable target
    Unbounded,
}

impl PlanningBudget {
    pub fn is_exhausted(&self, iterations: usize) -> bool {
        match self {
            PlanningBudget::Iterations(max) => iterations >= *max,
            PlanningBudget::Deadline(deadline) => Instant::now() >= *deadline,
            PlanningBudget::Unbounded => false,
        }
    }
}

/// Configuration for the bidirectional RRT planner
#[derive(Debug, Clone, PartialEq)]
pub struct RrtConnectConfig {
    /// Growth radius given to every new node
    pub radius: f64,
    /// Edge checking resolution, in configuration distance
    pub max_spacing: f64,
    pub budget: PlanningBudget,
    /// Shortcut the path before returning it
    pub shortcut: bool,
}

impl RrtConnectConfig {
    /// Radius 1.0, spacing 0.1, no shortcutting.
    pub fn new(budget: PlanningBudget) -> Self {
        RrtConnectConfig {
            radius: 1.0,
            max_spacing: 0.1,
            budget,
            shortcut: false,
        }
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        validate_spacing(self.max_spacing)
    }
}

/// Bookkeeping of one planning call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStatistics {
    pub iterations: usize,
    pub start_tree_nodes: usize,
    pub target_tree_nodes: usize,
    /// Samples whose clamped extension collided
    pub extensions_rejected: usize,
    /// Bridge edges tested between the two trees
    pub bridge_attempts: usize,
    /// Accumulated nearest-neighbour search work
    pub search: SearchStats,
}

/// Successful planning result
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub path: ConfigurationPath,
    pub stats: PlanStatistics,
}

/// Walks from `from` toward `toward`, stopping at distance `radius`.
///
/// The metric grows monotonically along [`Configuration::interpolate`], so
/// the largest admissible interpolation parameter is found by bisection.
pub fn steer(from: &Configuration, toward: &Configuration, radius: f64) -> Configuration {
    if configuration_distance(from, toward) <= radius {
        return *toward;
    }

    let mut low = 0.0;
    let mut high = 1.0;
    for _ in 0..STEER_BISECTION_STEPS {
        let mid = 0.5 * (low + high);
        if configuration_distance(from, &from.interpolate(toward, mid)) <= radius {
            low = mid;
        } else {
            high = mid;
        }
    }

    from.interpolate(toward, low)
}

/// Bidirectional RRT planner
pub struct BidirectionalRrt<O: CollisionOracle> {
    base: PlannerBase<O>,
    config: RrtConnectConfig,
    last_stats: PlanStatistics,
}

impl<O: CollisionOracle> BidirectionalRrt<O> {
    pub fn new(base: PlannerBase<O>, config: RrtConnectConfig) -> PlannerResult<Self> {
        config.validate()?;
        Ok(BidirectionalRrt {
            base,
            config,
            last_stats: PlanStatistics::default(),
        })
    }

    pub fn base(&self) -> &PlannerBase<O> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut PlannerBase<O> {
        &mut self.base
    }

    pub fn config(&self) -> &RrtConnectConfig {
        &self.config
    }

    pub fn set_budget(&mut self, budget: PlanningBudget) {
        self.config.budget = budget;
    }

    /// Statistics of the last [`plan`](Self::plan) call, successful or not
    pub fn last_statistics(&self) -> &PlanStatistics {
        &self.last_stats
    }

    /// Grow `tree` one step toward `sample`.
    ///
    /// Returns the id of the new node, or `None` when the clamped extension
    /// or the edge leading to it collides. `radius` is given to the new node.
    pub fn try_connect(
        &mut self,
        tree: &mut SearchTree,
        sample: &Configuration,
        radius: f64,
        max_spacing: f64,
    ) -> PlannerResult<Option<NodeId>> {
        validate_spacing(max_spacing)?;
        let (nearest, stats) = match tree.nearest(sample) {
            Some(found) => found,
            None => return Ok(None),
        };
        self.last_stats.search += stats;

        let from = {
            let node = tree.node_mut(nearest);
            node.trials += 1;
            node.clone()
        };
        let candidate = steer(&from.configuration, sample, from.radius);

        if self.base.in_collision(&candidate)
            || !self.base.is_edge_free(&from.configuration, &candidate, max_spacing)?
        {
            self.last_stats.extensions_rejected += 1;
            return Ok(None);
        }

        tree.node_mut(nearest).successes += 1;
        let id = tree.insert(candidate, Some(nearest), radius);
        log::trace!("grew node {} from {}", id, nearest);
        Ok(Some(id))
    }

    /// Nearest node of `other` reachable from `from_id` of `tree` by a free edge
    fn bridge(
        &mut self,
        tree: &SearchTree,
        from_id: NodeId,
        other: &SearchTree,
        max_spacing: f64,
    ) -> PlannerResult<Option<NodeId>> {
        let from = tree.node(from_id).configuration;
        let (nearest, stats) = match other.nearest(&from) {
            Some(found) => found,
            None => return Ok(None),
        };
        self.last_stats.search += stats;
        self.last_stats.bridge_attempts += 1;

        let free = self
            .base
            .is_edge_free(&from, &other.node(nearest).configuration, max_spacing)?;
        Ok(if free { Some(nearest) } else { None })
    }

    /// Plan a path from `start` to `target`.
    ///
    /// Fails immediately, before any tree exists, when either endpoint
    /// collides, and with [`PlannerError::BudgetExhausted`] when the budget
    /// runs out.
    pub fn plan(
        &mut self,
        start: Configuration,
        target: Configuration,
    ) -> PlannerResult<PlanOutcome> {
        self.last_stats = PlanStatistics::default();

        if self.base.in_collision(&start) {
            log::warn!("start configuration {:?} is in collision", start.translation);
            return Err(PlannerError::StartInCollision);
        }
        if self.base.in_collision(&target) {
            log::warn!("target configuration {:?} is in collision", target.translation);
            return Err(PlannerError::TargetInCollision);
        }

        let radius = self.config.radius;
        let max_spacing = self.config.max_spacing;
        let mut start_tree = SearchTree::new(start, radius, self.base.next_seed());
        let mut target_tree = SearchTree::new(target, radius, self.base.next_seed());

        let mut iterations = 0;
        loop {
            self.last_stats.start_tree_nodes = start_tree.len();
            self.last_stats.target_tree_nodes = target_tree.len();

            if self.config.budget.is_exhausted(iterations) {
                log::debug!(
                    "planning budget exhausted after {} iterations ({} + {} nodes)",
                    iterations,
                    start_tree.len(),
                    target_tree.len()
                );
                return Err(PlannerError::BudgetExhausted { iterations });
            }
            iterations += 1;
            self.last_stats.iterations = iterations;

            let start_sample = self.base.random_configuration();
            let target_sample = self.base.random_configuration();
            let grown_start =
                self.try_connect(&mut start_tree, &start_sample, radius, max_spacing)?;
            let grown_target =
                self.try_connect(&mut target_tree, &target_sample, radius, max_spacing)?;

            if let Some(start_id) = grown_start {
                let bridged = self.bridge(&start_tree, start_id, &target_tree, max_spacing)?;
                if let Some(target_id) = bridged {
                    return Ok(self.finish(&start_tree, start_id, &target_tree, target_id));
                }
            }
            if let Some(target_id) = grown_target {
                let bridged = self.bridge(&target_tree, target_id, &start_tree, max_spacing)?;
                if let Some(start_id) = bridged {
                    return Ok(self.finish(&start_tree, start_id, &target_tree, target_id));
                }
            }
        }
    }

    fn finish(
        &mut self,
        start_tree: &SearchTree,
        start_id: NodeId,
        target_tree: &SearchTree,
        target_id: NodeId,
    ) -> PlanOutcome {
        self.last_stats.start_tree_nodes = start_tree.len();
        self.last_stats.target_tree_nodes = target_tree.len();

        let mut waypoints = start_tree.branch(start_id);
        waypoints.reverse();
        waypoints.extend(target_tree.branch(target_id));
        let mut path = ConfigurationPath::from_waypoints(waypoints);

        log::info!(
            "path found after {} iterations: {} waypoints, {} + {} tree nodes",
            self.last_stats.iterations,
            path.len(),
            start_tree.len(),
            target_tree.len()
        );

        if self.config.shortcut {
            match self.base.optimize(&path, self.config.max_spacing) {
                Ok(shortened) => path = shortened,
                Err(e) => log::warn!("keeping unshortened path: {}", e),
            }
        }

        PlanOutcome {
            path,
            stats: self.last_stats,
        }
    }
}

impl<O: CollisionOracle> MotionPlanner for BidirectionalRrt<O> {
    fn find_path(
        &mut self,
        start: Configuration,
        target: Configuration,
    ) -> PlannerResult<ConfigurationPath> {
        self.plan(start, target).map(|outcome| outcome.path)
    }
}
