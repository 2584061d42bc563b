//! Vantage-point tree for nearest-neighbour queries in a metric space
//!
//! Elements are kept in leaf buckets. A full bucket splits around the
//! median distance to the node's centroid; searches prune subtrees with the
//! triangle inequality. Online insertion is balanced out by rebuilding the
//! whole tree in random order every time the element count doubles.
//!
//! The distance strategy is not stored in the tree but passed to every call,
//! so a metric may borrow storage that keeps growing between calls.

use std::marker::PhantomData;
use std::ops::AddAssign;

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Maximum number of elements held by a leaf before it splits
pub const BUCKET_SIZE: usize = 16;

const DEFAULT_SEED: u64 = 0x5eed;

/// Distance strategy for a [`VpTree`].
///
/// `distance` compares two stored elements, `query_distance` compares a stored
/// element with a search key. Both must agree and satisfy the triangle
/// inequality, otherwise pruned searches may miss the true nearest element.
pub trait Metric<T> {
    /// Search key type
    type Query: ?Sized;

    fn distance(&self, a: &T, b: &T) -> f64;

    fn query_distance(&self, item: &T, query: &Self::Query) -> f64;
}

/// [`Metric`] built from two closures
pub struct FnMetric<D, S, Q: ?Sized> {
    data: D,
    search: S,
    _query: PhantomData<fn(&Q)>,
}

impl<D, S, Q: ?Sized> FnMetric<D, S, Q> {
    pub fn new<T>(data: D, search: S) -> Self
    where
        D: Fn(&T, &T) -> f64,
        S: Fn(&T, &Q) -> f64,
    {
        Self { data, search, _query: PhantomData }
    }
}

impl<T, D, S, Q> Metric<T> for FnMetric<D, S, Q>
where
    D: Fn(&T, &T) -> f64,
    S: Fn(&T, &Q) -> f64,
    Q: ?Sized,
{
    type Query = Q;

    fn distance(&self, a: &T, b: &T) -> f64 {
        (self.data)(a, b)
    }

    fn query_distance(&self, item: &T, query: &Q) -> f64 {
        (self.search)(item, query)
    }
}

/// Work done by one or more nearest-neighbour searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes_visited: usize,
    pub distance_evaluations: usize,
    pub subtrees_pruned: usize,
}

impl AddAssign for SearchStats {
    fn add_assign(&mut self, other: Self) {
        self.nodes_visited += other.nodes_visited;
        self.distance_evaluations += other.distance_evaluations;
        self.subtrees_pruned += other.subtrees_pruned;
    }
}

/// Result of [`VpTree::nearest_neighbour_with_stats`]
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a, T> {
    pub item: &'a T,
    pub distance: f64,
    pub stats: SearchStats,
}

enum NodeKind<T> {
    Leaf(Vec<T>),
    Split {
        limit: f64,
        left: Box<VpNode<T>>,
        right: Box<VpNode<T>>,
    },
}

struct VpNode<T> {
    centroid: T,
    /// Largest distance from `centroid` to anything inserted below this node
    radius: f64,
    kind: NodeKind<T>,
}

impl<T: Clone> VpNode<T> {
    fn leaf(value: T) -> Self {
        VpNode {
            centroid: value.clone(),
            radius: 0.0,
            kind: NodeKind::Leaf(vec![value]),
        }
    }

    fn insert<M: Metric<T>>(&mut self, value: T, metric: &M) {
        let d = metric.distance(&self.centroid, &value);
        if d > self.radius {
            self.radius = d;
        }

        let full = match &mut self.kind {
            NodeKind::Split { limit, left, right } => {
                if d <= *limit {
                    left.insert(value, metric);
                } else {
                    right.insert(value, metric);
                }
                false
            }
            NodeKind::Leaf(bucket) => {
                bucket.push(value);
                bucket.len() >= BUCKET_SIZE && bucket.len() % BUCKET_SIZE == 0
            }
        };

        if full {
            self.split(metric);
        }
    }

    fn split<M: Metric<T>>(&mut self, metric: &M) {
        let bucket = match std::mem::replace(&mut self.kind, NodeKind::Leaf(Vec::new())) {
            NodeKind::Leaf(bucket) if bucket.len() >= 2 => bucket,
            kind => {
                self.kind = kind;
                return;
            }
        };

        let centroid = &self.centroid;
        let mut sorted: Vec<(OrderedFloat<f64>, T)> = bucket
            .into_iter()
            .map(|value| (OrderedFloat(metric.distance(centroid, &value)), value))
            .collect();
        sorted.sort_by_key(|(d, _)| *d);

        // every element sits at the same distance, so no limit separates them
        if sorted[0].0 == sorted[sorted.len() - 1].0 {
            self.kind = NodeKind::Leaf(sorted.into_iter().map(|(_, value)| value).collect());
            return;
        }

        let limit = sorted[BUCKET_SIZE.min(sorted.len()) / 2 - 1].0.into_inner();
        let last = sorted.len() - 1;
        let mut left = VpNode::leaf(sorted[0].1.clone());
        let mut right = VpNode::leaf(sorted[last].1.clone());

        for (i, (d, value)) in sorted.into_iter().enumerate() {
            if i == 0 || i == last {
                continue;
            }
            if d.into_inner() <= limit {
                left.insert(value, metric);
            } else {
                right.insert(value, metric);
            }
        }

        self.kind = NodeKind::Split {
            limit,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    fn collect_into(self, out: &mut Vec<T>) {
        match self.kind {
            NodeKind::Leaf(bucket) => out.extend(bucket),
            NodeKind::Split { left, right, .. } => {
                left.collect_into(out);
                right.collect_into(out);
            }
        }
    }
}

impl<T> VpNode<T> {
    fn search<'a, M: Metric<T>>(&'a self, query: &M::Query, metric: &M, best: &mut Best<'a, T>) {
        best.stats.nodes_visited += 1;
        best.stats.distance_evaluations += 1;
        let d = metric.query_distance(&self.centroid, query);
        if d > self.radius + best.distance {
            best.stats.subtrees_pruned += 1;
            return;
        }

        match &self.kind {
            NodeKind::Leaf(bucket) => {
                for item in bucket {
                    best.stats.distance_evaluations += 1;
                    let di = metric.query_distance(item, query);
                    if di < best.distance {
                        best.distance = di;
                        best.item = Some(item);
                    }
                }
            }
            NodeKind::Split { limit, left, right } => {
                if d <= *limit {
                    left.search(query, metric, best);
                    if d + best.distance >= *limit {
                        right.search(query, metric, best);
                    }
                } else {
                    right.search(query, metric, best);
                    if d - best.distance <= *limit {
                        left.search(query, metric, best);
                    }
                }
            }
        }
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a T>) {
        match &self.kind {
            NodeKind::Leaf(bucket) => out.extend(bucket.iter()),
            NodeKind::Split { left, right, .. } => {
                left.visit(out);
                right.visit(out);
            }
        }
    }

    fn depth(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(_) => 1,
            NodeKind::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Checks the radius and limit bounds of every node against its elements.
    #[cfg(test)]
    fn check_bounds<M: Metric<T>>(&self, metric: &M) -> bool {
        let mut elements = Vec::new();
        self.visit(&mut elements);
        let covered = elements
            .iter()
            .all(|e| metric.distance(&self.centroid, e) <= self.radius + 1e-12);

        match &self.kind {
            NodeKind::Leaf(bucket) => covered && (bucket.len() < BUCKET_SIZE || self.radius == 0.0),
            NodeKind::Split { limit, left, right } => {
                let mut below = Vec::new();
                left.visit(&mut below);
                let mut above = Vec::new();
                right.visit(&mut above);
                covered
                    && below.iter().all(|e| metric.distance(&self.centroid, e) <= *limit)
                    && above.iter().all(|e| metric.distance(&self.centroid, e) > *limit)
                    && left.check_bounds(metric)
                    && right.check_bounds(metric)
            }
        }
    }
}

struct Best<'a, T> {
    item: Option<&'a T>,
    distance: f64,
    stats: SearchStats,
}

/// Incrementally built vantage-point tree.
///
/// A bucket whose elements are all equidistant from its centroid (a run of
/// duplicates) is never split; it stays a single leaf and grows past
/// [`BUCKET_SIZE`].
///
/// Not `Clone`: the tree has a single owner and can only be moved.
pub struct VpTree<T> {
    root: Option<Box<VpNode<T>>>,
    len: usize,
    next_rebuild: usize,
    rebuilds: usize,
    rng: StdRng,
}

impl<T: Clone> VpTree<T> {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Tree whose rebuild shuffles are driven by `seed`
    pub fn with_seed(seed: u64) -> Self {
        VpTree {
            root: None,
            len: 0,
            next_rebuild: 2 * BUCKET_SIZE,
            rebuilds: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Insert `value`, rebuilding the tree when the element count has doubled
    /// since the last rebuild.
    pub fn add<M: Metric<T>>(&mut self, value: T, metric: &M) {
        self.insert(value, metric);
        if self.len >= self.next_rebuild {
            self.reorganize(metric);
        }
    }

    fn insert<M: Metric<T>>(&mut self, value: T, metric: &M) {
        if let Some(root) = self.root.as_mut() {
            root.insert(value, metric);
        } else {
            self.root = Some(Box::new(VpNode::leaf(value)));
        }
        self.len += 1;
    }

    /// Flatten the tree and re-insert every element in random order.
    pub fn reorganize<M: Metric<T>>(&mut self, metric: &M) {
        let mut elements = Vec::with_capacity(self.len);
        if let Some(root) = self.root.take() {
            root.collect_into(&mut elements);
        }
        elements.shuffle(&mut self.rng);

        self.len = 0;
        for value in elements {
            self.insert(value, metric);
        }
        self.rebuilds += 1;
        self.next_rebuild = (2 * self.len).max(2 * BUCKET_SIZE);

        log::debug!(
            "vp-tree rebuilt: {} elements, depth {}, next rebuild at {}",
            self.len,
            self.depth(),
            self.next_rebuild
        );
    }
}

impl<T> VpTree<T> {
    /// Closest stored element to `query`, or `None` if the tree is empty
    pub fn nearest_neighbour<M: Metric<T>>(&self, query: &M::Query, metric: &M) -> Option<&T> {
        self.nearest_neighbour_with_stats(query, metric).map(|nearest| nearest.item)
    }

    /// Like [`nearest_neighbour`](Self::nearest_neighbour), also reporting the
    /// distance found and the work the search did.
    pub fn nearest_neighbour_with_stats<M: Metric<T>>(
        &self,
        query: &M::Query,
        metric: &M,
    ) -> Option<Nearest<'_, T>> {
        let root = self.root.as_ref()?;
        let mut best = Best {
            item: None,
            distance: f64::INFINITY,
            stats: SearchStats::default(),
        };
        root.search(query, metric, &mut best);

        let distance = best.distance;
        let stats = best.stats;
        best.item.map(|item| Nearest { item, distance, stats })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of node levels on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.depth())
    }

    /// Number of rebuilds done so far
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Every stored element, in leaf order
    pub fn elements(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            root.visit(&mut out);
        }
        out
    }
}

impl<T: Clone> Default for VpTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
