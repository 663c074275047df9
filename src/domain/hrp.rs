//! Hierarchical risk parity.
//!
//! 1. Correlation distance `d_ij = sqrt((1 - corr_ij) / 2)`.
//! 2. Single-linkage agglomerative clustering into a [`ClusterTree`].
//! 3. Quasi-diagonal leaf order (left subtree first).
//! 4. Recursive bisection of that order into contiguous halves, splitting
//!    weight by inverse cluster variance.
//!
//! Both trees are arenas of immutable nodes; weight assignment is a pure
//! traversal that returns a fresh vector in the original asset order.

use crate::domain::estimators::correlation;
use crate::domain::solver::Solution;
use ndarray::{Array1, Array2};
use serde::Serialize;

/// Floor for asset and cluster variances in the bisection step.
pub const VARIANCE_FLOOR: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    /// Leaf indices under this node, in left-to-right order.
    pub members: Vec<usize>,
    /// Arena indices of the (left, right) children; `None` for leaves.
    pub children: Option<(usize, usize)>,
    /// Merge height; zero for leaves.
    pub distance: f64,
}

/// One merge step in scipy linkage layout: cluster ids `< n` are leaves,
/// id `n + k` is the cluster formed at step `k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkageRow {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    root: usize,
}

impl ClusterTree {
    /// Single-linkage clustering over a symmetric distance matrix.
    ///
    /// Leaves occupy arena slots `0..n`; merge `k` lands in slot `n + k` with
    /// the lower id as its left child. Ties go to the first pair in
    /// row-major order.
    pub fn single_linkage(distance: &Array2<f64>) -> Self {
        let n = distance.nrows();
        let mut nodes: Vec<ClusterNode> = (0..n)
            .map(|i| ClusterNode {
                members: vec![i],
                children: None,
                distance: 0.0,
            })
            .collect();
        if n == 0 {
            return Self { nodes, root: 0 };
        }

        let mut active: Vec<usize> = (0..n).collect();
        while active.len() > 1 {
            let mut best = (0, 1, f64::INFINITY);
            for a in 0..active.len() {
                for b in (a + 1)..active.len() {
                    let d = cluster_distance(
                        distance,
                        &nodes[active[a]].members,
                        &nodes[active[b]].members,
                    );
                    if d < best.2 {
                        best = (a, b, d);
                    }
                }
            }

            let (a, b, d) = best;
            let (left, right) = {
                let (x, y) = (active[a], active[b]);
                (x.min(y), x.max(y))
            };
            let mut members = nodes[left].members.clone();
            members.extend_from_slice(&nodes[right].members);
            nodes.push(ClusterNode {
                members,
                children: Some((left, right)),
                distance: if d.is_finite() { d } else { 0.0 },
            });

            let merged = nodes.len() - 1;
            active.remove(b);
            active.remove(a);
            active.push(merged);
        }

        let root = nodes.len() - 1;
        Self { nodes, root }
    }

    /// Binary tree splitting `order` into contiguous halves (`len / 2`)
    /// until every node holds one asset.
    pub fn bisection(order: &[usize]) -> Self {
        let mut nodes = Vec::new();
        let root = Self::push_bisected(&mut nodes, order);
        Self { nodes, root }
    }

    fn push_bisected(nodes: &mut Vec<ClusterNode>, items: &[usize]) -> usize {
        let children = if items.len() > 1 {
            let mid = items.len() / 2;
            let left = Self::push_bisected(nodes, &items[..mid]);
            let right = Self::push_bisected(nodes, &items[mid..]);
            Some((left, right))
        } else {
            None
        };
        nodes.push(ClusterNode {
            members: items.to_vec(),
            children,
            distance: 0.0,
        });
        nodes.len() - 1
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&ClusterNode> {
        self.nodes.get(self.root)
    }

    pub fn leaf_count(&self) -> usize {
        self.root().map_or(0, |r| r.members.len())
    }

    /// Leaves reached by expanding each cluster into (left, right) from the
    /// root down, so correlated assets end up adjacent.
    pub fn quasi_diagonal_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.leaf_count());
        if self.nodes.is_empty() {
            return order;
        }
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.nodes[id].children {
                Some((left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => order.extend_from_slice(&self.nodes[id].members),
            }
        }
        order
    }

    /// Merge steps in scipy linkage layout. Only meaningful for trees built
    /// by [`ClusterTree::single_linkage`].
    pub fn linkage(&self) -> Vec<LinkageRow> {
        self.nodes
            .iter()
            .filter_map(|node| {
                node.children.map(|(left, right)| LinkageRow {
                    left,
                    right,
                    distance: node.distance,
                    size: node.members.len(),
                })
            })
            .collect()
    }
}

fn cluster_distance(distance: &Array2<f64>, a: &[usize], b: &[usize]) -> f64 {
    let mut best = f64::INFINITY;
    for &i in a {
        for &j in b {
            best = best.min(distance[[i, j]]);
        }
    }
    best
}

/// `sqrt((1 - corr) / 2)`, with the argument clamped at zero.
pub fn correlation_distance(corr: &Array2<f64>) -> Array2<f64> {
    corr.mapv(|c| ((1.0 - c.clamp(-1.0, 1.0)) / 2.0).max(0.0).sqrt())
}

/// Clustering of the assets behind `covariance`.
pub fn cluster(covariance: &Array2<f64>) -> ClusterTree {
    ClusterTree::single_linkage(&correlation_distance(&correlation(covariance)))
}

fn inverse_variance_weights(covariance: &Array2<f64>, members: &[usize]) -> Array1<f64> {
    let ivp = Array1::from_iter(
        members
            .iter()
            .map(|&i| 1.0 / covariance[[i, i]].max(VARIANCE_FLOOR)),
    );
    let total = ivp.sum();
    ivp / total
}

fn cluster_variance(covariance: &Array2<f64>, members: &[usize]) -> f64 {
    let w = inverse_variance_weights(covariance, members);
    let sub = Array2::from_shape_fn((members.len(), members.len()), |(a, b)| {
        covariance[[members[a], members[b]]]
    });
    w.dot(&sub.dot(&w)).max(VARIANCE_FLOOR)
}

/// Weights from recursive bisection of `tree`, indexed by original asset.
pub fn bisection_weights(covariance: &Array2<f64>, tree: &ClusterTree) -> Array1<f64> {
    let mut weights = Array1::zeros(covariance.nrows());
    if tree.nodes.is_empty() {
        return weights;
    }

    let mut stack = vec![(tree.root, 1.0)];
    while let Some((id, scale)) = stack.pop() {
        let node = &tree.nodes[id];
        match node.children {
            Some((left, right)) => {
                let var0 = cluster_variance(covariance, &tree.nodes[left].members);
                let var1 = cluster_variance(covariance, &tree.nodes[right].members);
                let alpha = 1.0 - var0 / (var0 + var1);
                stack.push((left, scale * alpha));
                stack.push((right, scale * (1.0 - alpha)));
            }
            None => {
                for &i in &node.members {
                    weights[i] = scale;
                }
            }
        }
    }
    weights
}

/// HRP weights in the original column order. Box constraints do not apply.
pub fn allocate(covariance: &Array2<f64>) -> Solution {
    let order = cluster(covariance).quasi_diagonal_order();
    let tree = ClusterTree::bisection(&order);
    Solution::converged(bisection_weights(covariance, &tree))
}
