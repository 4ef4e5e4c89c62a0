//! # pgro-core: Grid Model for Cascade-Aware Planning
//!
//! Data structures shared by the cascade simulator and the planning cut generator.
//!
//! ## Design
//!
//! A transmission grid is an **undirected graph** of nodes (demand, generation capacity)
//! and edges (flow capacity, susceptance). Two layers keep scenario evaluation isolated:
//!
//! - [`Grid`]: the immutable base description (petgraph arena, addressed by index)
//! - [`GridState`]: a small per-scenario delta over a borrowed base grid holding the
//!   removed-edge set and the rebalanced demand/generation values
//!
//! Because every scenario owns its own [`GridState`] and only borrows the base grid,
//! scenarios can be evaluated in any order (or in parallel) without sharing mutable state.
//!
//! ## Edge orientation
//!
//! Edges are unordered pairs canonicalized as `(min, max)` ([`EdgeKey`]). Flow on an edge
//! is positive when it travels from the lower node id to the higher one, so the edge counts
//! as *outgoing* at its low endpoint and *incoming* at its high endpoint.
//!
//! ## Quick Start
//!
//! ```
//! use pgro_core::{EdgeKey, Grid, GridEdge, GridNode, GridState, NodeId};
//!
//! let mut grid = Grid::new();
//! grid.add_node(GridNode::new(NodeId::new(1), 15.0, 0.0)).unwrap();
//! grid.add_node(GridNode::new(NodeId::new(2), 0.0, 20.0)).unwrap();
//! grid.add_edge(GridEdge::new(EdgeKey::new(NodeId::new(2), NodeId::new(1)), 10.0, 1.0))
//!     .unwrap();
//!
//! let mut state = GridState::new(&grid);
//! state.remove_edges(&[EdgeKey::new(NodeId::new(1), NodeId::new(2))]);
//! assert_eq!(state.components().len(), 2);
//! ```

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod instance;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{PgroError, PgroResult};
pub use grid::{
    EdgeSnapshot, Grid, GridEdge, GridNode, GridSnapshot, GridState, InOut, NodeSnapshot,
};
pub use instance::{EdgeRecord, NodeRecord, PlanningInstance, Scenario};
pub use petgraph::graph::{EdgeIndex, NodeIndex};

/// Identifier of a grid node (bus) as it appears in the grid description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a failure scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioId(usize);

impl ScenarioId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ScenarioId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical `(min, max)` key of an undirected edge.
///
/// Construction always orders the endpoints, so `EdgeKey::new(a, b) == EdgeKey::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    low: NodeId,
    high: NodeId,
}

impl EdgeKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Shorthand for keys built from raw ids (tests, loaders).
    pub fn between(a: usize, b: usize) -> Self {
        Self::new(NodeId::new(a), NodeId::new(b))
    }

    /// Endpoint where the edge is oriented *out* (positive flow leaves here).
    #[inline]
    pub fn low(&self) -> NodeId {
        self.low
    }

    /// Endpoint where the edge is oriented *in* (positive flow arrives here).
    #[inline]
    pub fn high(&self) -> NodeId {
        self.high
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.low == node || self.high == node
    }

    pub fn is_loop(&self) -> bool {
        self.low == self.high
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_is_canonical() {
        let a = EdgeKey::between(5, 2);
        let b = EdgeKey::between(2, 5);
        assert_eq!(a, b);
        assert_eq!(a.low(), NodeId::new(2));
        assert_eq!(a.high(), NodeId::new(5));
        assert_eq!(a.to_string(), "(2, 5)");
    }

    #[test]
    fn edge_key_touches_both_endpoints() {
        let key = EdgeKey::between(3, 7);
        assert!(key.touches(NodeId::new(3)));
        assert!(key.touches(NodeId::new(7)));
        assert!(!key.touches(NodeId::new(4)));
        assert!(EdgeKey::between(4, 4).is_loop());
    }
}
