//! Base grid arena and per-scenario grid state.

use crate::{EdgeKey, NodeId, PgroError, PgroResult};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A grid node (bus) with its immutable baseline attributes.
///
/// The mutable `demand` and `generated` values live in [`GridState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    pub id: NodeId,
    /// Demand the node would consume with every edge intact (MW)
    pub original_demand: f64,
    /// Maximum generation at this node (MW)
    pub generation_capacity: f64,
    /// Penalty per MW of shed demand
    pub unsupplied_cost: f64,
    /// Cost per MW generated
    pub generation_cost: f64,
}

impl GridNode {
    pub fn new(id: NodeId, original_demand: f64, generation_capacity: f64) -> Self {
        Self {
            id,
            original_demand,
            generation_capacity,
            unsupplied_cost: 0.0,
            generation_cost: 0.0,
        }
    }

    pub fn with_costs(mut self, unsupplied_cost: f64, generation_cost: f64) -> Self {
        self.unsupplied_cost = unsupplied_cost;
        self.generation_cost = generation_cost;
        self
    }
}

/// A transmission edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEdge {
    pub key: EdgeKey,
    /// Flow magnitude limit (MW); flows strictly above it trip the edge
    pub capacity: f64,
    /// Linear coefficient in `theta_low - theta_high = susceptance * flow`
    pub susceptance: f64,
}

impl GridEdge {
    pub fn new(key: EdgeKey, capacity: f64, susceptance: f64) -> Self {
        Self {
            key,
            capacity,
            susceptance,
        }
    }
}

/// Immutable base grid.
///
/// Nodes and edges are stored in a petgraph arena and are never removed from it; removal
/// is expressed by [`GridState`] so indices stay stable for the life of the grid.
#[derive(Debug, Clone)]
pub struct Grid {
    graph: UnGraph<GridNode, GridEdge>,
    node_lookup: HashMap<NodeId, NodeIndex>,
    edge_lookup: HashMap<EdgeKey, EdgeIndex>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::default(),
            node_lookup: HashMap::new(),
            edge_lookup: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: GridNode) -> PgroResult<NodeIndex> {
        if self.node_lookup.contains_key(&node.id) {
            return Err(PgroError::Grid(format!("duplicate node {}", node.id)));
        }
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.node_lookup.insert(id, idx);
        Ok(idx)
    }

    pub fn add_edge(&mut self, edge: GridEdge) -> PgroResult<EdgeIndex> {
        if edge.key.is_loop() {
            return Err(PgroError::Grid(format!("self loop on edge {}", edge.key)));
        }
        if self.edge_lookup.contains_key(&edge.key) {
            return Err(PgroError::Grid(format!("duplicate edge {}", edge.key)));
        }
        let low = self.require_node(edge.key.low())?;
        let high = self.require_node(edge.key.high())?;
        let key = edge.key;
        let idx = self.graph.add_edge(low, high, edge);
        self.edge_lookup.insert(key, idx);
        Ok(idx)
    }

    fn require_node(&self, id: NodeId) -> PgroResult<NodeIndex> {
        self.node_lookup
            .get(&id)
            .copied()
            .ok_or_else(|| PgroError::Grid(format!("edge references unknown node {id}")))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, idx: NodeIndex) -> &GridNode {
        &self.graph[idx]
    }

    pub fn edge(&self, idx: EdgeIndex) -> &GridEdge {
        &self.graph[idx]
    }

    pub fn node_index(&self, id: NodeId) -> Option<NodeIndex> {
        self.node_lookup.get(&id).copied()
    }

    pub fn edge_index(&self, key: &EdgeKey) -> Option<EdgeIndex> {
        self.edge_lookup.get(key).copied()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> {
        self.graph.edge_indices()
    }

    /// `(low, high)` endpoint indices of an edge, following the canonical orientation.
    pub fn endpoints(&self, idx: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let key = self.graph[idx].key;
        // both endpoints were resolved in add_edge
        (self.node_lookup[&key.low()], self.node_lookup[&key.high()])
    }

    pub fn total_original_demand(&self) -> f64 {
        self.graph.node_weights().map(|n| n.original_demand).sum()
    }

    pub fn total_generation_capacity(&self) -> f64 {
        self.graph.node_weights().map(|n| n.generation_capacity).sum()
    }
}

/// Edges of a node split by canonical orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InOut {
    /// Edges whose high endpoint is the node (positive flow arrives)
    pub incoming: Vec<EdgeIndex>,
    /// Edges whose low endpoint is the node (positive flow leaves)
    pub outgoing: Vec<EdgeIndex>,
}

/// Mutable per-scenario view of a base [`Grid`].
///
/// Holds the removed-edge set and the current demand/generation of every node. `Clone`
/// gives an independent deep copy of the delta; the base grid is shared read-only.
#[derive(Debug, Clone)]
pub struct GridState<'g> {
    grid: &'g Grid,
    removed: Vec<bool>,
    demand: Vec<f64>,
    generated: Vec<f64>,
}

impl<'g> GridState<'g> {
    /// Fresh state: no edge removed, full original demand, nothing generated yet.
    pub fn new(grid: &'g Grid) -> Self {
        Self {
            grid,
            removed: vec![false; grid.edge_count()],
            demand: grid
                .graph
                .node_weights()
                .map(|n| n.original_demand)
                .collect(),
            generated: vec![0.0; grid.node_count()],
        }
    }

    pub fn grid(&self) -> &'g Grid {
        self.grid
    }

    /// Independent copy for scenario isolation.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Remove the given edges. Keys absent from the base grid are ignored.
    ///
    /// Returns the number of edges that were live before the call.
    pub fn remove_edges<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a EdgeKey>,
    {
        let mut newly_removed = 0;
        for key in keys {
            if let Some(idx) = self.grid.edge_index(key) {
                let slot = &mut self.removed[idx.index()];
                if !*slot {
                    *slot = true;
                    newly_removed += 1;
                }
            }
        }
        newly_removed
    }

    pub fn is_removed(&self, idx: EdgeIndex) -> bool {
        self.removed[idx.index()]
    }

    pub fn live_edges(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.grid
            .edge_indices()
            .filter(move |idx| !self.removed[idx.index()])
    }

    pub fn live_edge_count(&self) -> usize {
        self.removed.iter().filter(|r| !**r).count()
    }

    pub fn removed_edges(&self) -> Vec<EdgeKey> {
        self.grid
            .edge_indices()
            .filter(|idx| self.removed[idx.index()])
            .map(|idx| self.grid.edge(idx).key)
            .collect()
    }

    /// Live edges at `node`, oriented by the canonical `(min, max)` ordering.
    pub fn neighbors_in_out(&self, node: NodeIndex) -> InOut {
        let id = self.grid.node(node).id;
        let mut in_out = InOut::default();
        let mut edges: Vec<EdgeIndex> = self
            .grid
            .graph
            .edges(node)
            .map(|edge| petgraph::visit::EdgeRef::id(&edge))
            .filter(|idx| !self.removed[idx.index()])
            .collect();
        edges.sort();
        for idx in edges {
            if self.grid.edge(idx).key.low() == id {
                in_out.outgoing.push(idx);
            } else {
                in_out.incoming.push(idx);
            }
        }
        in_out
    }

    /// Connected components over live edges.
    ///
    /// Components are ordered by their smallest node index and members are ascending, so
    /// the result is deterministic for a given base grid and removal set.
    pub fn components(&self) -> Vec<Vec<NodeIndex>> {
        let n = self.grid.node_count();
        let mut sets = UnionFind::<usize>::new(n);
        for idx in self.live_edges() {
            let (a, b) = self.grid.endpoints(idx);
            sets.union(a.index(), b.index());
        }

        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<NodeIndex>> = Vec::new();
        for node in self.grid.node_indices() {
            let root = sets.find_mut(node.index());
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(node);
        }
        components
    }

    pub fn demand(&self, node: NodeIndex) -> f64 {
        self.demand[node.index()]
    }

    pub fn generated(&self, node: NodeIndex) -> f64 {
        self.generated[node.index()]
    }

    pub fn set_demand(&mut self, node: NodeIndex, value: f64) {
        self.demand[node.index()] = value;
    }

    pub fn set_generated(&mut self, node: NodeIndex, value: f64) {
        self.generated[node.index()] = value;
    }

    /// Net injection `generated - demand` (positive at net sources).
    pub fn net_injection(&self, node: NodeIndex) -> f64 {
        self.generated[node.index()] - self.demand[node.index()]
    }

    pub fn supplied_demand(&self) -> f64 {
        self.demand.iter().sum()
    }

    pub fn unserved_demand(&self) -> f64 {
        (self.grid.total_original_demand() - self.supplied_demand()).max(0.0)
    }

    pub fn snapshot(&self) -> GridSnapshot {
        let nodes = self
            .grid
            .node_indices()
            .map(|idx| {
                let node = self.grid.node(idx);
                NodeSnapshot {
                    id: node.id,
                    original_demand: node.original_demand,
                    demand: self.demand(idx),
                    generation_capacity: node.generation_capacity,
                    generated: self.generated(idx),
                }
            })
            .collect();
        let live_edges = self
            .live_edges()
            .map(|idx| {
                let edge = self.grid.edge(idx);
                EdgeSnapshot {
                    key: edge.key,
                    capacity: edge.capacity,
                    susceptance: edge.susceptance,
                }
            })
            .collect();
        GridSnapshot {
            nodes,
            live_edges,
            removed_edges: self.removed_edges(),
        }
    }
}

/// Serializable picture of a [`GridState`], used for fatal-error diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub live_edges: Vec<EdgeSnapshot>,
    pub removed_edges: Vec<EdgeKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub original_demand: f64,
    pub demand: f64,
    pub generation_capacity: f64,
    pub generated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub key: EdgeKey,
    pub capacity: f64,
    pub susceptance: f64,
}

impl std::fmt::Display for GridSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes, {} live edges, {} removed edges",
            self.nodes.len(),
            self.live_edges.len(),
            self.removed_edges.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Grid {
        // 1 - 2
        // |   |
        // 4 - 3
        let mut grid = Grid::new();
        for id in 1..=4 {
            grid.add_node(GridNode::new(NodeId::new(id), 1.0, 1.0))
                .unwrap();
        }
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 1)] {
            grid.add_edge(GridEdge::new(EdgeKey::between(a, b), 10.0, 1.0))
                .unwrap();
        }
        grid
    }

    #[test]
    fn rejects_duplicates_and_unknown_endpoints() {
        let mut grid = square();
        assert!(grid.add_node(GridNode::new(NodeId::new(1), 0.0, 0.0)).is_err());
        assert!(grid
            .add_edge(GridEdge::new(EdgeKey::between(2, 1), 1.0, 1.0))
            .is_err());
        assert!(grid
            .add_edge(GridEdge::new(EdgeKey::between(1, 9), 1.0, 1.0))
            .is_err());
        assert!(grid
            .add_edge(GridEdge::new(EdgeKey::between(3, 3), 1.0, 1.0))
            .is_err());
    }

    #[test]
    fn neighbors_follow_canonical_orientation() {
        let grid = square();
        let state = GridState::new(&grid);
        let n1 = grid.node_index(NodeId::new(1)).unwrap();
        let in_out = state.neighbors_in_out(n1);
        // node 1 is the low end of both (1,2) and (1,4)
        assert_eq!(in_out.outgoing.len(), 2);
        assert!(in_out.incoming.is_empty());

        let n3 = grid.node_index(NodeId::new(3)).unwrap();
        let in_out = state.neighbors_in_out(n3);
        let incoming: Vec<EdgeKey> = in_out.incoming.iter().map(|e| grid.edge(*e).key).collect();
        let outgoing: Vec<EdgeKey> = in_out.outgoing.iter().map(|e| grid.edge(*e).key).collect();
        assert_eq!(incoming, vec![EdgeKey::between(2, 3)]);
        assert_eq!(outgoing, vec![EdgeKey::between(3, 4)]);
    }

    #[test]
    fn removing_edges_splits_components() {
        let grid = square();
        let mut state = GridState::new(&grid);
        assert_eq!(state.components().len(), 1);

        let removed = state.remove_edges(&[EdgeKey::between(1, 2), EdgeKey::between(3, 4)]);
        assert_eq!(removed, 2);
        let components = state.components();
        assert_eq!(components.len(), 2);
        let ids: Vec<Vec<usize>> = components
            .iter()
            .map(|c| c.iter().map(|n| grid.node(*n).id.value()).collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 4], vec![2, 3]]);

        // removing again is a no-op, unknown keys are ignored
        assert_eq!(state.remove_edges(&[EdgeKey::between(1, 2), EdgeKey::between(1, 3)]), 0);
        assert_eq!(state.live_edge_count(), 2);
    }

    #[test]
    fn removed_edges_disappear_from_neighbors() {
        let grid = square();
        let mut state = GridState::new(&grid);
        state.remove_edges(&[EdgeKey::between(1, 4)]);
        let n1 = grid.node_index(NodeId::new(1)).unwrap();
        assert_eq!(state.neighbors_in_out(n1).outgoing.len(), 1);
    }

    #[test]
    fn copy_is_independent() {
        let grid = square();
        let mut original = GridState::new(&grid);
        let mut copy = original.copy();
        copy.remove_edges(&[EdgeKey::between(2, 3)]);
        copy.set_demand(NodeIndex::new(0), 0.25);
        assert_eq!(original.live_edge_count(), 4);
        assert_eq!(original.demand(NodeIndex::new(0)), 1.0);

        original.set_generated(NodeIndex::new(1), 0.5);
        assert_eq!(copy.generated(NodeIndex::new(1)), 0.0);
    }

    #[test]
    fn snapshot_lists_removed_and_live_edges() {
        let grid = square();
        let mut state = GridState::new(&grid);
        state.remove_edges(&[EdgeKey::between(4, 3)]);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.nodes.len(), 4);
        assert_eq!(snapshot.live_edges.len(), 3);
        assert_eq!(snapshot.removed_edges, vec![EdgeKey::between(3, 4)]);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: GridSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn unserved_demand_tracks_shedding() {
        let grid = square();
        let mut state = GridState::new(&grid);
        assert_eq!(state.unserved_demand(), 0.0);
        state.set_demand(NodeIndex::new(2), 0.0);
        assert!((state.unserved_demand() - 1.0).abs() < 1e-12);
        assert!((state.supplied_demand() - 3.0).abs() < 1e-12);
    }
}
