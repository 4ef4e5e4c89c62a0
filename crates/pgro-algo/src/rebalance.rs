//! Per-component demand/generation rebalancing.
//!
//! After edges are removed the grid may split into islands. The DC-flow equations only
//! have a solution when every island is balanced, so each connected component is scaled
//! independently:
//!
//! ```text
//! demand_total  = Σ original_demand(n)      cap_total = Σ generation_capacity(n)
//!
//! demand_total > cap_total  (starved)   shed   = cap_total / demand_total  (0 if demand_total = 0)
//!                                       demand = original_demand · shed
//!                                       generated = generation_capacity
//!
//! otherwise                 (surplus)   factor = demand_total / cap_total  (0 if cap_total = 0)
//!                                       demand = original_demand
//!                                       generated = generation_capacity · factor
//! ```
//!
//! Afterwards `Σ demand = Σ generated` holds in every component and
//! `0 ≤ generated ≤ generation_capacity` holds at every node.

use crate::arena::ArenaContext;
use pgro_core::GridState;

/// Aggregate outcome of one rebalance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RebalanceSummary {
    pub components: usize,
    /// Components whose demand exceeded their generation capacity
    pub starved_components: usize,
    /// Demand removed by shedding, summed over starved components
    pub shed_demand: f64,
}

/// Rebalances grid states, reusing an arena for its per-component scratch tables.
#[derive(Default)]
pub struct Rebalancer {
    arena: ArenaContext,
}

impl Rebalancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebalance(&mut self, state: &mut GridState<'_>) -> RebalanceSummary {
        self.arena.reset();
        let grid = state.grid();
        let components = state.components();

        let mut totals = self.arena.alloc_vec::<(f64, f64)>();
        for members in &components {
            let demand: f64 = members
                .iter()
                .map(|&n| grid.node(n).original_demand)
                .sum();
            let capacity: f64 = members
                .iter()
                .map(|&n| grid.node(n).generation_capacity)
                .sum();
            totals.push((demand, capacity));
        }

        let mut summary = RebalanceSummary {
            components: components.len(),
            ..RebalanceSummary::default()
        };

        for (members, &(total_demand, total_capacity)) in components.iter().zip(totals.iter()) {
            if total_demand > total_capacity {
                let shedding_factor = if total_demand == 0.0 {
                    0.0
                } else {
                    total_capacity / total_demand
                };
                summary.starved_components += 1;
                summary.shed_demand += total_demand - total_demand * shedding_factor;
                for &n in members {
                    let node = grid.node(n);
                    state.set_demand(n, node.original_demand * shedding_factor);
                    state.set_generated(n, node.generation_capacity);
                }
            } else {
                let generation_factor = if total_capacity == 0.0 {
                    0.0
                } else {
                    total_demand / total_capacity
                };
                for &n in members {
                    let node = grid.node(n);
                    state.set_demand(n, node.original_demand);
                    state.set_generated(n, node.generation_capacity * generation_factor);
                }
            }
        }

        summary
    }
}

/// Largest per-component `|Σ demand − Σ generated|` of a state.
pub fn max_component_imbalance(state: &GridState<'_>) -> f64 {
    state
        .components()
        .iter()
        .map(|members| {
            members
                .iter()
                .map(|&n| state.demand(n) - state.generated(n))
                .sum::<f64>()
                .abs()
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgro_core::{EdgeKey, Grid, GridEdge, GridNode, NodeId, NodeIndex};

    fn ring() -> Grid {
        let mut grid = Grid::new();
        grid.add_node(GridNode::new(NodeId::new(1), 15.0, 0.0)).unwrap();
        grid.add_node(GridNode::new(NodeId::new(2), 0.0, 10.0)).unwrap();
        grid.add_node(GridNode::new(NodeId::new(3), 0.0, 10.0)).unwrap();
        for (a, b) in [(1, 2), (2, 3), (1, 3)] {
            grid.add_edge(GridEdge::new(EdgeKey::between(a, b), 10.0, 1.0))
                .unwrap();
        }
        grid
    }

    fn value(state: &GridState<'_>, id: usize) -> (f64, f64) {
        let idx = state.grid().node_index(NodeId::new(id)).unwrap();
        (state.demand(idx), state.generated(idx))
    }

    #[test]
    fn surplus_component_scales_generation() {
        let grid = ring();
        let mut state = GridState::new(&grid);
        let summary = Rebalancer::new().rebalance(&mut state);
        assert_eq!(summary.components, 1);
        assert_eq!(summary.starved_components, 0);
        assert_eq!(value(&state, 1), (15.0, 0.0));
        assert_eq!(value(&state, 2), (0.0, 7.5));
        assert_eq!(value(&state, 3), (0.0, 7.5));
    }

    #[test]
    fn isolated_load_is_fully_shed() {
        let grid = ring();
        let mut state = GridState::new(&grid);
        state.remove_edges(&[EdgeKey::between(1, 2), EdgeKey::between(1, 3)]);
        let summary = Rebalancer::new().rebalance(&mut state);
        assert_eq!(summary.components, 2);
        assert_eq!(summary.starved_components, 1);
        assert!((summary.shed_demand - 15.0).abs() < 1e-12);
        assert_eq!(value(&state, 1), (0.0, 0.0));
        // the generator island has no demand left to serve
        assert_eq!(value(&state, 2), (0.0, 0.0));
    }

    #[test]
    fn partial_shedding_runs_generators_at_capacity() {
        let grid = ring();
        let mut state = GridState::new(&grid);
        state.remove_edges(&[EdgeKey::between(1, 2), EdgeKey::between(2, 3)]);
        Rebalancer::new().rebalance(&mut state);
        let (demand, generated) = value(&state, 1);
        assert!((demand - 10.0).abs() < 1e-12);
        assert_eq!(generated, 0.0);
        assert_eq!(value(&state, 3), (0.0, 10.0));
        assert!(max_component_imbalance(&state) < 1e-9);
    }

    #[test]
    fn demand_recovers_when_recomputed_from_original() {
        let grid = ring();
        let mut state = GridState::new(&grid);
        let idx = grid.node_index(NodeId::new(1)).unwrap();
        state.set_demand(idx, 3.0);
        Rebalancer::new().rebalance(&mut state);
        assert_eq!(state.demand(idx), 15.0);
    }

    #[test]
    fn zero_demand_zero_capacity_component_is_stable() {
        let mut grid = Grid::new();
        grid.add_node(GridNode::new(NodeId::new(1), 0.0, 0.0)).unwrap();
        let mut state = GridState::new(&grid);
        let summary = Rebalancer::new().rebalance(&mut state);
        assert_eq!(summary.starved_components, 0);
        assert_eq!(state.demand(NodeIndex::new(0)), 0.0);
        assert_eq!(state.generated(NodeIndex::new(0)), 0.0);
    }
}
