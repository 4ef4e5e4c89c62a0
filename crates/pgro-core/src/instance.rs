//! Decoded planning instance: grid description, investment data and failure scenarios.

use crate::diagnostics::Diagnostics;
use crate::grid::{Grid, GridEdge, GridNode};
use crate::{EdgeKey, NodeId, PgroError, PgroResult, ScenarioId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Tolerance used when checking that scenario probabilities sum to one.
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-6;

/// Per-node record of the grid description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub demand: f64,
    /// Existing generation capacity
    pub capacity: f64,
    /// Upper bound of the continuous generation upgrade
    pub generation_upgrade_bound: f64,
    /// Fixed cost of installing generation backup
    pub fixed_cost: f64,
    /// Cost per unit of generation upgrade
    pub variable_cost: f64,
}

/// Per-edge record of the grid description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub key: EdgeKey,
    /// Existing capacity; zero for lines that do not exist yet
    pub capacity: f64,
    pub susceptance: f64,
    /// Establishment cost. Positive means the line is a candidate that must be built.
    pub fixed_cost: f64,
    /// Cost of a capacity upgrade
    pub variable_cost: f64,
}

impl EdgeRecord {
    pub fn is_candidate(&self) -> bool {
        self.fixed_cost > 0.0
    }
}

/// A failure scenario: probability weight plus the initially failed edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub probability: f64,
    pub initial_failures: Vec<EdgeKey>,
}

impl Scenario {
    pub fn new(id: ScenarioId, probability: f64, initial_failures: Vec<EdgeKey>) -> Self {
        Self {
            id,
            probability,
            initial_failures,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningInstance {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub scenarios: Vec<Scenario>,
}

impl PlanningInstance {
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&EdgeRecord> {
        self.edges.iter().find(|e| e.key == *key)
    }

    pub fn scenario(&self, id: ScenarioId) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn candidate_edges(&self) -> impl Iterator<Item = &EdgeRecord> {
        self.edges.iter().filter(|e| e.is_candidate())
    }

    /// Probability-weighted total demand, the supply an ideal plan would reach.
    pub fn expected_total_demand(&self) -> f64 {
        let total: f64 = self.nodes.iter().map(|n| n.demand).sum();
        self.scenarios.iter().map(|s| s.probability * total).sum()
    }

    /// Grid with no investment applied.
    ///
    /// Candidate lines and existing lines with zero capacity are left out.
    pub fn base_grid(&self) -> PgroResult<Grid> {
        let mut grid = Grid::new();
        for node in &self.nodes {
            grid.add_node(GridNode::new(node.id, node.demand, node.capacity))?;
        }
        for edge in &self.edges {
            if edge.is_candidate() || edge.capacity <= 0.0 {
                continue;
            }
            grid.add_edge(GridEdge::new(edge.key, edge.capacity, edge.susceptance))?;
        }
        Ok(grid)
    }

    /// Record every structural or numeric problem in `diag`.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            let entity = format!("node {}", node.id);
            if !node_ids.insert(node.id) {
                diag.add_error_with_entity("reference", "duplicate node id", &entity);
            }
            for (label, value) in [
                ("demand", node.demand),
                ("capacity", node.capacity),
                ("generation upgrade bound", node.generation_upgrade_bound),
                ("fixed cost", node.fixed_cost),
                ("variable cost", node.variable_cost),
            ] {
                if !value.is_finite() || value < 0.0 {
                    diag.add_error_with_entity("value", &format!("{label} is {value}"), &entity);
                }
            }
        }

        let mut edge_keys = HashSet::new();
        for edge in &self.edges {
            let entity = format!("edge {}", edge.key);
            if edge.key.is_loop() {
                diag.add_error_with_entity("reference", "self loop", &entity);
            }
            if !edge_keys.insert(edge.key) {
                diag.add_error_with_entity("reference", "duplicate edge", &entity);
            }
            for endpoint in [edge.key.low(), edge.key.high()] {
                if !node_ids.contains(&endpoint) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("unknown endpoint {endpoint}"),
                        &entity,
                    );
                }
            }
            if !edge.capacity.is_finite() || edge.capacity < 0.0 {
                diag.add_error_with_entity(
                    "value",
                    &format!("capacity is {}", edge.capacity),
                    &entity,
                );
            }
            if !edge.susceptance.is_finite() || edge.susceptance <= 0.0 {
                diag.add_error_with_entity(
                    "value",
                    &format!("susceptance must be positive, got {}", edge.susceptance),
                    &entity,
                );
            }
            if edge.fixed_cost < 0.0 || edge.variable_cost < 0.0 {
                diag.add_error_with_entity("value", "negative cost", &entity);
            }
        }

        let mut scenario_ids = BTreeSet::new();
        let mut probability_sum = 0.0;
        for scenario in &self.scenarios {
            let entity = format!("scenario {}", scenario.id);
            if !scenario_ids.insert(scenario.id) {
                diag.add_error_with_entity("scenario", "duplicate scenario id", &entity);
            }
            if !(0.0..=1.0).contains(&scenario.probability) {
                diag.add_error_with_entity(
                    "scenario",
                    &format!("probability {} outside [0, 1]", scenario.probability),
                    &entity,
                );
            }
            probability_sum += scenario.probability;
            if scenario.initial_failures.is_empty() {
                diag.add_warning_with_entity("scenario", "no initial failures", &entity);
            }
            for key in &scenario.initial_failures {
                if !edge_keys.contains(key) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("initial failure {key} is not a grid edge"),
                        &entity,
                    );
                }
            }
        }

        if self.nodes.is_empty() {
            diag.add_error("reference", "instance has no nodes");
        }
        if self.scenarios.is_empty() {
            diag.add_warning("scenario", "instance has no scenarios");
        } else if (probability_sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            diag.add_warning(
                "scenario",
                &format!("scenario probabilities sum to {probability_sum}"),
            );
        }
    }

    /// Validate and fail on the first error-severity issue.
    pub fn validate(&self) -> PgroResult<Diagnostics> {
        let mut diag = Diagnostics::new();
        self.validate_into(&mut diag);
        if let Some(issue) = diag.errors().next() {
            return Err(PgroError::Validation(format!(
                "{} ({})",
                issue,
                diag.summary()
            )));
        }
        Ok(diag)
    }
}
