//! Grid implied by a candidate's investment decisions.

use crate::candidate::CandidateAssignment;
use crate::config::SimulatorConfig;
use crate::registry::{VarKey, VariableRegistry};
use pgro_core::{Grid, GridEdge, GridNode, PgroError, PgroResult, PlanningInstance};

/// Apply the candidate's investments to the base instance.
///
/// - generation capacity grows by the node's upgrade value when its backup indicator is set
/// - an existing line (positive base capacity) gains `line_upgrade_capacity` per unit of
///   upgrade
/// - a candidate line exists only when established, with the establishment capacity on top
///   of its base and upgrade capacity
pub fn implied_grid(
    instance: &PlanningInstance,
    registry: &VariableRegistry,
    candidate: &CandidateAssignment,
    config: &SimulatorConfig,
) -> PgroResult<Grid> {
    let value_of = |key: VarKey| -> PgroResult<f64> {
        candidate
            .get(registry, &key)
            .ok_or_else(|| PgroError::Validation(format!("model has no variable {}", key.name())))
    };
    let scale = &config.investment;

    let mut grid = Grid::new();
    for node in &instance.nodes {
        let backup = value_of(VarKey::GenerationBackup { node: node.id })?;
        let upgrade = if config.is_one(backup) {
            value_of(VarKey::GenerationUpgrade { node: node.id })?.max(0.0)
        } else {
            0.0
        };
        grid.add_node(GridNode::new(node.id, node.demand, node.capacity + upgrade))?;
    }

    for edge in &instance.edges {
        let upgrade = value_of(VarKey::LineUpgrade { edge: edge.key })?.max(0.0);
        let mut capacity = edge.capacity + upgrade * scale.line_upgrade_capacity;
        if edge.is_candidate() {
            let established = value_of(VarKey::LineEstablish { edge: edge.key })?;
            if !config.is_one(established) {
                continue;
            }
            capacity += scale.line_establish_capacity;
        } else if edge.capacity <= 0.0 {
            continue;
        }
        grid.add_edge(GridEdge::new(edge.key, capacity, edge.susceptance))?;
    }

    Ok(grid)
}
