//! DC-flow oracles.
//!
//! Given a rebalanced [`GridState`], an oracle returns a flow for every live edge such that
//!
//! ```text
//! theta_low − theta_high − susceptance · flow = 0            for every live edge
//! Σ inflow − Σ outflow = demand − generated                  for every node
//! ```
//!
//! with positive flow running from the lower node id to the higher one. The system is a
//! feasibility question, so any solution will do; angles are pinned to zero at the lowest
//! node of each component to make the answer unique.
//!
//! Two oracles are provided:
//!
//! - [`LpFlowOracle`] states the system as a zero-objective LP and hands it to good_lp
//!   (Clarabel backend)
//! - [`DirectFlowOracle`] solves the reduced Laplacian of every component with a dense LU
//!   factorization (faer)
//!
//! Both report an unbalanced component as [`OracleError::Infeasible`], carrying a snapshot
//! of the offending state.

use crate::config::OracleKind;
use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use pgro_core::{
    EdgeIndex, EdgeKey, GridSnapshot, GridState, NodeIndex, PgroError, PgroResult,
};
use std::collections::HashMap;
use thiserror::Error;

/// Relative tolerance on the per-component power balance and on conservation residuals.
const BALANCE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum OracleError {
    /// The flow equations have no solution for this state.
    #[error("DC-flow problem infeasible: {reason} [{snapshot}]")]
    Infeasible {
        reason: String,
        snapshot: Box<GridSnapshot>,
    },

    /// Backend failure unrelated to the state itself.
    #[error("DC-flow solver failed: {0}")]
    Solver(String),
}

impl OracleError {
    fn infeasible(state: &GridState<'_>, reason: impl Into<String>) -> Self {
        OracleError::Infeasible {
            reason: reason.into(),
            snapshot: Box::new(state.snapshot()),
        }
    }

    pub fn snapshot(&self) -> Option<&GridSnapshot> {
        match self {
            OracleError::Infeasible { snapshot, .. } => Some(snapshot),
            OracleError::Solver(_) => None,
        }
    }
}

impl From<OracleError> for PgroError {
    fn from(err: OracleError) -> Self {
        PgroError::Oracle(err.to_string())
    }
}

/// Flow and angle values returned by an oracle, addressed by base-grid index.
///
/// Removed edges carry a flow of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    flows: Vec<f64>,
    angles: Vec<f64>,
}

impl FlowSolution {
    pub fn flow(&self, edge: EdgeIndex) -> f64 {
        self.flows[edge.index()]
    }

    pub fn angle(&self, node: NodeIndex) -> f64 {
        self.angles[node.index()]
    }

    /// Live edges whose flow magnitude strictly exceeds capacity.
    pub fn overloaded(&self, state: &GridState<'_>) -> Vec<EdgeKey> {
        let grid = state.grid();
        state
            .live_edges()
            .filter(|&e| self.flow(e).abs() > grid.edge(e).capacity)
            .map(|e| grid.edge(e).key)
            .collect()
    }

    /// `(edge, flow)` for every live edge in base-grid order.
    pub fn live_flows(&self, state: &GridState<'_>) -> Vec<(EdgeKey, f64)> {
        state
            .live_edges()
            .map(|e| (state.grid().edge(e).key, self.flow(e)))
            .collect()
    }

    /// Largest violation of `Σ inflow − Σ outflow = demand − generated` over all nodes.
    pub fn max_conservation_residual(&self, state: &GridState<'_>) -> f64 {
        state
            .grid()
            .node_indices()
            .map(|n| {
                let in_out = state.neighbors_in_out(n);
                let inflow: f64 = in_out.incoming.iter().map(|&e| self.flow(e)).sum();
                let outflow: f64 = in_out.outgoing.iter().map(|&e| self.flow(e)).sum();
                (inflow - outflow - (state.demand(n) - state.generated(n))).abs()
            })
            .fold(0.0, f64::max)
    }
}

/// Answers DC-flow feasibility queries for a grid state.
pub trait FlowOracle: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, state: &GridState<'_>) -> Result<FlowSolution, OracleError>;
}

impl<T: FlowOracle + ?Sized> FlowOracle for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(&self, state: &GridState<'_>) -> Result<FlowSolution, OracleError> {
        (**self).solve(state)
    }
}

/// Build the oracle selected in configuration.
pub fn oracle_for(kind: OracleKind) -> PgroResult<Box<dyn FlowOracle>> {
    match kind {
        OracleKind::Direct => Ok(Box::new(DirectFlowOracle)),
        #[cfg(feature = "solver-clarabel")]
        OracleKind::Lp => Ok(Box::new(LpFlowOracle)),
        #[cfg(not(feature = "solver-clarabel"))]
        OracleKind::Lp => Err(PgroError::Config(
            "the lp oracle requires the solver-clarabel feature".into(),
        )),
    }
}

fn component_scale(state: &GridState<'_>, members: &[NodeIndex]) -> f64 {
    members
        .iter()
        .map(|&n| state.demand(n).abs() + state.generated(n).abs())
        .sum::<f64>()
        .max(1.0)
}

/// Reject components whose injections do not sum to zero.
fn check_balance(state: &GridState<'_>, components: &[Vec<NodeIndex>]) -> Result<(), OracleError> {
    for members in components {
        let imbalance: f64 = members.iter().map(|&n| state.net_injection(n)).sum();
        if imbalance.abs() > BALANCE_TOLERANCE * component_scale(state, members) {
            let first = state.grid().node(members[0]).id;
            return Err(OracleError::infeasible(
                state,
                format!(
                    "component containing node {first} ({} nodes) has imbalance {imbalance:.6}",
                    members.len()
                ),
            ));
        }
    }
    Ok(())
}

fn check_susceptance(state: &GridState<'_>, edge: EdgeIndex) -> Result<f64, OracleError> {
    let data = state.grid().edge(edge);
    if data.susceptance.is_finite() && data.susceptance > 0.0 {
        Ok(data.susceptance)
    } else {
        Err(OracleError::Solver(format!(
            "edge {} has non-positive susceptance {}",
            data.key, data.susceptance
        )))
    }
}

/// Dense LU solve of `L θ = P` per component, reference angle removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFlowOracle;

impl FlowOracle for DirectFlowOracle {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn solve(&self, state: &GridState<'_>) -> Result<FlowSolution, OracleError> {
        let grid = state.grid();
        let components = state.components();
        check_balance(state, &components)?;

        let mut angles = vec![0.0; grid.node_count()];
        let mut flows = vec![0.0; grid.edge_count()];

        for members in &components {
            if members.len() < 2 {
                continue;
            }
            // members[0] is the reference bus and keeps angle 0
            let local: HashMap<NodeIndex, usize> = members
                .iter()
                .skip(1)
                .enumerate()
                .map(|(k, &n)| (n, k))
                .collect();
            let size = local.len();

            let mut laplacian = Mat::<f64>::zeros(size, size);
            let mut rhs = Mat::<f64>::zeros(size, 1);
            for (&n, &k) in &local {
                rhs.write(k, 0, state.net_injection(n));
            }

            for &n in members {
                for edge in state.neighbors_in_out(n).outgoing {
                    let weight = 1.0 / check_susceptance(state, edge)?;
                    let (low, high) = grid.endpoints(edge);
                    let i = local.get(&low).copied();
                    let j = local.get(&high).copied();
                    if let Some(i) = i {
                        laplacian.write(i, i, laplacian.read(i, i) + weight);
                    }
                    if let Some(j) = j {
                        laplacian.write(j, j, laplacian.read(j, j) + weight);
                    }
                    if let (Some(i), Some(j)) = (i, j) {
                        laplacian.write(i, j, laplacian.read(i, j) - weight);
                        laplacian.write(j, i, laplacian.read(j, i) - weight);
                    }
                }
            }

            let lu = laplacian.partial_piv_lu();
            let theta = lu.solve(&rhs);
            for (&n, &k) in &local {
                let value = theta.read(k, 0);
                if !value.is_finite() {
                    return Err(OracleError::infeasible(
                        state,
                        "singular reduced Laplacian",
                    ));
                }
                angles[n.index()] = value;
            }
        }

        for edge in state.live_edges() {
            let susceptance = check_susceptance(state, edge)?;
            let (low, high) = grid.endpoints(edge);
            flows[edge.index()] = (angles[low.index()] - angles[high.index()]) / susceptance;
        }

        let solution = FlowSolution { flows, angles };
        let residual = solution.max_conservation_residual(state);
        let scale = state.grid().total_original_demand().max(1.0);
        if residual > BALANCE_TOLERANCE * scale {
            return Err(OracleError::infeasible(
                state,
                format!("conservation residual {residual:.3e} after solve"),
            ));
        }
        Ok(solution)
    }
}

#[cfg(feature = "solver-clarabel")]
pub use lp::LpFlowOracle;

#[cfg(feature = "solver-clarabel")]
mod lp {
    use super::*;
    use good_lp::solvers::clarabel::clarabel;
    use good_lp::{
        constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel,
        Variable,
    };

    /// Zero-objective feasibility LP solved through good_lp with the Clarabel backend.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LpFlowOracle;

    impl FlowOracle for LpFlowOracle {
        fn name(&self) -> &'static str {
            "lp"
        }

        fn solve(&self, state: &GridState<'_>) -> Result<FlowSolution, OracleError> {
            let grid = state.grid();
            let components = state.components();
            check_balance(state, &components)?;

            let mut vars = variables!();
            let flow_vars: Vec<Option<Variable>> = grid
                .edge_indices()
                .map(|e| (!state.is_removed(e)).then(|| vars.add(variable())))
                .collect();
            let theta_vars: Vec<Variable> = grid
                .node_indices()
                .map(|_| vars.add(variable()))
                .collect();

            let mut model = vars.minimise(Expression::from(0.0)).using(clarabel);

            // theta_i − theta_j − x_ij·f_ij = 0
            for edge in state.live_edges() {
                let susceptance = check_susceptance(state, edge)?;
                let (low, high) = grid.endpoints(edge);
                let Some(flow) = flow_vars[edge.index()] else {
                    continue;
                };
                model = model.with(constraint!(
                    theta_vars[low.index()] - theta_vars[high.index()] - susceptance * flow == 0.0
                ));
            }

            // inflow − outflow = demand − generated; isolated nodes were checked above
            for node in grid.node_indices() {
                let in_out = state.neighbors_in_out(node);
                if in_out.incoming.is_empty() && in_out.outgoing.is_empty() {
                    continue;
                }
                let mut net = Expression::from(0.0);
                for edge in &in_out.incoming {
                    if let Some(flow) = flow_vars[edge.index()] {
                        net += flow;
                    }
                }
                for edge in &in_out.outgoing {
                    if let Some(flow) = flow_vars[edge.index()] {
                        net -= flow;
                    }
                }
                let rhs = state.demand(node) - state.generated(node);
                model = model.with(constraint!(net == rhs));
            }

            for members in &components {
                model = model.with(constraint!(theta_vars[members[0].index()] == 0.0));
            }

            let solution = model.solve().map_err(|err| match err {
                ResolutionError::Infeasible => {
                    OracleError::infeasible(state, "LP reported infeasible")
                }
                other => OracleError::Solver(format!("{other:?}")),
            })?;

            let flows = flow_vars
                .iter()
                .map(|var| var.map(|v| solution.value(v)).unwrap_or(0.0))
                .collect();
            let angles = theta_vars.iter().map(|&v| solution.value(v)).collect();
            Ok(FlowSolution { flows, angles })
        }
    }
}
