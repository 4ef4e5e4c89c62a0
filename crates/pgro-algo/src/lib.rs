//! # pgro-algo: Cascade Simulation and Consistency Cuts
//!
//! Algorithms behind cascade-aware transmission planning: a cascading-failure simulator
//! over the DC power-flow approximation, and a consistency oracle that turns contradictions
//! between a planning candidate and simulated physics into lazy constraints.
//!
//! ## Cascade simulation
//!
//! - [`Rebalancer`]: per connected component, shed demand or curtail generation so supply
//!   meets demand exactly
//! - [`FlowOracle`]: DC flow for a balanced state ([`DirectFlowOracle`] solves the reduced
//!   Laplacian with faer, [`LpFlowOracle`] poses the feasibility LP through good_lp)
//! - [`CascadeSimulator`]: remove, rebalance, solve, collect overloads, repeat to a fixed
//!   point
//!
//! ## Planning feedback
//!
//! - [`VariableRegistry`]: typed addressing of the planning model's columns
//! - [`implied_grid`]: the grid a candidate's investments produce
//! - [`CutGenerator`]: simulates every scenario and emits no-good cuts for contradictions
//! - [`IncumbentTracker`] / [`repair_incumbent`]: turn the best simulated round into a
//!   full primal solution through a [`MipSubSolver`]
//! - [`CascadePlanner`]: the [`SolverCallbacks`] the external MIP solver invokes
//!
//! ## Example
//!
//! ```
//! use pgro_algo::{CascadeSimulator, DirectFlowOracle, RunMode, SimulatorConfig};
//! use pgro_core::{EdgeKey, Grid, GridEdge, GridNode, NodeId, Scenario, ScenarioId};
//!
//! let mut grid = Grid::new();
//! grid.add_node(GridNode::new(NodeId::new(1), 15.0, 0.0)).unwrap();
//! grid.add_node(GridNode::new(NodeId::new(2), 0.0, 10.0)).unwrap();
//! grid.add_node(GridNode::new(NodeId::new(3), 0.0, 10.0)).unwrap();
//! for (a, b) in [(1, 2), (2, 3), (1, 3)] {
//!     grid.add_edge(GridEdge::new(EdgeKey::between(a, b), 10.0, 1.0)).unwrap();
//! }
//!
//! let scenario = Scenario::new(ScenarioId::new(1), 1.0, vec![EdgeKey::between(2, 3)]);
//! let config = SimulatorConfig::default();
//! let run = CascadeSimulator::new(&DirectFlowOracle, &config)
//!     .run(&grid, &scenario, RunMode::Complete)
//!     .unwrap();
//!
//! assert!(run.trace.completed);
//! assert_eq!(run.trace.depth(), 1);
//! assert_eq!(run.trace.unserved_demand, 0.0);
//! ```

pub mod arena;
pub mod callbacks;
pub mod candidate;
pub mod cascade;
pub mod config;
pub mod cuts;
pub mod heuristic;
pub mod implied;
pub mod oracle;
pub mod rebalance;
pub mod registry;

pub use arena::ArenaContext;
pub use callbacks::{CascadePlanner, SolverCallbacks};
pub use candidate::CandidateAssignment;
pub use cascade::{CascadeError, CascadeRun, CascadeSimulator, CascadeTrace, RunMode};
pub use config::{InvestmentConfig, OracleKind, SimulatorConfig};
pub use cuts::{CheckReport, ContradictionKind, Cut, CutError, CutGenerator, CutSense};
pub use heuristic::{
    repair_incumbent, HeuristicError, HeuristicSolution, IncumbentSnapshot, IncumbentTracker,
    MipSubSolver, SubSolveOutcome,
};
pub use implied::implied_grid;
#[cfg(feature = "solver-clarabel")]
pub use oracle::LpFlowOracle;
pub use oracle::{oracle_for, DirectFlowOracle, FlowOracle, FlowSolution, OracleError};
pub use rebalance::{max_component_imbalance, RebalanceSummary, Rebalancer};
pub use registry::{VarDomain, VarHandle, VarInfo, VarKey, VariableRegistry};
