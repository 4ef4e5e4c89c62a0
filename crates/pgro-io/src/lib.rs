//! # pgro-io: Planning Instance Files and Result Export
//!
//! - [`load_instance`]: read an instance directory into a [`pgro_core::PlanningInstance`]
//! - [`write_traces`]: per-scenario cascade traces as `type,par1,par2,par3,value` CSV
//! - [`write_solution_file`] / [`read_candidate`]: `name,value` files keyed by model
//!   variable names
//!
//! ```rust,no_run
//! use pgro_io::load_instance;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let instance = load_instance(Path::new("instances/ring3"))?;
//!     let diagnostics = instance.validate()?;
//!     println!("{} scenarios, {}", instance.scenarios.len(), diagnostics.summary());
//!     Ok(())
//! }
//! ```

pub mod instance;
pub mod solution;
pub mod trace;

pub use instance::{
    load_instance, read_edges, read_nodes, read_scenarios, EDGES_FILE, FAILURES_FILE,
    NODES_FILE, PROBABILITIES_FILE,
};
pub use solution::{read_candidate, write_solution, write_solution_file, NamedValue};
pub use trace::{
    read_trace_rows, trace_rows, write_trace, write_trace_file, write_traces, TraceRow,
    TraceRowKind,
};
