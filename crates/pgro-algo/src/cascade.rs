//! Cascading-failure evolution.
//!
//! Starting from a scenario's initial failures, the simulator alternates
//!
//! 1. remove the edges that failed in the previous step,
//! 2. rebalance every connected component,
//! 3. solve the DC flow and collect edges whose `|flow| > capacity`,
//!
//! until a step produces no new failures. The trace `F[0], F[1], …, F[t]` lists the
//! initial failures followed by the overloads found after each flow solve; `F[t]` is empty
//! when the run reached its fixed point.
//!
//! In [`RunMode::Bounded`] the run also stops as soon as the accumulated failures contain
//! an edge outside a reference set (the failures a candidate assignment asserts). Such a
//! run is marked incomplete.

use crate::config::SimulatorConfig;
use crate::oracle::{FlowOracle, OracleError};
use crate::rebalance::Rebalancer;
use pgro_core::{EdgeKey, Grid, GridSnapshot, GridState, PgroError, Scenario, ScenarioId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum CascadeError {
    /// The oracle rejected a grid state. The run cannot continue.
    #[error("scenario {scenario}, cascade step {step}: {source}")]
    Fatal {
        scenario: ScenarioId,
        step: usize,
        #[source]
        source: OracleError,
    },
}

impl From<CascadeError> for PgroError {
    fn from(err: CascadeError) -> Self {
        PgroError::Oracle(err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RunMode<'r> {
    /// Run to the fixed point (or the depth bound).
    Complete,
    /// Stop once a failure outside `reference` has been simulated.
    Bounded { reference: &'r BTreeSet<EdgeKey> },
}

/// Summary of one cascade run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeTrace {
    pub scenario: ScenarioId,
    /// `steps[0]` holds the initial failures, `steps[i]` the overloads found after solve `i`
    pub steps: Vec<Vec<EdgeKey>>,
    pub all_failed: BTreeSet<EdgeKey>,
    /// False when the run stopped before a fixed point (bounded stop or depth bound)
    pub completed: bool,
    pub supplied_demand: f64,
    pub unserved_demand: f64,
    /// Live-edge flows of every solve, present when `record_flows` is set
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Vec<(EdgeKey, f64)>>,
}

impl CascadeTrace {
    /// Cascade depth `t`.
    pub fn depth(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn initial_failures(&self) -> &[EdgeKey] {
        self.steps.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(step, edge)` for every overload-induced failure, in cascade order.
    pub fn cascade_failures(&self) -> impl Iterator<Item = (usize, EdgeKey)> + '_ {
        self.steps
            .iter()
            .enumerate()
            .skip(1)
            .flat_map(|(step, edges)| edges.iter().map(move |&e| (step, e)))
    }

    pub fn has_failed(&self, edge: &EdgeKey) -> bool {
        self.all_failed.contains(edge)
    }
}

/// Trace plus the grid state left behind by the last rebalance.
#[derive(Debug, Clone)]
pub struct CascadeRun<'g> {
    pub trace: CascadeTrace,
    pub terminal: GridState<'g>,
}

pub struct CascadeSimulator<'a, O: FlowOracle + ?Sized> {
    oracle: &'a O,
    config: &'a SimulatorConfig,
}

impl<'a, O: FlowOracle + ?Sized> CascadeSimulator<'a, O> {
    pub fn new(oracle: &'a O, config: &'a SimulatorConfig) -> Self {
        Self { oracle, config }
    }

    /// Simulate one scenario on a fresh state of `grid`.
    pub fn run<'g>(
        &self,
        grid: &'g Grid,
        scenario: &Scenario,
        mode: RunMode<'_>,
    ) -> Result<CascadeRun<'g>, CascadeError> {
        let mut state = GridState::new(grid);
        let mut rebalancer = Rebalancer::new();

        let mut initial = scenario.initial_failures.clone();
        initial.sort();
        initial.dedup();
        let mut all_failed: BTreeSet<EdgeKey> = initial.iter().copied().collect();
        let mut steps = vec![initial];
        let mut flows = Vec::new();

        let mut step = 0;
        let completed = loop {
            let removed = state.remove_edges(&steps[step]);
            let balance = rebalancer.rebalance(&mut state);
            if self.config.trace_cascade_steps {
                debug!(
                    scenario = %scenario.id,
                    step,
                    removed,
                    components = balance.components,
                    starved = balance.starved_components,
                    shed = balance.shed_demand,
                    "applied cascade step"
                );
            }

            if steps[step].is_empty() {
                break true;
            }
            if let RunMode::Bounded { reference } = mode {
                if step > 0 && all_failed.iter().any(|e| !reference.contains(e)) {
                    debug!(scenario = %scenario.id, step, "bounded run stopped on contradiction");
                    break false;
                }
            }
            if step >= self.config.max_cascade_depth {
                warn!(
                    scenario = %scenario.id,
                    depth = step,
                    "cascade truncated at max_cascade_depth"
                );
                break false;
            }

            let solution = self
                .oracle
                .solve(&state)
                .map_err(|source| self.fatal(scenario.id, step, source))?;
            let overloaded = solution.overloaded(&state);
            if self.config.record_flows {
                flows.push(solution.live_flows(&state));
            }
            if self.config.trace_cascade_steps {
                debug!(
                    scenario = %scenario.id,
                    step,
                    oracle = self.oracle.name(),
                    overloaded = overloaded.len(),
                    "solved flows"
                );
            }

            all_failed.extend(overloaded.iter().copied());
            steps.push(overloaded);
            step += 1;
        };

        let trace = CascadeTrace {
            scenario: scenario.id,
            steps,
            all_failed,
            completed,
            supplied_demand: state.supplied_demand(),
            unserved_demand: state.unserved_demand(),
            flows,
        };
        Ok(CascadeRun {
            trace,
            terminal: state,
        })
    }

    /// Run several scenarios; results keep the order of `jobs`.
    pub fn run_all<'g>(
        &self,
        grid: &'g Grid,
        jobs: &[(&Scenario, RunMode<'_>)],
    ) -> Result<Vec<CascadeRun<'g>>, CascadeError> {
        #[cfg(feature = "parallel")]
        if self.config.runs_parallel() {
            use rayon::prelude::*;
            return jobs
                .par_iter()
                .map(|(scenario, mode)| self.run(grid, scenario, *mode))
                .collect();
        }
        jobs.iter()
            .map(|(scenario, mode)| self.run(grid, scenario, *mode))
            .collect()
    }

    fn fatal(&self, scenario: ScenarioId, step: usize, source: OracleError) -> CascadeError {
        error!(%scenario, step, oracle = self.oracle.name(), error = %source, "DC-flow oracle failed");
        if let (Some(dir), Some(snapshot)) = (&self.config.dump_dir, source.snapshot()) {
            match write_snapshot(dir, scenario, step, snapshot) {
                Ok(path) => error!(path = %path.display(), "wrote infeasible grid snapshot"),
                Err(err) => warn!(error = %err, "could not write grid snapshot"),
            }
        }
        CascadeError::Fatal {
            scenario,
            step,
            source,
        }
    }
}

fn write_snapshot(
    dir: &Path,
    scenario: ScenarioId,
    step: usize,
    snapshot: &GridSnapshot,
) -> Result<PathBuf, PgroError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("infeasible_s{scenario}_step{step}.json"));
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), snapshot)?;
    Ok(path)
}
