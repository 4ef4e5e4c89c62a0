//! Incumbent repair from simulated cascades.
//!
//! When a complete round beats the best expected supplied demand seen so far, the round's
//! investments and simulated failure labels are kept. At the next heuristic opportunity
//! they are fixed on a copy of the full model and the remainder is re-solved by a
//! [`MipSubSolver`]. The result is offered back to the search as a full primal solution.

use crate::candidate::CandidateAssignment;
use crate::cuts::CheckReport;
use crate::registry::{VarDomain, VarHandle, VarKey, VariableRegistry};
use pgro_core::{EdgeKey, PgroError, ScenarioId};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum HeuristicError {
    #[error("fixed sub-model is infeasible")]
    Infeasible,

    #[error("sub-solver failed: {0}")]
    Solver(String),
}

impl From<HeuristicError> for PgroError {
    fn from(err: HeuristicError) -> Self {
        PgroError::Solver(err.to_string())
    }
}

/// Values and objective of a re-solved model.
#[derive(Debug, Clone, PartialEq)]
pub struct SubSolveOutcome {
    pub values: Vec<f64>,
    pub objective: f64,
}

/// Re-solves the full planning model with some columns fixed.
pub trait MipSubSolver {
    fn solve_with_fixings(
        &mut self,
        registry: &VariableRegistry,
        fixings: &[(VarHandle, f64)],
    ) -> Result<SubSolveOutcome, HeuristicError>;
}

impl<T: MipSubSolver + ?Sized> MipSubSolver for Box<T> {
    fn solve_with_fixings(
        &mut self,
        registry: &VariableRegistry,
        fixings: &[(VarHandle, f64)],
    ) -> Result<SubSolveOutcome, HeuristicError> {
        (**self).solve_with_fixings(registry, fixings)
    }
}

/// A complete solution for the solver's incumbent interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicSolution {
    pub indices: Vec<VarHandle>,
    pub values: Vec<f64>,
    pub objective: f64,
}

#[derive(Debug, Clone)]
pub struct IncumbentSnapshot {
    pub candidate: CandidateAssignment,
    pub all_failed: HashMap<ScenarioId, BTreeSet<EdgeKey>>,
    pub expected_supplied: f64,
}

impl IncumbentSnapshot {
    /// Investment columns (binaries rounded) and every failure indicator set from the
    /// simulated labels.
    pub fn fixings(&self, registry: &VariableRegistry) -> Vec<(VarHandle, f64)> {
        registry
            .iter()
            .filter_map(|(handle, info)| match info.key {
                VarKey::Failure { edge, scenario } => {
                    let failed = self
                        .all_failed
                        .get(&scenario)
                        .is_some_and(|set| set.contains(&edge));
                    Some((handle, if failed { 1.0 } else { 0.0 }))
                }
                key if key.is_investment() => {
                    let value = self.candidate.value(handle);
                    let value = match info.domain {
                        VarDomain::Binary => value.round(),
                        VarDomain::Continuous => value.clamp(info.lower, info.upper),
                    };
                    Some((handle, value))
                }
                _ => None,
            })
            .collect()
    }
}

/// Best expected supplied demand over complete rounds, plus the snapshot that set it.
#[derive(Debug, Clone, Default)]
pub struct IncumbentTracker {
    best: f64,
    pending: Option<IncumbentSnapshot>,
}

impl IncumbentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a checked round. Returns true when it armed the heuristic.
    pub fn observe(&mut self, candidate: &CandidateAssignment, report: &CheckReport) -> bool {
        if report.bounded || !report.is_complete() {
            return false;
        }
        if report.expected_supplied <= self.best {
            return false;
        }
        debug!(
            previous = self.best,
            current = report.expected_supplied,
            "new best simulated supply"
        );
        self.best = report.expected_supplied;
        self.pending = Some(IncumbentSnapshot {
            candidate: candidate.clone(),
            all_failed: report.all_failed().into_iter().collect(),
            expected_supplied: report.expected_supplied,
        });
        true
    }

    pub fn take(&mut self) -> Option<IncumbentSnapshot> {
        self.pending.take()
    }
}

/// Consume the pending snapshot, if any, and re-solve the fixed model.
pub fn repair_incumbent<S: MipSubSolver + ?Sized>(
    tracker: &mut IncumbentTracker,
    sub_solver: &mut S,
    registry: &VariableRegistry,
) -> Result<Option<HeuristicSolution>, HeuristicError> {
    let Some(snapshot) = tracker.take() else {
        return Ok(None);
    };
    let fixings = snapshot.fixings(registry);

    let outcome = match sub_solver.solve_with_fixings(registry, &fixings) {
        Ok(outcome) => outcome,
        Err(HeuristicError::Infeasible) => {
            warn!(
                fixed = fixings.len(),
                "fixed sub-model infeasible, no incumbent offered"
            );
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    if outcome.values.len() != registry.len() {
        warn!(
            got = outcome.values.len(),
            expected = registry.len(),
            "sub-solver returned a partial solution, dropped"
        );
        return Ok(None);
    }

    info!(
        objective = outcome.objective,
        simulated_supply = snapshot.expected_supplied,
        fixed = fixings.len(),
        "offering repaired incumbent"
    );
    Ok(Some(HeuristicSolution {
        indices: (0..registry.len()).map(VarHandle::new).collect(),
        values: outcome.values,
        objective: outcome.objective,
    }))
}
