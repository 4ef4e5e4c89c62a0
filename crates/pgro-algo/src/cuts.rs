//! Consistency check of candidate assignments and contradiction cuts.
//!
//! A candidate fixes the investments and asserts, per scenario, which edges fail. The
//! checker builds the implied grid, simulates every scenario and compares:
//!
//! - an edge failed in the simulation but the candidate says it survived
//!   ([`ContradictionKind::ShouldHaveFailed`])
//! - an edge never failed in a complete simulation but the candidate says it failed
//!   ([`ContradictionKind::ShouldHaveSurvived`])
//!
//! Each contradiction yields a no-good cut. Every investment column pinned at a bound
//! contributes a normalized literal that equals 1 exactly at the current value:
//!
//! ```text
//! at upper:  (y − l) / (u − l)        at lower:  (u − y) / (u − l)
//! ```
//!
//! With `T` the sum of the `n` literals and `F` the contradicted failure indicator:
//!
//! ```text
//! should have failed:    T − F ≤ n − ε
//! should have survived:  T + F ≤ n + 1 − ε
//! ```
//!
//! Both are violated by the current candidate and satisfied as soon as one investment
//! moves off its bound or the indicator flips. Constants are folded into the right-hand
//! side, so for binary investments the coefficients are ±1 and the right-hand side is
//! `#upper − ε` or `#upper + 1 − ε`.

use crate::candidate::CandidateAssignment;
use crate::cascade::{CascadeError, CascadeSimulator, CascadeTrace, RunMode};
use crate::config::SimulatorConfig;
use crate::implied::implied_grid;
use crate::oracle::FlowOracle;
use crate::registry::{VarHandle, VarKey, VariableRegistry};
use pgro_core::{EdgeKey, PgroError, PlanningInstance, Scenario, ScenarioId};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

/// Slack used when testing a cut against a point.
const VIOLATION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum CutError {
    #[error("candidate has {got} values, model has {expected} variables")]
    CandidateLength { got: usize, expected: usize },

    #[error("no failure variable for edge {edge} in scenario {scenario}")]
    MissingFailureVariable { edge: EdgeKey, scenario: ScenarioId },

    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error(transparent)]
    Instance(#[from] PgroError),
}

impl From<CutError> for PgroError {
    fn from(err: CutError) -> Self {
        match err {
            CutError::Instance(inner) => inner,
            CutError::Cascade(inner) => inner.into(),
            other => PgroError::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    /// Simulated failure asserted as survived
    ShouldHaveFailed,
    /// Asserted failure the complete simulation never produced
    ShouldHaveSurvived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CutSense {
    #[serde(rename = "<=")]
    LessEqual,
}

/// A linear inequality over the candidate's column space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cut {
    pub scenario: ScenarioId,
    pub edge: EdgeKey,
    pub kind: ContradictionKind,
    /// Cascade step at which the edge failed (should-have-failed cuts only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub positions: Vec<VarHandle>,
    pub coefficients: Vec<f64>,
    pub sense: CutSense,
    pub rhs: f64,
}

impl Cut {
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.positions
            .iter()
            .zip(&self.coefficients)
            .map(|(h, c)| c * values[h.index()])
            .sum()
    }

    pub fn is_violated_by(&self, values: &[f64]) -> bool {
        match self.sense {
            CutSense::LessEqual => self.lhs(values) > self.rhs + VIOLATION_TOLERANCE,
        }
    }

    /// Human-readable form using registry names, e.g. `c_1_2 - X_2_5 - F_2_5s1 <= 0.999`.
    pub fn describe(&self, registry: &VariableRegistry) -> String {
        let mut text = String::new();
        for (i, (h, c)) in self.positions.iter().zip(&self.coefficients).enumerate() {
            let sign = if *c < 0.0 { "-" } else { "+" };
            if i == 0 {
                if *c < 0.0 {
                    text.push('-');
                }
            } else {
                text.push_str(&format!(" {sign} "));
            }
            if (c.abs() - 1.0).abs() > f64::EPSILON {
                text.push_str(&format!("{} ", c.abs()));
            }
            text.push_str(registry.name(*h));
        }
        format!("{text} <= {}", self.rhs)
    }
}

/// Normalized literals of the pinned investment columns.
#[derive(Debug, Clone, Default)]
pub struct InvestmentLiterals {
    pub terms: Vec<(VarHandle, f64)>,
    /// Sum of the literals' constant parts
    pub constant: f64,
    /// Number of pinned columns (`n`)
    pub pinned: usize,
}

impl InvestmentLiterals {
    pub fn from_candidate(
        registry: &VariableRegistry,
        candidate: &CandidateAssignment,
        config: &SimulatorConfig,
    ) -> Self {
        let mut literals = Self::default();
        for handle in registry.investment_handles() {
            let info = registry.info(handle);
            let span = info.upper - info.lower;
            if span <= 0.0 {
                continue;
            }
            let value = candidate.value(handle);
            let band = config.integrality_tolerance * span;
            if value >= info.upper - band {
                literals.terms.push((handle, 1.0 / span));
                literals.constant -= info.lower / span;
            } else if value <= info.lower + band {
                literals.terms.push((handle, -1.0 / span));
                literals.constant += info.upper / span;
            } else {
                debug!(variable = %info.name, value, "investment strictly inside its bounds, left out of cuts");
                continue;
            }
            literals.pinned += 1;
        }
        literals
    }

    fn cut(
        &self,
        trace: &CascadeTrace,
        edge: EdgeKey,
        failure: VarHandle,
        kind: ContradictionKind,
        step: Option<usize>,
        epsilon: f64,
    ) -> Cut {
        let (sign, offset) = match kind {
            ContradictionKind::ShouldHaveFailed => (-1.0, 0.0),
            ContradictionKind::ShouldHaveSurvived => (1.0, 1.0),
        };
        let mut positions: Vec<VarHandle> = self.terms.iter().map(|(h, _)| *h).collect();
        let mut coefficients: Vec<f64> = self.terms.iter().map(|(_, c)| *c).collect();
        positions.push(failure);
        coefficients.push(sign);
        Cut {
            scenario: trace.scenario,
            edge,
            kind,
            step,
            positions,
            coefficients,
            sense: CutSense::LessEqual,
            rhs: self.pinned as f64 + offset - epsilon - self.constant,
        }
    }
}

/// Outcome of checking one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub traces: Vec<CascadeTrace>,
    pub cuts: Vec<Cut>,
    /// The round used bounded (partial) cascades
    pub bounded: bool,
    /// Σ p_s · supplied demand of the terminal grids
    pub expected_supplied: f64,
    pub expected_unserved: f64,
}

impl CheckReport {
    /// Every scenario reached its fixed point.
    pub fn is_complete(&self) -> bool {
        self.traces.iter().all(|t| t.completed)
    }

    pub fn is_consistent(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn all_failed(&self) -> Vec<(ScenarioId, BTreeSet<EdgeKey>)> {
        self.traces
            .iter()
            .map(|t| (t.scenario, t.all_failed.clone()))
            .collect()
    }
}

/// Runs the consistency check for candidates of one planning instance.
pub struct CutGenerator<'a, O: FlowOracle + ?Sized> {
    instance: &'a PlanningInstance,
    registry: &'a VariableRegistry,
    config: &'a SimulatorConfig,
    oracle: &'a O,
}

impl<'a, O: FlowOracle + ?Sized> CutGenerator<'a, O> {
    pub fn new(
        instance: &'a PlanningInstance,
        registry: &'a VariableRegistry,
        config: &'a SimulatorConfig,
        oracle: &'a O,
    ) -> Self {
        Self {
            instance,
            registry,
            config,
            oracle,
        }
    }

    /// Simulate every scenario on the candidate's implied grid and derive cuts.
    pub fn check(
        &self,
        candidate: &CandidateAssignment,
        bounded: bool,
    ) -> Result<CheckReport, CutError> {
        if candidate.len() != self.registry.len() {
            return Err(CutError::CandidateLength {
                got: candidate.len(),
                expected: self.registry.len(),
            });
        }

        let grid = implied_grid(self.instance, self.registry, candidate, self.config)?;
        let literals = InvestmentLiterals::from_candidate(self.registry, candidate, self.config);

        let threshold = 1.0 - self.config.integrality_tolerance;
        let references: Vec<BTreeSet<EdgeKey>> = self
            .instance
            .scenarios
            .iter()
            .map(|s| candidate.asserted_failures(self.registry, s.id, threshold))
            .collect();
        let jobs: Vec<(&Scenario, RunMode<'_>)> = self
            .instance
            .scenarios
            .iter()
            .zip(&references)
            .map(|(scenario, reference)| {
                let mode = if bounded {
                    RunMode::Bounded { reference }
                } else {
                    RunMode::Complete
                };
                (scenario, mode)
            })
            .collect();

        let runs = CascadeSimulator::new(self.oracle, self.config).run_all(&grid, &jobs)?;

        let mut cuts = Vec::new();
        let mut expected_supplied = 0.0;
        let mut expected_unserved = 0.0;
        let mut traces = Vec::with_capacity(runs.len());
        for (run, scenario) in runs.into_iter().zip(&self.instance.scenarios) {
            expected_supplied += scenario.probability * run.trace.supplied_demand;
            expected_unserved += scenario.probability * run.trace.unserved_demand;
            cuts.extend(self.cuts_for_trace(&run.trace, candidate, &literals)?);
            traces.push(run.trace);
        }

        info!(
            scenarios = traces.len(),
            cuts = cuts.len(),
            bounded,
            pinned_investments = literals.pinned,
            expected_unserved,
            "checked candidate"
        );

        Ok(CheckReport {
            traces,
            cuts,
            bounded,
            expected_supplied,
            expected_unserved,
        })
    }

    /// Cuts for one scenario's trace, at most `max_cuts_per_scenario` of them.
    pub fn cuts_for_trace(
        &self,
        trace: &CascadeTrace,
        candidate: &CandidateAssignment,
        literals: &InvestmentLiterals,
    ) -> Result<Vec<Cut>, CutError> {
        let limit = self.config.max_cuts_per_scenario.unwrap_or(usize::MAX);
        let epsilon = self.config.cut_epsilon;
        let mut cuts = Vec::new();

        for (step, edge) in trace.cascade_failures() {
            if cuts.len() >= limit {
                return Ok(cuts);
            }
            let failure = self.registry.failure(edge, trace.scenario).ok_or(
                CutError::MissingFailureVariable {
                    edge,
                    scenario: trace.scenario,
                },
            )?;
            if self.config.is_zero(candidate.value(failure)) {
                debug!(scenario = %trace.scenario, %edge, step, "edge failed in simulation but asserted survived");
                cuts.push(literals.cut(
                    trace,
                    edge,
                    failure,
                    ContradictionKind::ShouldHaveFailed,
                    Some(step),
                    epsilon,
                ));
            }
        }

        if !trace.completed {
            return Ok(cuts);
        }

        for (failure, info) in self.registry.iter() {
            let VarKey::Failure { edge, scenario } = info.key else {
                continue;
            };
            if scenario != trace.scenario || trace.has_failed(&edge) {
                continue;
            }
            if cuts.len() >= limit {
                break;
            }
            if self.config.is_one(candidate.value(failure)) {
                debug!(scenario = %trace.scenario, %edge, "edge asserted failed but survived the cascade");
                cuts.push(literals.cut(
                    trace,
                    edge,
                    failure,
                    ContradictionKind::ShouldHaveSurvived,
                    None,
                    epsilon,
                ));
            }
        }

        Ok(cuts)
    }
}
