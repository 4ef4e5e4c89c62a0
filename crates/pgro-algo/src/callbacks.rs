//! Entry points for the external MIP solver's callbacks.
//!
//! The solver registers a [`SolverCallbacks`] implementation at setup time and invokes it
//! serially: once per integer-feasible node (lazy constraints) and whenever it offers a
//! heuristic slot. Nothing here keeps solver-internal handles between calls.

use crate::candidate::CandidateAssignment;
use crate::config::SimulatorConfig;
use crate::cuts::{CheckReport, Cut, CutGenerator};
use crate::heuristic::{repair_incumbent, HeuristicSolution, IncumbentTracker, MipSubSolver};
use crate::oracle::FlowOracle;
use crate::registry::VariableRegistry;
use pgro_core::{PgroResult, PlanningInstance};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, warn};

pub trait SolverCallbacks {
    /// Lazy-constraint callback. An empty list accepts the candidate.
    fn on_integer_feasible(&mut self, candidate: &CandidateAssignment) -> PgroResult<Vec<Cut>>;

    /// Heuristic callback. Returns a full solution or nothing.
    fn on_heuristic_opportunity(&mut self) -> PgroResult<Option<HeuristicSolution>>;
}

/// Cascade-aware planning callbacks over one instance.
pub struct CascadePlanner<O: FlowOracle, S: MipSubSolver> {
    instance: PlanningInstance,
    registry: VariableRegistry,
    config: SimulatorConfig,
    oracle: O,
    sub_solver: S,
    tracker: IncumbentTracker,
    rng: StdRng,
    rounds: usize,
}

impl<O: FlowOracle, S: MipSubSolver> CascadePlanner<O, S> {
    /// Validate the instance and lay out its variable registry.
    pub fn new(
        instance: PlanningInstance,
        config: SimulatorConfig,
        oracle: O,
        sub_solver: S,
    ) -> PgroResult<Self> {
        config.validate()?;
        let diagnostics = instance.validate()?;
        if !diagnostics.is_empty() {
            warn!(issues = %diagnostics.summary(), "planning instance has warnings");
        }
        let registry = VariableRegistry::for_instance(&instance)?;
        info!(
            nodes = instance.nodes.len(),
            edges = instance.edges.len(),
            scenarios = instance.scenarios.len(),
            variables = registry.len(),
            oracle = oracle.name(),
            "cascade planner ready"
        );
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            instance,
            registry,
            config,
            oracle,
            sub_solver,
            tracker: IncumbentTracker::new(),
            rounds: 0,
        })
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn instance(&self) -> &PlanningInstance {
        &self.instance
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn sub_solver(&self) -> &S {
        &self.sub_solver
    }

    pub fn best_supplied(&self) -> f64 {
        self.tracker.best()
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Check a candidate, feeding the incumbent tracker. One bounded/complete draw per call.
    pub fn check(&mut self, candidate: &CandidateAssignment) -> PgroResult<CheckReport> {
        self.rounds += 1;
        let fraction = self.config.partial_run_fraction;
        let bounded = fraction > 0.0 && self.rng.gen::<f64>() < fraction;

        let report = CutGenerator::new(&self.instance, &self.registry, &self.config, &self.oracle)
            .check(candidate, bounded)?;
        let armed = self.tracker.observe(candidate, &report);

        info!(
            round = self.rounds,
            bounded,
            cuts = report.cuts.len(),
            expected_supplied = report.expected_supplied,
            best_supplied = self.tracker.best(),
            armed,
            "integer-feasible candidate checked"
        );
        Ok(report)
    }
}

impl<O: FlowOracle, S: MipSubSolver> SolverCallbacks for CascadePlanner<O, S> {
    fn on_integer_feasible(&mut self, candidate: &CandidateAssignment) -> PgroResult<Vec<Cut>> {
        Ok(self.check(candidate)?.cuts)
    }

    fn on_heuristic_opportunity(&mut self) -> PgroResult<Option<HeuristicSolution>> {
        Ok(repair_incumbent(
            &mut self.tracker,
            &mut self.sub_solver,
            &self.registry,
        )?)
    }
}
