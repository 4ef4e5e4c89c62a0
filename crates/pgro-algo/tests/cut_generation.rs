//! Consistency cut tests

use pgro_algo::{
    CandidateAssignment, ContradictionKind, CutGenerator, DirectFlowOracle, OracleKind,
    SimulatorConfig, VarKey, VariableRegistry,
};
use pgro_core::{EdgeKey, EdgeRecord, NodeId, NodeRecord, PlanningInstance, Scenario, ScenarioId};

fn node(id: usize, demand: f64, capacity: f64, upgrade_bound: f64) -> NodeRecord {
    NodeRecord {
        id: NodeId::new(id),
        demand,
        capacity,
        generation_upgrade_bound: upgrade_bound,
        fixed_cost: 1.0,
        variable_cost: 1.0,
    }
}

fn line(a: usize, b: usize, capacity: f64) -> EdgeRecord {
    EdgeRecord {
        key: EdgeKey::between(a, b),
        capacity,
        susceptance: 1.0,
        fixed_cost: 0.0,
        variable_cost: 1.0,
    }
}

/// Five-node grid with ample line capacity
/// Node 1 feeds loads at 2..5; scenario 1 loses line 3–4 and nothing cascades
fn create_feeder() -> PlanningInstance {
    PlanningInstance {
        nodes: vec![
            node(1, 0.0, 20.0, 0.0),
            node(2, 5.0, 0.0, 0.0),
            node(3, 5.0, 0.0, 0.0),
            node(4, 5.0, 0.0, 0.0),
            node(5, 3.0, 0.0, 0.0),
        ],
        edges: vec![
            line(1, 2, 20.0),
            line(2, 3, 20.0),
            line(1, 4, 20.0),
            line(2, 5, 20.0),
            line(3, 4, 20.0),
        ],
        scenarios: vec![Scenario::new(
            ScenarioId::new(1),
            1.0,
            vec![EdgeKey::between(3, 4)],
        )],
    }
}

/// Ring whose weak line 1–2 overloads once 2–3 is lost
fn create_weak_ring() -> PlanningInstance {
    PlanningInstance {
        nodes: vec![
            node(1, 15.0, 0.0, 0.0),
            node(2, 0.0, 10.0, 0.0),
            node(3, 0.0, 10.0, 0.0),
        ],
        edges: vec![line(1, 2, 5.0), line(2, 3, 10.0), line(1, 3, 20.0)],
        scenarios: vec![Scenario::new(
            ScenarioId::new(1),
            1.0,
            vec![EdgeKey::between(2, 3)],
        )],
    }
}

fn direct_config() -> SimulatorConfig {
    SimulatorConfig {
        oracle: OracleKind::Direct,
        ..SimulatorConfig::default()
    }
}

fn failure(a: usize, b: usize) -> VarKey {
    VarKey::Failure {
        edge: EdgeKey::between(a, b),
        scenario: ScenarioId::new(1),
    }
}

#[test]
fn test_asserted_failure_that_never_happens_yields_one_cut() {
    let instance = create_feeder();
    let registry = VariableRegistry::for_instance(&instance).unwrap();
    let config = direct_config();
    let candidate = CandidateAssignment::from_named(
        &registry,
        [("F_3_4s1", 1.0), ("F_2_5s1", 1.0), ("c_1_2", 1.0)],
    )
    .unwrap();

    let generator = CutGenerator::new(&instance, &registry, &config, &DirectFlowOracle);
    let report = generator.check(&candidate, false).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.cuts.len(), 1);

    let cut = &report.cuts[0];
    assert_eq!(cut.kind, ContradictionKind::ShouldHaveSurvived);
    assert_eq!(cut.edge, EdgeKey::between(2, 5));
    assert_eq!(cut.step, None);

    // five Z and five line upgrades; only c_1_2 sits at its upper bound
    let f25 = registry.handle(&failure(2, 5)).unwrap();
    assert_eq!(cut.positions.len(), 11);
    assert_eq!(cut.positions.last(), Some(&f25));
    assert_eq!(cut.coefficients.last(), Some(&1.0));
    assert!((cut.rhs - (2.0 - config.cut_epsilon)).abs() < 1e-12);
    for handle in registry.investment_handles() {
        if registry.info(handle).upper > registry.info(handle).lower {
            assert!(cut.positions.contains(&handle), "{}", registry.name(handle));
        }
    }

    // violated as found, satisfied once the indicator or the investments change
    assert!(cut.is_violated_by(candidate.values()));
    let mut relabelled = candidate.clone();
    relabelled.set(f25, 0.0);
    assert!(!cut.is_violated_by(relabelled.values()));
    let mut reinvested = candidate.clone();
    reinvested.assign(
        &registry,
        &VarKey::GenerationBackup {
            node: NodeId::new(4),
        },
        1.0,
    );
    assert!(!cut.is_violated_by(reinvested.values()));
}

#[test]
fn test_consistent_candidate_has_no_cuts() {
    let instance = create_weak_ring();
    let registry = VariableRegistry::for_instance(&instance).unwrap();
    let config = direct_config();
    let candidate =
        CandidateAssignment::from_named(&registry, [("F_2_3s1", 1.0), ("F_1_2s1", 1.0)]).unwrap();

    let report = CutGenerator::new(&instance, &registry, &config, &DirectFlowOracle)
        .check(&candidate, false)
        .unwrap();
    assert!(report.is_consistent());
    assert!((report.expected_supplied - 10.0).abs() < 1e-9);
    assert!((report.expected_unserved - 5.0).abs() < 1e-9);
}

#[test]
fn test_missed_cascade_failure_is_cut() {
    let instance = create_weak_ring();
    let registry = VariableRegistry::for_instance(&instance).unwrap();
    let config = direct_config();
    let candidate = CandidateAssignment::from_named(&registry, [("F_2_3s1", 1.0)]).unwrap();

    let report = CutGenerator::new(&instance, &registry, &config, &DirectFlowOracle)
        .check(&candidate, false)
        .unwrap();
    assert_eq!(report.cuts.len(), 1);
    let cut = &report.cuts[0];
    assert_eq!(cut.kind, ContradictionKind::ShouldHaveFailed);
    assert_eq!(cut.edge, EdgeKey::between(1, 2));
    assert_eq!(cut.step, Some(1));
    assert_eq!(cut.coefficients.last(), Some(&-1.0));

    let f12 = registry.handle(&failure(1, 2)).unwrap();
    assert!(cut.is_violated_by(candidate.values()));
    let mut relabelled = candidate.clone();
    relabelled.set(f12, 1.0);
    assert!(!cut.is_violated_by(relabelled.values()));
}

#[test]
fn test_bounded_check_skips_survival_cuts() {
    let instance = create_weak_ring();
    let registry = VariableRegistry::for_instance(&instance).unwrap();
    let config = direct_config();
    // 1–3 asserted failed, 1–2 asserted fine: both wrong
    let candidate =
        CandidateAssignment::from_named(&registry, [("F_2_3s1", 1.0), ("F_1_3s1", 1.0)]).unwrap();
    let generator = CutGenerator::new(&instance, &registry, &config, &DirectFlowOracle);

    let complete = generator.check(&candidate, false).unwrap();
    let kinds: Vec<_> = complete.cuts.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ContradictionKind::ShouldHaveFailed,
            ContradictionKind::ShouldHaveSurvived
        ]
    );

    let bounded = generator.check(&candidate, true).unwrap();
    assert!(bounded.bounded);
    assert!(!bounded.is_complete());
    assert_eq!(bounded.cuts.len(), 1);
    assert_eq!(bounded.cuts[0].kind, ContradictionKind::ShouldHaveFailed);
}

#[test]
fn test_interior_continuous_investment_is_left_out() {
    let mut instance = create_feeder();
    instance.nodes[0].generation_upgrade_bound = 4.0;
    let registry = VariableRegistry::for_instance(&instance).unwrap();
    let config = direct_config();
    let c1 = registry
        .handle(&VarKey::GenerationUpgrade {
            node: NodeId::new(1),
        })
        .unwrap();

    let interior = CandidateAssignment::from_named(
        &registry,
        [("F_3_4s1", 1.0), ("F_2_5s1", 1.0), ("c_1", 2.0)],
    )
    .unwrap();
    let generator = CutGenerator::new(&instance, &registry, &config, &DirectFlowOracle);
    let cut = &generator.check(&interior, false).unwrap().cuts[0];
    assert!(!cut.positions.contains(&c1));

    let at_upper = CandidateAssignment::from_named(
        &registry,
        [("F_3_4s1", 1.0), ("F_2_5s1", 1.0), ("c_1", 4.0)],
    )
    .unwrap();
    let cut = &generator.check(&at_upper, false).unwrap().cuts[0];
    let at = cut.positions.iter().position(|h| *h == c1).unwrap();
    assert!((cut.coefficients[at] - 0.25).abs() < 1e-12);
    assert!(cut.is_violated_by(at_upper.values()));
    assert!(!cut.is_violated_by(interior.values()));
}
