//! Instance directory and export tests

use pgro_algo::{
    CandidateAssignment, CascadeSimulator, DirectFlowOracle, RunMode, SimulatorConfig,
    VariableRegistry,
};
use pgro_core::{EdgeKey, NodeId, ScenarioId};
use pgro_io::{
    load_instance, read_candidate, read_trace_rows, write_solution_file, write_traces,
    TraceRowKind, EDGES_FILE, FAILURES_FILE, NODES_FILE, PROBABILITIES_FILE,
};
use std::fs;
use std::path::Path;

/// Weak ring: 1–2 carries 5, 2–3 fails in scenario 1, scenario 2 loses nothing
fn write_ring_instance(dir: &Path) {
    fs::write(
        dir.join(NODES_FILE),
        "node,demand,capacity,gen_upgrade,fixed,variable\n\
         1,15,0,0,0,0\n\
         2,0,10,0,0,0\n\
         3,0,10,0,0,0\n",
    )
    .unwrap();
    fs::write(
        dir.join(EDGES_FILE),
        "node1,node2,capacity,susceptance,fixed,variable\n\
         1,2,5,1,0,1\n\
         2,3,10,1,0,1\n\
         3,1,20,1,0,1\n",
    )
    .unwrap();
    fs::write(dir.join(PROBABILITIES_FILE), "scenario,probability\n1,0.75\n2,0.25\n").unwrap();
    fs::write(dir.join(FAILURES_FILE), "scenario,node1,node2\n1,3,2\n").unwrap();
}

#[test]
fn test_load_validate_and_simulate() {
    let dir = tempfile::tempdir().unwrap();
    write_ring_instance(dir.path());

    let instance = load_instance(dir.path()).unwrap();
    assert_eq!(instance.nodes.len(), 3);
    assert_eq!(instance.edges[2].key, EdgeKey::between(1, 3));
    assert_eq!(instance.scenarios[0].initial_failures, vec![EdgeKey::between(2, 3)]);
    assert!(instance.scenarios[1].initial_failures.is_empty());

    // scenario 2 has no failures: a warning, not an error
    let diagnostics = instance.validate().unwrap();
    assert_eq!(diagnostics.error_count(), 0);
    assert_eq!(diagnostics.warning_count(), 1);

    let grid = instance.base_grid().unwrap();
    let config = SimulatorConfig {
        record_flows: true,
        ..SimulatorConfig::default()
    };
    let sim = CascadeSimulator::new(&DirectFlowOracle, &config);
    let traces: Vec<_> = instance
        .scenarios
        .iter()
        .map(|s| sim.run(&grid, s, RunMode::Complete).unwrap().trace)
        .collect();

    let out = dir.path().join("traces");
    let written = write_traces(&out, &traces).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("cascade_s1.csv"));

    let rows = read_trace_rows(&written[0]).unwrap();
    let failures: Vec<(EdgeKey, usize)> = rows
        .iter()
        .filter(|r| r.kind == TraceRowKind::Overload)
        .map(|r| (r.edge(), r.par3))
        .collect();
    assert_eq!(
        failures,
        vec![(EdgeKey::between(2, 3), 0), (EdgeKey::between(1, 2), 1)]
    );
    let first_solve: Vec<f64> = rows
        .iter()
        .filter(|r| r.kind == TraceRowKind::Flow && r.par3 == 0)
        .map(|r| r.value.abs())
        .collect();
    assert_eq!(first_solve.len(), 2);
    assert!(first_solve.iter().all(|f| (f - 7.5).abs() < 1e-9));

    // the quiet scenario still gets a readable file
    let text = fs::read_to_string(&written[1]).unwrap();
    assert!(text.starts_with("type,par1,par2,par3,value"));
}

#[test]
fn test_missing_instance_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_ring_instance(dir.path());
    fs::remove_file(dir.path().join(FAILURES_FILE)).unwrap();
    let err = format!("{:#}", load_instance(dir.path()).unwrap_err());
    assert!(err.contains(FAILURES_FILE), "{err}");
}

#[test]
fn test_solution_file_reads_back_as_candidate() {
    let dir = tempfile::tempdir().unwrap();
    write_ring_instance(dir.path());
    let instance = load_instance(dir.path()).unwrap();
    let registry = VariableRegistry::for_instance(&instance).unwrap();

    let mut candidate = CandidateAssignment::zeros(&registry);
    let f12 = registry
        .failure(EdgeKey::between(1, 2), ScenarioId::new(1))
        .unwrap();
    candidate.set(f12, 1.0);
    candidate.assign(
        &registry,
        &pgro_algo::VarKey::GenerationBackup {
            node: NodeId::new(2),
        },
        1.0,
    );

    let path = dir.path().join("solution.csv");
    write_solution_file(&path, &registry, candidate.values()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("name,value\ng_1s1,0\n"), "{text}");
    assert!(text.contains("F_1_2s1,1\n"));

    assert_eq!(read_candidate(&path, &registry).unwrap(), candidate);

    fs::write(&path, "name,value\nF_9_9s1,1\n").unwrap();
    assert!(read_candidate(&path, &registry).is_err());
}
