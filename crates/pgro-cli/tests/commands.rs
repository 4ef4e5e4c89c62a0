//! Command handler tests against a small instance directory

use pgro_algo::{OracleKind, SimulatorConfig};
use pgro_cli::commands::{check, load_config, simulate, validate};
use std::fs;
use std::path::Path;

/// Weak ring: line 1–2 overloads once 2–3 is lost
fn write_instance(dir: &Path) {
    fs::write(
        dir.join("grid_nodes.csv"),
        "id,d,c,ub,H,h\n1,15,0,0,0,0\n2,0,10,0,0,0\n3,0,10,0,0,0\n",
    )
    .unwrap();
    fs::write(
        dir.join("grid_edges.csv"),
        "i,j,c,x,H,h\n1,2,5,1,0,1\n2,3,10,1,0,1\n1,3,20,1,0,1\n",
    )
    .unwrap();
    fs::write(dir.join("scenario_probabilities.csv"), "s,p\n1,1\n").unwrap();
    fs::write(dir.join("scenario_failures.csv"), "s,i,j\n1,2,3\n").unwrap();
}

fn direct() -> SimulatorConfig {
    SimulatorConfig {
        oracle: OracleKind::Direct,
        ..SimulatorConfig::default()
    }
}

#[test]
fn test_simulate_prints_table_and_writes_traces() {
    let dir = tempfile::tempdir().unwrap();
    write_instance(dir.path());
    let traces = dir.path().join("out");

    let mut out = Vec::new();
    let summary = simulate::handle(dir.path(), direct(), Some(&traces), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("SCENARIO"));
    assert!(text.contains("expected unserved demand: 5.0000"), "{text}");
    assert_eq!(summary.traces[0].depth(), 2);
    assert!(traces.join("cascade_s1.csv").exists());
}

#[test]
fn test_check_reports_cuts_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write_instance(dir.path());
    let candidate = dir.path().join("candidate.csv");
    fs::write(&candidate, "name,value\nF_2_3s1,1\nF_1_3s1,1\n").unwrap();

    let mut out = Vec::new();
    let report = check::handle(dir.path(), &candidate, direct(), false, &mut out).unwrap();
    assert_eq!(report.cuts.len(), 2);

    let document: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(document["consistent"], false);
    assert_eq!(document["cuts"][0]["kind"], "should_have_failed");
    assert_eq!(document["cuts"][0]["edge"], "(1, 2)");
    assert_eq!(document["cuts"][1]["kind"], "should_have_survived");
    assert_eq!(document["scenarios"][0]["depth"], 2);
}

#[test]
fn test_validate_flags_unknown_failure_edge() {
    let dir = tempfile::tempdir().unwrap();
    write_instance(dir.path());
    fs::write(dir.path().join("scenario_failures.csv"), "s,i,j\n1,2,7\n").unwrap();

    let mut out = Vec::new();
    let diagnostics = validate::handle(dir.path(), &mut out).unwrap();
    assert!(diagnostics.has_errors());
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("not a grid edge"), "{text}");
}

#[test]
fn test_validate_warns_on_islands() {
    let dir = tempfile::tempdir().unwrap();
    write_instance(dir.path());
    fs::write(
        dir.path().join("grid_edges.csv"),
        "i,j,c,x,H,h\n1,2,5,1,0,1\n",
    )
    .unwrap();
    fs::write(dir.path().join("scenario_failures.csv"), "s,i,j\n1,1,2\n").unwrap();

    let mut out = Vec::new();
    let diagnostics = validate::handle(dir.path(), &mut out).unwrap();
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(String::from_utf8(out).unwrap().contains("2 islands"));
}

#[test]
fn test_config_file_is_optional() {
    assert_eq!(load_config(None).unwrap(), SimulatorConfig::default());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.toml");
    fs::write(&path, "oracle = \"direct\"\nmax_cascade_depth = 3\n").unwrap();
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.oracle, OracleKind::Direct);
    assert_eq!(config.max_cascade_depth, 3);

    fs::write(&path, "oracle = \"simplex\"\n").unwrap();
    assert!(load_config(Some(&path)).is_err());
}
