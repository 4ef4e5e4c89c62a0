use anyhow::{Context, Result};
use pgro_algo::{oracle_for, CheckReport, CutGenerator, SimulatorConfig, VariableRegistry};
use serde_json::json;
use std::io::Write;
use std::path::Path;

/// Run the cut generator on a candidate file and print the report as JSON.
pub fn handle(
    instance_dir: &Path,
    candidate_path: &Path,
    config: SimulatorConfig,
    bounded: bool,
    out: &mut impl Write,
) -> Result<CheckReport> {
    let instance = super::load_valid_instance(instance_dir)?;
    let registry = VariableRegistry::for_instance(&instance)?;
    let candidate = pgro_io::read_candidate(candidate_path, &registry)?;
    let oracle = oracle_for(config.oracle)?;

    let report = CutGenerator::new(&instance, &registry, &config, oracle.as_ref())
        .check(&candidate, bounded)
        .context("checking candidate")?;

    let cuts: Vec<_> = report
        .cuts
        .iter()
        .map(|cut| {
            json!({
                "scenario": cut.scenario,
                "edge": cut.edge.to_string(),
                "kind": cut.kind,
                "step": cut.step,
                "constraint": cut.describe(&registry),
            })
        })
        .collect();
    let scenarios: Vec<_> = report
        .traces
        .iter()
        .map(|trace| {
            json!({
                "scenario": trace.scenario,
                "depth": trace.depth(),
                "completed": trace.completed,
                "all_failed": trace.all_failed.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
                "unserved_demand": trace.unserved_demand,
            })
        })
        .collect();
    let document = json!({
        "consistent": report.is_consistent(),
        "bounded": report.bounded,
        "expected_supplied": report.expected_supplied,
        "expected_unserved": report.expected_unserved,
        "scenarios": scenarios,
        "cuts": cuts,
    });
    serde_json::to_writer_pretty(&mut *out, &document).context("writing check report")?;
    writeln!(out)?;
    Ok(report)
}
