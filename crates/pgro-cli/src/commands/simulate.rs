use anyhow::{Context, Result};
use pgro_algo::{oracle_for, CascadeSimulator, CascadeTrace, RunMode, SimulatorConfig};
use std::io::Write;
use std::path::Path;
use tabwriter::TabWriter;
use tracing::info;

pub struct SimulateSummary {
    pub traces: Vec<CascadeTrace>,
    pub expected_unserved: f64,
}

pub fn handle(
    instance_dir: &Path,
    mut config: SimulatorConfig,
    trace_dir: Option<&Path>,
    out: &mut impl Write,
) -> Result<SimulateSummary> {
    let instance = super::load_valid_instance(instance_dir)?;
    let grid = instance.base_grid()?;
    if trace_dir.is_some() {
        config.record_flows = true;
    }
    let oracle = oracle_for(config.oracle)?;

    let jobs: Vec<_> = instance
        .scenarios
        .iter()
        .map(|scenario| (scenario, RunMode::Complete))
        .collect();
    let traces: Vec<CascadeTrace> = CascadeSimulator::new(oracle.as_ref(), &config)
        .run_all(&grid, &jobs)
        .context("simulating scenarios")?
        .into_iter()
        .map(|run| run.trace)
        .collect();

    let mut writer = TabWriter::new(&mut *out);
    writeln!(writer, "SCENARIO\tPROBABILITY\tDEPTH\tFAILED\tUNSERVED\tCOMPLETED")?;
    let mut expected_unserved = 0.0;
    for (scenario, trace) in instance.scenarios.iter().zip(&traces) {
        expected_unserved += scenario.probability * trace.unserved_demand;
        writeln!(
            writer,
            "{}\t{:.4}\t{}\t{}\t{:.4}\t{}",
            trace.scenario,
            scenario.probability,
            trace.depth(),
            trace.all_failed.len(),
            trace.unserved_demand,
            trace.completed
        )?;
    }
    writer.flush()?;
    drop(writer);
    writeln!(out, "expected unserved demand: {expected_unserved:.4}")?;

    if let Some(dir) = trace_dir {
        let written = pgro_io::write_traces(dir, &traces)?;
        info!(dir = %dir.display(), files = written.len(), "wrote cascade traces");
    }

    Ok(SimulateSummary {
        traces,
        expected_unserved,
    })
}
