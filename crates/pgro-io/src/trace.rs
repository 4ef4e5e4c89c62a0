//! Cascade trace export.
//!
//! One CSV per scenario with columns `type,par1,par2,par3,value`:
//!
//! - `f,i,j,k,flow`: flow on edge (i, j) at solve k (requires `record_flows`)
//! - `O,i,j,k,1`: edge (i, j) failed at cascade step k (step 0 is the initial failure set)

use anyhow::{Context, Result};
use pgro_algo::CascadeTrace;
use pgro_core::EdgeKey;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceRowKind {
    #[serde(rename = "f")]
    Flow,
    #[serde(rename = "O")]
    Overload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    #[serde(rename = "type")]
    pub kind: TraceRowKind,
    pub par1: usize,
    pub par2: usize,
    pub par3: usize,
    pub value: f64,
}

impl TraceRow {
    fn new(kind: TraceRowKind, edge: EdgeKey, step: usize, value: f64) -> Self {
        Self {
            kind,
            par1: edge.low().value(),
            par2: edge.high().value(),
            par3: step,
            value,
        }
    }

    pub fn edge(&self) -> EdgeKey {
        EdgeKey::between(self.par1, self.par2)
    }
}

/// Flow rows first, then failure rows, each ordered by step.
pub fn trace_rows(trace: &CascadeTrace) -> Vec<TraceRow> {
    let flows = trace.flows.iter().enumerate().flat_map(|(step, flows)| {
        flows
            .iter()
            .map(move |(edge, flow)| TraceRow::new(TraceRowKind::Flow, *edge, step, *flow))
    });
    let failures = trace.steps.iter().enumerate().flat_map(|(step, edges)| {
        edges
            .iter()
            .map(move |edge| TraceRow::new(TraceRowKind::Overload, *edge, step, 1.0))
    });
    flows.chain(failures).collect()
}

pub fn write_trace<W: Write>(writer: W, trace: &CascadeTrace) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in trace_rows(trace) {
        wtr.serialize(&row).context("writing trace row")?;
    }
    // header only, for a trace without rows
    if trace.steps.iter().all(Vec::is_empty) && trace.flows.is_empty() {
        wtr.write_record(["type", "par1", "par2", "par3", "value"])
            .context("writing trace header")?;
    }
    wtr.flush().context("flushing trace writer")?;
    Ok(())
}

pub fn write_trace_file(path: &Path, trace: &CascadeTrace) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating trace file {}", path.display()))?;
    write_trace(std::io::BufWriter::new(file), trace)
        .with_context(|| format!("writing trace to {}", path.display()))
}

/// Write `cascade_s{scenario}.csv` for every trace into `dir`.
pub fn write_traces(dir: &Path, traces: &[CascadeTrace]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating trace directory {}", dir.display()))?;
    let mut written = Vec::with_capacity(traces.len());
    for trace in traces {
        let path = dir.join(format!("cascade_s{}.csv", trace.scenario));
        write_trace_file(&path, trace)?;
        debug!(path = %path.display(), depth = trace.depth(), "wrote cascade trace");
        written.push(path);
    }
    Ok(written)
}

pub fn read_trace_rows(path: &Path) -> Result<Vec<TraceRow>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening trace file {}", path.display()))?;
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: TraceRow = result.context("parsing trace row")?;
        rows.push(row);
    }
    Ok(rows)
}
