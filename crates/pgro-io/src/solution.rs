//! `name,value` solution files keyed by registry variable names.

use anyhow::{bail, Context, Result};
use pgro_algo::{CandidateAssignment, VariableRegistry};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

/// Write one row per registry column, in column order.
pub fn write_solution<W: Write>(
    writer: W,
    registry: &VariableRegistry,
    values: &[f64],
) -> Result<()> {
    if values.len() != registry.len() {
        bail!(
            "solution has {} values, model has {} variables",
            values.len(),
            registry.len()
        );
    }
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["name", "value"])
        .context("writing CSV header")?;
    for ((_, info), value) in registry.iter().zip(values) {
        wtr.write_record([info.name.as_str(), &value.to_string()])
            .context("writing CSV record")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

pub fn write_solution_file(path: &Path, registry: &VariableRegistry, values: &[f64]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating solution file {}", path.display()))?;
    write_solution(std::io::BufWriter::new(file), registry, values)
        .with_context(|| format!("writing solution to {}", path.display()))
}

/// Read a candidate back; columns absent from the file are zero, unknown names are errors.
pub fn read_candidate(path: &Path, registry: &VariableRegistry) -> Result<CandidateAssignment> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening candidate file {}", path.display()))?;
    let mut pairs = Vec::new();
    for result in rdr.deserialize() {
        let row: NamedValue = result.context("parsing candidate record")?;
        pairs.push((row.name, row.value));
    }
    CandidateAssignment::from_named(registry, pairs)
        .with_context(|| format!("mapping {} onto the model", path.display()))
}
