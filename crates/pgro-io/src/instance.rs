//! Planning instance directories.
//!
//! An instance is four CSV files, each with one header row. Columns are read by
//! position, header names are ignored:
//!
//! | File | Columns |
//! |------|---------|
//! | `grid_nodes.csv` | id, demand, capacity, gen_upgrade_bound, fixed_cost, variable_cost |
//! | `grid_edges.csv` | node_i, node_j, capacity, susceptance, fixed_cost, variable_cost |
//! | `scenario_probabilities.csv` | scenario, probability |
//! | `scenario_failures.csv` | scenario, node_i, node_j |

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use pgro_core::{EdgeKey, EdgeRecord, NodeId, NodeRecord, PlanningInstance, Scenario, ScenarioId};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub const NODES_FILE: &str = "grid_nodes.csv";
pub const EDGES_FILE: &str = "grid_edges.csv";
pub const PROBABILITIES_FILE: &str = "scenario_probabilities.csv";
pub const FAILURES_FILE: &str = "scenario_failures.csv";

/// Load all four files of an instance directory. No validation beyond parsing.
pub fn load_instance(dir: &Path) -> Result<PlanningInstance> {
    if !dir.is_dir() {
        bail!("instance directory {} does not exist", dir.display());
    }
    let nodes = read_nodes(&dir.join(NODES_FILE))?;
    let edges = read_edges(&dir.join(EDGES_FILE))?;
    let scenarios = read_scenarios(&dir.join(PROBABILITIES_FILE), &dir.join(FAILURES_FILE))?;
    debug!(
        dir = %dir.display(),
        nodes = nodes.len(),
        edges = edges.len(),
        scenarios = scenarios.len(),
        "loaded planning instance"
    );
    Ok(PlanningInstance {
        nodes,
        edges,
        scenarios,
    })
}

pub fn read_nodes(path: &Path) -> Result<Vec<NodeRecord>> {
    read_rows(path, 6, |row| {
        Ok(NodeRecord {
            id: NodeId::new(row.index(0)?),
            demand: row.number(1)?,
            capacity: row.number(2)?,
            generation_upgrade_bound: row.number(3)?,
            fixed_cost: row.number(4)?,
            variable_cost: row.number(5)?,
        })
    })
}

pub fn read_edges(path: &Path) -> Result<Vec<EdgeRecord>> {
    read_rows(path, 6, |row| {
        Ok(EdgeRecord {
            key: EdgeKey::between(row.index(0)?, row.index(1)?),
            capacity: row.number(2)?,
            susceptance: row.number(3)?,
            fixed_cost: row.number(4)?,
            variable_cost: row.number(5)?,
        })
    })
}

/// Scenarios in the order of the probabilities file, failures attached from the second file.
pub fn read_scenarios(probabilities: &Path, failures: &Path) -> Result<Vec<Scenario>> {
    let mut scenarios = read_rows(probabilities, 2, |row| {
        Ok(Scenario::new(
            ScenarioId::new(row.index(0)?),
            row.number(1)?,
            Vec::new(),
        ))
    })?;
    let position: HashMap<ScenarioId, usize> = scenarios
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id, i))
        .collect();

    let rows = read_rows(failures, 3, |row| {
        let scenario = ScenarioId::new(row.index(0)?);
        let edge = EdgeKey::between(row.index(1)?, row.index(2)?);
        Ok((row.line, scenario, edge))
    })?;
    for (line, scenario, edge) in rows {
        let at = position.get(&scenario).ok_or_else(|| {
            anyhow!(
                "{}:{line}: scenario {scenario} has no probability",
                failures.display()
            )
        })?;
        scenarios[*at].initial_failures.push(edge);
    }
    Ok(scenarios)
}

/// One data row with its 1-based line number.
struct Row<'r> {
    record: &'r StringRecord,
    line: u64,
}

impl Row<'_> {
    fn raw(&self, column: usize) -> Result<&str> {
        self.record
            .get(column)
            .ok_or_else(|| anyhow!("line {}: missing column {}", self.line, column + 1))
    }

    fn number(&self, column: usize) -> Result<f64> {
        let raw = self.raw(column)?;
        raw.parse()
            .with_context(|| format!("line {}: column {} is not a number: '{raw}'", self.line, column + 1))
    }

    fn index(&self, column: usize) -> Result<usize> {
        let raw = self.raw(column)?;
        raw.parse().with_context(|| {
            format!(
                "line {}: column {} is not a non-negative integer id: '{raw}'",
                self.line,
                column + 1
            )
        })
    }
}

fn read_rows<T>(
    path: &Path,
    min_columns: usize,
    mut parse: impl FnMut(&Row<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading {}", path.display()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.len() < min_columns {
            bail!(
                "{}:{line}: expected {min_columns} columns, found {}",
                path.display(),
                record.len()
            );
        }
        let row = Row {
            record: &record,
            line,
        };
        out.push(parse(&row).with_context(|| format!("parsing {}", path.display()))?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn columns_are_read_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.csv");
        fs::write(&path, "whatever,d,c,ub,H,h\n1, 15, 0, 2, 3, 4\n\n2,0,10,0,0,0\n").unwrap();
        let nodes = read_nodes(&path).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, NodeId::new(1));
        assert_eq!(nodes[0].demand, 15.0);
        assert_eq!(nodes[0].generation_upgrade_bound, 2.0);
        assert_eq!(nodes[0].variable_cost, 4.0);
        assert_eq!(nodes[1].capacity, 10.0);
    }

    #[test]
    fn bad_number_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        fs::write(&path, "i,j,c,x,H,h\n1,2,10,1,0,0\n2,3,ten,1,0,0\n").unwrap();
        let err = format!("{:#}", read_edges(&path).unwrap_err());
        assert!(err.contains("line 3"), "{err}");
        assert!(err.contains("'ten'"), "{err}");
    }

    #[test]
    fn short_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        fs::write(&path, "i,j,c,x,H,h\n1,2,10\n").unwrap();
        assert!(read_edges(&path).is_err());
    }

    #[test]
    fn failures_need_a_probability_row() {
        let dir = tempfile::tempdir().unwrap();
        let pr = dir.path().join("pr.csv");
        let fail = dir.path().join("fail.csv");
        fs::write(&pr, "s,p\n1,1.0\n").unwrap();
        fs::write(&fail, "s,i,j\n1,3,2\n2,1,2\n").unwrap();
        let err = format!("{:#}", read_scenarios(&pr, &fail).unwrap_err());
        assert!(err.contains("scenario 2"), "{err}");

        fs::write(&fail, "s,i,j\n1,3,2\n1,1,2\n").unwrap();
        let scenarios = read_scenarios(&pr, &fail).unwrap();
        assert_eq!(
            scenarios[0].initial_failures,
            vec![EdgeKey::between(2, 3), EdgeKey::between(1, 2)]
        );
    }
}
