use anyhow::Result;
use pgro_core::{Diagnostics, GridState};
use std::io::Write;
use std::path::Path;

/// Instance checks plus a look at the base grid's connectivity.
pub fn handle(instance_dir: &Path, out: &mut impl Write) -> Result<Diagnostics> {
    let instance = pgro_io::load_instance(instance_dir)?;
    let mut diagnostics = Diagnostics::new();
    instance.validate_into(&mut diagnostics);

    if !diagnostics.has_errors() {
        let mut topology = Diagnostics::new();
        match instance.base_grid() {
            Ok(grid) => {
                let islands = GridState::new(&grid).components().len();
                if islands > 1 {
                    topology.add_warning(
                        "topology",
                        &format!("base grid splits into {islands} islands"),
                    );
                }
                if grid.total_generation_capacity() < grid.total_original_demand() {
                    topology.add_warning(
                        "capacity",
                        "total generation capacity is below total demand",
                    );
                }
            }
            Err(err) => topology.add_error("topology", &err.to_string()),
        }
        diagnostics.merge(topology);
    }

    for issue in &diagnostics.issues {
        writeln!(out, "{issue}")?;
    }
    writeln!(out, "{}: {}", instance_dir.display(), diagnostics.summary())?;
    Ok(diagnostics)
}
