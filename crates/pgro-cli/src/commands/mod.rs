pub mod check;
pub mod simulate;
pub mod validate;

use anyhow::{Context, Result};
use pgro_algo::SimulatorConfig;
use pgro_core::PlanningInstance;
use std::path::Path;
use tracing::{info, warn};

/// Defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<SimulatorConfig> {
    match path {
        Some(path) => {
            let config = SimulatorConfig::from_path(path)
                .with_context(|| format!("loading simulator config {}", path.display()))?;
            info!(path = %path.display(), oracle = %config.oracle, "loaded simulator config");
            Ok(config)
        }
        None => Ok(SimulatorConfig::default()),
    }
}

/// Load an instance directory and refuse it on validation errors.
pub fn load_valid_instance(dir: &Path) -> Result<PlanningInstance> {
    let instance = pgro_io::load_instance(dir)?;
    let diagnostics = instance
        .validate()
        .with_context(|| format!("validating instance {}", dir.display()))?;
    for issue in &diagnostics.issues {
        warn!("{issue}");
    }
    Ok(instance)
}
