//! Simulator and cut-generation settings.
//!
//! Every knob the simulator, the cut generator and the planner read lives in
//! [`SimulatorConfig`]. The struct is passed explicitly to constructors; there is no
//! process-wide state. Partial TOML files are accepted and missing values take defaults:
//!
//! ```
//! use pgro_algo::config::{OracleKind, SimulatorConfig};
//!
//! let config = SimulatorConfig::from_toml_str(r#"
//!     oracle = "direct"
//!     max_cuts_per_scenario = 4
//!
//!     [investment]
//!     line_upgrade_capacity = 2.5
//! "#).unwrap();
//!
//! assert_eq!(config.oracle, OracleKind::Direct);
//! assert_eq!(config.max_cuts_per_scenario, Some(4));
//! assert_eq!(config.investment.line_establish_capacity, 5.0);
//! ```

use pgro_core::{PgroError, PgroResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which DC-flow oracle answers flow queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// Feasibility LP through good_lp (Clarabel backend)
    #[default]
    Lp,
    /// Dense LU solve of the reduced Laplacian per component
    Direct,
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleKind::Lp => write!(f, "lp"),
            OracleKind::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for OracleKind {
    type Err = PgroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lp" => Ok(OracleKind::Lp),
            "direct" => Ok(OracleKind::Direct),
            other => Err(PgroError::Config(format!("unknown oracle '{other}'"))),
        }
    }
}

/// Capacity effect of investment decisions on the implied grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentConfig {
    /// Capacity added to a line by an upgrade decision of value 1
    pub line_upgrade_capacity: f64,
    /// Capacity of a newly established candidate line
    pub line_establish_capacity: f64,
}

impl Default for InvestmentConfig {
    fn default() -> Self {
        Self {
            line_upgrade_capacity: 5.0,
            line_establish_capacity: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Values within this distance of 0 or 1 count as integral.
    pub integrality_tolerance: f64,
    /// Slack subtracted from every cut right-hand side.
    pub cut_epsilon: f64,
    /// Cap on cuts emitted per scenario per callback round (`None` = unlimited).
    pub max_cuts_per_scenario: Option<usize>,
    /// Safety bound on cascade iterations.
    pub max_cascade_depth: usize,
    /// Probability that a callback round runs the cascade in bounded mode.
    pub partial_run_fraction: f64,
    /// Seed for the bounded-mode draw.
    pub seed: u64,
    /// Evaluate scenarios on the rayon pool (requires the `parallel` feature).
    pub parallel_scenarios: bool,
    pub oracle: OracleKind,
    /// Keep per-iteration flows in cascade traces.
    pub record_flows: bool,
    /// Emit a debug event for every cascade iteration.
    pub trace_cascade_steps: bool,
    /// Directory receiving JSON snapshots of grids the oracle rejected.
    pub dump_dir: Option<PathBuf>,
    pub investment: InvestmentConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            integrality_tolerance: 1e-3,
            cut_epsilon: 1e-3,
            max_cuts_per_scenario: None,
            max_cascade_depth: 100,
            partial_run_fraction: 0.0,
            seed: 0,
            parallel_scenarios: false,
            oracle: OracleKind::Lp,
            record_flows: false,
            trace_cascade_steps: false,
            dump_dir: None,
            investment: InvestmentConfig::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn from_toml_str(contents: &str) -> PgroResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| PgroError::Config(format!("invalid simulator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> PgroResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> PgroResult<String> {
        toml::to_string_pretty(self).map_err(|e| PgroError::Config(e.to_string()))
    }

    pub fn validate(&self) -> PgroResult<()> {
        if !(0.0..0.5).contains(&self.integrality_tolerance) {
            return Err(PgroError::Config(format!(
                "integrality_tolerance must lie in [0, 0.5), got {}",
                self.integrality_tolerance
            )));
        }
        if !(self.cut_epsilon > 0.0 && self.cut_epsilon < 1.0) {
            return Err(PgroError::Config(format!(
                "cut_epsilon must lie in (0, 1), got {}",
                self.cut_epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.partial_run_fraction) {
            return Err(PgroError::Config(format!(
                "partial_run_fraction must lie in [0, 1], got {}",
                self.partial_run_fraction
            )));
        }
        if self.max_cascade_depth == 0 {
            return Err(PgroError::Config("max_cascade_depth must be positive".into()));
        }
        if self.investment.line_upgrade_capacity < 0.0
            || self.investment.line_establish_capacity < 0.0
        {
            return Err(PgroError::Config(
                "investment capacities must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// `value` counts as 0.
    #[inline]
    pub fn is_zero(&self, value: f64) -> bool {
        value <= self.integrality_tolerance
    }

    /// `value` counts as 1.
    #[inline]
    pub fn is_one(&self, value: f64) -> bool {
        value >= 1.0 - self.integrality_tolerance
    }

    /// Whether scenario evaluation actually runs in parallel in this build.
    pub fn runs_parallel(&self) -> bool {
        cfg!(feature = "parallel") && self.parallel_scenarios
    }
}
