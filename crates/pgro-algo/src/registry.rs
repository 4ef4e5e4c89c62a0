//! Typed addressing of the planning model's decision variables.
//!
//! The external MIP lays its columns out in a fixed order. [`VariableRegistry`] reproduces
//! that order once per instance and maps every structured [`VarKey`] to a stable
//! [`VarHandle`] (the column position), so candidate values coming back from the solver can
//! be read by meaning instead of by position:
//!
//! ```text
//! for node:      for scenario: g, w (demand > 0 only), theta
//!                c (generation upgrade), Z (generation backup)
//! for edge:      for scenario: f, F
//!                c (line upgrade), X (line establishment, candidate lines only)
//! ```

use pgro_core::{EdgeKey, NodeId, PgroError, PgroResult, PlanningInstance, ScenarioId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bound on phase-angle columns.
const ANGLE_BOUND: f64 = 10_000.0;

/// Position of a variable in the model's column space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarHandle(usize);

impl VarHandle {
    #[inline]
    pub fn new(index: usize) -> Self {
        VarHandle(index)
    }
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VarKey {
    Generation { node: NodeId, scenario: ScenarioId },
    Unsupplied { node: NodeId, scenario: ScenarioId },
    Angle { node: NodeId, scenario: ScenarioId },
    GenerationUpgrade { node: NodeId },
    GenerationBackup { node: NodeId },
    Flow { edge: EdgeKey, scenario: ScenarioId },
    Failure { edge: EdgeKey, scenario: ScenarioId },
    LineUpgrade { edge: EdgeKey },
    LineEstablish { edge: EdgeKey },
}

impl VarKey {
    /// Scenario-independent decisions that shape the implied grid.
    pub fn is_investment(&self) -> bool {
        matches!(
            self,
            VarKey::GenerationUpgrade { .. }
                | VarKey::GenerationBackup { .. }
                | VarKey::LineUpgrade { .. }
                | VarKey::LineEstablish { .. }
        )
    }

    pub fn name(&self) -> String {
        fn edge_str(edge: &EdgeKey) -> String {
            format!("{}_{}", edge.low(), edge.high())
        }
        match self {
            VarKey::Generation { node, scenario } => format!("g_{node}s{scenario}"),
            VarKey::Unsupplied { node, scenario } => format!("w_{node}s{scenario}"),
            VarKey::Angle { node, scenario } => format!("theta_{node}s{scenario}"),
            VarKey::GenerationUpgrade { node } => format!("c_{node}"),
            VarKey::GenerationBackup { node } => format!("Z_{node}"),
            VarKey::Flow { edge, scenario } => format!("f_{}s{scenario}", edge_str(edge)),
            VarKey::Failure { edge, scenario } => format!("F_{}s{scenario}", edge_str(edge)),
            VarKey::LineUpgrade { edge } => format!("c_{}", edge_str(edge)),
            VarKey::LineEstablish { edge } => format!("X_{}", edge_str(edge)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarDomain {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarInfo {
    pub key: VarKey,
    pub domain: VarDomain,
    pub lower: f64,
    pub upper: f64,
    pub name: String,
}

impl VarInfo {
    fn new(key: VarKey, domain: VarDomain, lower: f64, upper: f64) -> Self {
        Self {
            name: key.name(),
            key,
            domain,
            lower,
            upper,
        }
    }

    fn binary(key: VarKey) -> Self {
        Self::new(key, VarDomain::Binary, 0.0, 1.0)
    }

    fn continuous(key: VarKey, lower: f64, upper: f64) -> Self {
        Self::new(key, VarDomain::Continuous, lower, upper)
    }
}

/// Immutable key → handle table, built once per instance.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    entries: Vec<VarInfo>,
    lookup: HashMap<VarKey, VarHandle>,
    by_name: HashMap<String, VarHandle>,
}

impl VariableRegistry {
    pub fn for_instance(instance: &PlanningInstance) -> PgroResult<Self> {
        let mut registry = Self::default();
        let total_demand: f64 = instance.nodes.iter().map(|n| n.demand).sum();

        for node in &instance.nodes {
            for scenario in &instance.scenarios {
                let (node_id, scenario_id) = (node.id, scenario.id);
                registry.push(VarInfo::continuous(
                    VarKey::Generation {
                        node: node_id,
                        scenario: scenario_id,
                    },
                    0.0,
                    node.capacity + node.generation_upgrade_bound,
                ))?;
                if node.demand > 0.0 {
                    registry.push(VarInfo::continuous(
                        VarKey::Unsupplied {
                            node: node_id,
                            scenario: scenario_id,
                        },
                        0.0,
                        node.demand,
                    ))?;
                }
                registry.push(VarInfo::continuous(
                    VarKey::Angle {
                        node: node_id,
                        scenario: scenario_id,
                    },
                    -ANGLE_BOUND,
                    ANGLE_BOUND,
                ))?;
            }
            registry.push(VarInfo::continuous(
                VarKey::GenerationUpgrade { node: node.id },
                0.0,
                node.generation_upgrade_bound,
            ))?;
            registry.push(VarInfo::binary(VarKey::GenerationBackup { node: node.id }))?;
        }

        for edge in &instance.edges {
            for scenario in &instance.scenarios {
                registry.push(VarInfo::continuous(
                    VarKey::Flow {
                        edge: edge.key,
                        scenario: scenario.id,
                    },
                    -total_demand,
                    total_demand,
                ))?;
                registry.push(VarInfo::binary(VarKey::Failure {
                    edge: edge.key,
                    scenario: scenario.id,
                }))?;
            }
            registry.push(VarInfo::binary(VarKey::LineUpgrade { edge: edge.key }))?;
            if edge.is_candidate() {
                registry.push(VarInfo::binary(VarKey::LineEstablish { edge: edge.key }))?;
            }
        }

        Ok(registry)
    }

    fn push(&mut self, info: VarInfo) -> PgroResult<()> {
        let handle = VarHandle(self.entries.len());
        if self.lookup.insert(info.key, handle).is_some() {
            return Err(PgroError::Validation(format!(
                "duplicate model variable {}",
                info.name
            )));
        }
        self.by_name.insert(info.name.clone(), handle);
        self.entries.push(info);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handle(&self, key: &VarKey) -> Option<VarHandle> {
        self.lookup.get(key).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<VarHandle> {
        self.by_name.get(name).copied()
    }

    pub fn info(&self, handle: VarHandle) -> &VarInfo {
        &self.entries[handle.0]
    }

    pub fn name(&self, handle: VarHandle) -> &str {
        &self.entries[handle.0].name
    }

    pub fn failure(&self, edge: EdgeKey, scenario: ScenarioId) -> Option<VarHandle> {
        self.handle(&VarKey::Failure { edge, scenario })
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarHandle, &VarInfo)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, info)| (VarHandle(i), info))
    }

    /// Investment columns in column order.
    pub fn investment_handles(&self) -> Vec<VarHandle> {
        self.iter()
            .filter(|(_, info)| info.key.is_investment())
            .map(|(h, _)| h)
            .collect()
    }

    pub fn failure_handles(&self) -> Vec<VarHandle> {
        self.iter()
            .filter(|(_, info)| matches!(info.key, VarKey::Failure { .. }))
            .map(|(h, _)| h)
            .collect()
    }
}
