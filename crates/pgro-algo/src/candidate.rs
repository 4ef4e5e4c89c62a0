//! Candidate assignments handed over by the solver at integer-feasible nodes.

use crate::registry::{VarHandle, VarKey, VariableRegistry};
use pgro_core::{EdgeKey, PgroError, PgroResult, ScenarioId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One value per registry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAssignment {
    values: Vec<f64>,
}

impl CandidateAssignment {
    /// Wrap solver values, checking they cover the registry exactly.
    pub fn new(registry: &VariableRegistry, values: Vec<f64>) -> PgroResult<Self> {
        if values.len() != registry.len() {
            return Err(PgroError::Validation(format!(
                "candidate has {} values, model has {} variables",
                values.len(),
                registry.len()
            )));
        }
        Ok(Self { values })
    }

    pub fn zeros(registry: &VariableRegistry) -> Self {
        Self {
            values: vec![0.0; registry.len()],
        }
    }

    /// Build from `(name, value)` pairs; columns not mentioned stay at zero.
    pub fn from_named<I, S>(registry: &VariableRegistry, pairs: I) -> PgroResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut candidate = Self::zeros(registry);
        for (name, value) in pairs {
            let name = name.as_ref();
            let handle = registry
                .by_name(name)
                .ok_or_else(|| PgroError::Validation(format!("unknown variable '{name}'")))?;
            candidate.values[handle.index()] = value;
        }
        Ok(candidate)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, handle: VarHandle) -> f64 {
        self.values[handle.index()]
    }

    pub fn set(&mut self, handle: VarHandle, value: f64) {
        self.values[handle.index()] = value;
    }

    /// Value of `key`, if the registry has such a column.
    pub fn get(&self, registry: &VariableRegistry, key: &VarKey) -> Option<f64> {
        registry.handle(key).map(|h| self.value(h))
    }

    /// Set `key` by meaning. Returns false when the registry has no such column.
    pub fn assign(&mut self, registry: &VariableRegistry, key: &VarKey, value: f64) -> bool {
        match registry.handle(key) {
            Some(h) => {
                self.set(h, value);
                true
            }
            None => false,
        }
    }

    /// Edges whose failure indicator in `scenario` is at least `threshold`.
    pub fn asserted_failures(
        &self,
        registry: &VariableRegistry,
        scenario: ScenarioId,
        threshold: f64,
    ) -> BTreeSet<EdgeKey> {
        registry
            .iter()
            .filter_map(|(h, info)| match info.key {
                VarKey::Failure { edge, scenario: s } if s == scenario => {
                    (self.value(h) >= threshold).then_some(edge)
                }
                _ => None,
            })
            .collect()
    }
}
