use std::collections::BTreeMap;

use pgben_core::{default_catalog, ReasonEntry, ReasonOperation};

/// Immutable reason catalog keyed by operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonCatalog {
    by_operation: BTreeMap<ReasonOperation, Vec<ReasonEntry>>,
}

impl ReasonCatalog {
    pub fn new(entries: Vec<ReasonEntry>) -> Self {
        let mut by_operation: BTreeMap<ReasonOperation, Vec<ReasonEntry>> = BTreeMap::new();
        for entry in entries {
            by_operation.entry(entry.operation).or_default().push(entry);
        }
        Self { by_operation }
    }

    pub fn builtin() -> Self {
        Self::new(default_catalog())
    }

    /// Active entries for `operation`, in catalog order.
    pub fn active_for(&self, operation: ReasonOperation) -> Vec<ReasonEntry> {
        self.by_operation
            .get(&operation)
            .map(|entries| entries.iter().filter(|e| e.active).cloned().collect())
            .unwrap_or_default()
    }

    /// Every entry, active or not, grouped by operation.
    pub fn entries(&self) -> impl Iterator<Item = &ReasonEntry> {
        self.by_operation.values().flatten()
    }
}

impl Default for ReasonCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
