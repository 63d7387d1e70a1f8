use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codestream::InClassId;

use super::CacheLedger;

/// Cache state of one precinct data-bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub bytes: u64,
    pub layers: u16,
}

/// New cache state of one precinct after a response was transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    pub id: InClassId,

    /// Data-bin offset the client now holds
    pub bytes_delivered: u64,

    /// Layers the client now holds completely
    pub layers_delivered: u16,
}

/// In-memory cache ledger for one client session.
///
/// Entries only ever grow: applying an update that reports less than what
/// is recorded leaves the entry unchanged.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: HashMap<InClassId, LedgerEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// What the client holds of a precinct. Unknown precincts are empty.
    pub fn entry(&self, id: InClassId) -> LedgerEntry {
        self.entries.get(&id).copied().unwrap_or_default()
    }

    /// Raise a precinct's entry to at least `bytes` and `layers`.
    pub fn record(&mut self, id: InClassId, bytes: u64, layers: u16) {
        let entry = self.entries.entry(id).or_default();
        entry.bytes = entry.bytes.max(bytes);
        entry.layers = entry.layers.max(layers);
    }

    /// Record the updates produced by a schedule.
    pub fn apply(&mut self, updates: &[LedgerUpdate]) {
        for update in updates {
            self.record(update.id, update.bytes_delivered, update.layers_delivered);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total data-bin bytes recorded over all precincts.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.bytes).sum()
    }
}

impl CacheLedger for MemoryLedger {
    fn bytes_delivered(&self, id: InClassId) -> u64 {
        self.entry(id).bytes
    }

    fn layers_delivered(&self, id: InClassId) -> u16 {
        self.entry(id).layers
    }
}
