//! Three-way reconciliation of a source list against a target list.

use crmsync_types::{CanonicalRecord, RecordDiff, RecordKey, ID_FIELD};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// The insert, update, and delete sets for one run.
///
/// The three lists never share an id. Each list keeps the iteration order
/// of the side it was drawn from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationResult {
    pub inserts: Vec<CanonicalRecord>,
    pub updates: Vec<RecordDiff>,
    pub deletes: Vec<CanonicalRecord>,
}

impl ReconciliationResult {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn total(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

/// Matches records by id and sorts them into inserts, updates, and deletes.
///
/// Targets are indexed by [`RecordKey`], so matching is linear. When an id
/// occurs more than once on one side, the first occurrence is used and the
/// rest are ignored.
pub fn reconcile(source: &[CanonicalRecord], target: &[CanonicalRecord]) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();

    let mut target_index: HashMap<RecordKey, &CanonicalRecord> = HashMap::with_capacity(target.len());
    for record in target {
        let Some(key) = record.key() else {
            warn!("Ignoring target record without an id");
            continue;
        };
        if target_index.contains_key(&key) {
            warn!("Ignoring duplicate target record {}", key);
            continue;
        }
        target_index.insert(key, record);
    }

    let mut source_keys: HashSet<RecordKey> = HashSet::with_capacity(source.len());
    for record in source {
        let Some(key) = record.key() else {
            warn!("Ignoring source record without an id");
            continue;
        };
        if !source_keys.insert(key.clone()) {
            warn!("Ignoring duplicate source record {}", key);
            continue;
        }
        match target_index.get(&key) {
            None => result.inserts.push(record.clone()),
            Some(existing) => {
                if let Some(diff) = diff_records(record, existing) {
                    result.updates.push(diff);
                }
            }
        }
    }

    let mut deleted: HashSet<RecordKey> = HashSet::new();
    for record in target {
        let Some(key) = record.key() else { continue };
        if !source_keys.contains(&key) && deleted.insert(key) {
            result.deletes.push(record.clone());
        }
    }

    result
}

/// Fields of `source` whose value differs loosely from `target`, plus `id`.
///
/// Returns `None` when nothing changed. Only fields present in `source` are
/// compared; a field missing from `target` counts as `Null`.
pub fn diff_records(source: &CanonicalRecord, target: &CanonicalRecord) -> Option<RecordDiff> {
    let mut partial = CanonicalRecord::new();
    for (field, value) in source.fields() {
        if field == ID_FIELD {
            continue;
        }
        if !value.loosely_eq(target.value(field)) {
            partial.insert(field, value.clone());
        }
    }

    if partial.is_empty() {
        return None;
    }
    partial.insert(ID_FIELD, source.value(ID_FIELD).clone());
    RecordDiff::new(partial).ok()
}
