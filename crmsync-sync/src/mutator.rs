//! Row-by-row application of a reconciliation result.
//!
//! Each row is its own statement. A row that fails (zero affected rows or
//! a statement error) is logged and recorded in the [`BatchOutcome`]; the
//! batch keeps going. Losing the store connection aborts the batch.

use crate::error::{SyncError, SyncResult};
use crate::schema::{Column, EntitySchema};
use crmsync_store::StoreSession;
use crmsync_types::{CanonicalRecord, EntityKind, RecordDiff, ScalarValue, ID_FIELD};
use std::fmt;
use tracing::{debug, error, warn};

/// Which batch a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    SoftDelete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::SoftDelete => "soft delete",
        })
    }
}

/// One row that could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub kind: MutationKind,
    pub id: ScalarValue,
    pub reason: String,
}

/// Tally of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub applied: usize,
    pub failures: Vec<RowFailure>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Largest delete set a single run may apply.
pub const MAX_DELETES: usize = 100;

/// Aborts when `deletes` exceeds [`MAX_DELETES`].
///
/// Must be checked before any mutation of the run is applied.
pub fn check_guardrail(entity: EntityKind, deletes: usize) -> SyncResult<()> {
    let limit = MAX_DELETES;
    if deletes > limit {
        error!(
            "Refusing to soft-delete {} {} (limit {}); likely an upstream anomaly",
            deletes, entity, limit
        );
        return Err(SyncError::GuardrailExceeded {
            entity,
            deletes,
            limit,
        });
    }
    Ok(())
}

/// Applies inserts, updates, and soft deletes for one entity table.
pub struct BatchMutator<'a, S: StoreSession + ?Sized> {
    session: &'a S,
    schema: &'static EntitySchema,
}

impl<'a, S: StoreSession + ?Sized> BatchMutator<'a, S> {
    pub fn new(session: &'a S, schema: &'static EntitySchema) -> Self {
        Self { session, schema }
    }

    /// Inserts full records. A soft-deleted row with the same id is revived;
    /// a live row with the same id is left alone and reported as a failure.
    pub fn apply_inserts(&self, records: &[CanonicalRecord]) -> SyncResult<BatchOutcome> {
        let plans = records
            .iter()
            .map(|record| self.resolve_record(record))
            .collect::<SyncResult<Vec<_>>>()?;

        let mut outcome = BatchOutcome::default();
        for (record, columns) in records.iter().zip(plans) {
            let sql = self.insert_sql(&columns);
            let params: Vec<ScalarValue> = columns
                .iter()
                .map(|c| c.bind(record.value(c.name)))
                .collect();
            self.apply_row(MutationKind::Insert, record.value(ID_FIELD), &sql, &params, &mut outcome)?;
        }
        debug!("Inserted {}/{} {}", outcome.applied, outcome.attempted, self.schema.kind);
        Ok(outcome)
    }

    /// Updates the changed fields of each diff, keyed by id.
    pub fn apply_updates(&self, diffs: &[RecordDiff]) -> SyncResult<BatchOutcome> {
        let plans = diffs
            .iter()
            .map(|diff| self.schema.resolve(diff.changes().map(|(name, _)| name)))
            .collect::<SyncResult<Vec<_>>>()?;

        let mut outcome = BatchOutcome::default();
        for (diff, columns) in diffs.iter().zip(plans) {
            if columns.is_empty() {
                continue;
            }
            let assignments: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{} = ?{}", c.name, i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?{}",
                self.schema.table,
                assignments.join(", "),
                columns.len() + 1
            );

            let record = diff.as_record();
            let mut params: Vec<ScalarValue> = columns
                .iter()
                .map(|c| c.bind(record.value(c.name)))
                .collect();
            params.push(self.bind_id(diff.id()));

            self.apply_row(MutationKind::Update, diff.id(), &sql, &params, &mut outcome)?;
        }
        debug!("Updated {}/{} {}", outcome.applied, outcome.attempted, self.schema.kind);
        Ok(outcome)
    }

    /// Marks rows deleted (and deleted upstream) without removing them.
    pub fn apply_soft_deletes(&self, records: &[CanonicalRecord]) -> SyncResult<BatchOutcome> {
        let sql = format!(
            "UPDATE {} SET deleted = 1, source_deleted = 1 WHERE id = ?1",
            self.schema.table
        );

        let mut outcome = BatchOutcome::default();
        for record in records {
            let id = record.value(ID_FIELD);
            let params = [self.bind_id(id)];
            self.apply_row(MutationKind::SoftDelete, id, &sql, &params, &mut outcome)?;
        }
        debug!("Soft-deleted {}/{} {}", outcome.applied, outcome.attempted, self.schema.kind);
        Ok(outcome)
    }

    fn resolve_record(&self, record: &CanonicalRecord) -> SyncResult<Vec<&'static Column>> {
        self.schema.resolve(record.field_names())?;
        Ok(self
            .schema
            .columns
            .iter()
            .filter(|c| record.contains(c.name))
            .collect())
    }

    fn insert_sql(&self, columns: &[&Column]) -> String {
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let mut assignments: Vec<String> = columns
            .iter()
            .filter(|c| c.name != ID_FIELD)
            .map(|c| format!("{0} = excluded.{0}", c.name))
            .collect();
        assignments.push("deleted = 0".to_string());
        assignments.push("source_deleted = 0".to_string());

        format!(
            "INSERT INTO {table} ({names}) VALUES ({placeholders}) \
             ON CONFLICT(id) DO UPDATE SET {assignments} WHERE {table}.deleted = 1",
            table = self.schema.table,
            names = names.join(", "),
            placeholders = placeholders.join(", "),
            assignments = assignments.join(", "),
        )
    }

    fn bind_id(&self, id: &ScalarValue) -> ScalarValue {
        match self.schema.column(ID_FIELD) {
            Some(column) => column.bind(id),
            None => id.clone(),
        }
    }

    fn apply_row(
        &self,
        kind: MutationKind,
        id: &ScalarValue,
        sql: &str,
        params: &[ScalarValue],
        outcome: &mut BatchOutcome,
    ) -> SyncResult<()> {
        outcome.attempted += 1;
        match self.session.execute(sql, params) {
            Ok(0) => {
                warn!("{} of {} {} affected no rows", kind, self.schema.kind, id);
                outcome.failures.push(RowFailure {
                    kind,
                    id: id.clone(),
                    reason: "no rows affected".to_string(),
                });
            }
            Ok(_) => outcome.applied += 1,
            Err(e) if e.is_connection_loss() => {
                error!("Store connection lost during {} of {} {}: {}", kind, self.schema.kind, id, e);
                return Err(SyncError::StoreConnection(e));
            }
            Err(e) => {
                error!("{} of {} {} failed: {}", kind, self.schema.kind, id, e);
                outcome.failures.push(RowFailure {
                    kind,
                    id: id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}
