//! Projection of raw remote and local rows into canonical records.
//!
//! Everything here is pure: no I/O, no clock, no shared state. The same
//! input and offset always produce the same output.

use crate::schema::{ColumnType, EntitySchema};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use crmsync_types::{CanonicalRecord, ScalarValue, ID_FIELD};
use serde_json::Value;
use tracing::{debug, warn};

/// Canonical timestamp layout, matching what the store holds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Maps raw records onto an entity schema.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    offset: FixedOffset,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::utc()
    }
}

impl Normalizer {
    /// Zoned timestamps are converted to `offset` before the zone is dropped.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Projects raw remote records through the schema's field mapping and
    /// canonicalizes timestamps. Records without an id are dropped.
    pub fn normalize_source(&self, raw: &[Value], schema: &EntitySchema) -> Vec<CanonicalRecord> {
        let mut records = Vec::with_capacity(raw.len());
        let mut dropped = 0usize;

        for item in raw {
            let Some(object) = item.as_object() else {
                warn!("Skipping non-object {} record", schema.kind);
                dropped += 1;
                continue;
            };

            let mut record = CanonicalRecord::new();
            for column in schema.columns {
                let value = project(object.get(column.remote_key));
                let value = if column.ty == ColumnType::Timestamp {
                    self.canonicalize_timestamp(&value)
                } else {
                    value
                };
                record.insert(column.name, value);
            }
            trim_id(&mut record);

            if record.id().is_none() {
                dropped += 1;
                continue;
            }
            records.push(record);
        }

        if dropped > 0 {
            warn!("Dropped {} {} source records without an id", dropped, schema.kind);
        }
        debug!("Normalized {} {} source records", records.len(), schema.kind);
        records
    }

    /// Canonicalizes timestamps of rows read back from the store.
    pub fn normalize_target(
        &self,
        rows: Vec<CanonicalRecord>,
        schema: &EntitySchema,
    ) -> Vec<CanonicalRecord> {
        rows.into_iter()
            .map(|mut row| {
                for column in schema.timestamp_columns() {
                    if let Some(value) = row.get_mut(column.name) {
                        *value = self.canonicalize_timestamp(value);
                    }
                }
                row
            })
            .collect()
    }

    /// Renders a timestamp value as `YYYY-MM-DD HH:MM:SS`.
    ///
    /// `Null` and blank text become `Null`. Text that matches no known
    /// layout is kept verbatim. Non-text values pass through unchanged.
    pub fn canonicalize_timestamp(&self, value: &ScalarValue) -> ScalarValue {
        let ScalarValue::Text(raw) = value else {
            return value.clone();
        };
        let text = raw.trim();
        if text.is_empty() {
            return ScalarValue::Null;
        }
        match self.parse_timestamp(text) {
            Some(ts) => ScalarValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
            None => {
                warn!("Keeping unparseable timestamp '{}' as-is", text);
                value.clone()
            }
        }
    }

    fn parse_timestamp(&self, text: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&self.offset).naive_local());
        }
        for format in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(text, format) {
                return Some(dt.with_timezone(&self.offset).naive_local());
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Some(dt);
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

/// Flattens one remote field value to a scalar.
///
/// Objects collapse to their `id` sub-field; empty arrays become `Null`;
/// non-empty arrays are kept as their JSON text.
fn project(value: Option<&Value>) -> ScalarValue {
    match value {
        None => ScalarValue::Null,
        Some(Value::Object(map)) => map
            .get("id")
            .and_then(ScalarValue::from_json)
            .unwrap_or(ScalarValue::Null),
        Some(Value::Array(items)) if items.is_empty() => ScalarValue::Null,
        Some(array @ Value::Array(_)) => ScalarValue::Text(array.to_string()),
        Some(scalar) => ScalarValue::from_json(scalar).unwrap_or(ScalarValue::Null),
    }
}

/// Strips surrounding whitespace from a text id. A blank id becomes `Null`.
fn trim_id(record: &mut CanonicalRecord) {
    let Some(ScalarValue::Text(id)) = record.get(ID_FIELD) else {
        return;
    };
    let trimmed = id.trim();
    if trimmed.len() == id.len() && !trimmed.is_empty() {
        return;
    }
    let value = if trimmed.is_empty() {
        ScalarValue::Null
    } else {
        ScalarValue::Text(trimmed.to_string())
    };
    record.insert(ID_FIELD, value);
}
