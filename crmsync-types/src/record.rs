//! Canonical records and field-level diffs.

use crate::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the primary-key field shared by every entity kind.
pub const ID_FIELD: &str = "id";

static NULL: ScalarValue = ScalarValue::Null;

/// Key used to match a source record with its target counterpart.
///
/// Built from the textual form of the `id` value so that the remote string
/// `"5"` and the stored integer `5` address the same row. Text is used
/// verbatim, so the key always equals the value written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    /// Derives the key for an id value. `Null` has no key.
    #[must_use]
    pub fn from_value(value: &ScalarValue) -> Option<Self> {
        let key = match value {
            ScalarValue::Null => return None,
            ScalarValue::Text(s) => s.clone(),
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Real(r) if r.fract() == 0.0 && r.abs() < 9.0e15 => {
                (*r as i64).to_string()
            }
            other => other.to_string(),
        };
        Some(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A flat field → scalar mapping in the local store's naming.
///
/// Fields are kept sorted by name so iteration (and therefore logging and
/// serialization) is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: BTreeMap<String, ScalarValue>,
}

impl CanonicalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets a field, returning the previous value.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<ScalarValue>,
    ) -> Option<ScalarValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<ScalarValue> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&ScalarValue> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut ScalarValue> {
        self.fields.get_mut(field)
    }

    /// Returns the field value, treating an absent field as `Null`.
    pub fn value(&self, field: &str) -> &ScalarValue {
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The primary key value, if present and non-null.
    pub fn id(&self) -> Option<&ScalarValue> {
        self.fields.get(ID_FIELD).filter(|v| !v.is_null())
    }

    /// Matching key derived from `id`.
    pub fn key(&self) -> Option<RecordKey> {
        self.id().and_then(RecordKey::from_value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for CanonicalRecord
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The changed fields of one record, carrying the source's values plus `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordDiff(CanonicalRecord);

impl RecordDiff {
    /// Wraps a partial record. Fails if it has no `id`.
    pub fn new(partial: CanonicalRecord) -> crate::Result<Self> {
        if partial.id().is_none() {
            return Err(crate::Error::MissingId);
        }
        Ok(Self(partial))
    }

    /// The id of the record this diff addresses.
    pub fn id(&self) -> &ScalarValue {
        self.0.value(ID_FIELD)
    }

    pub fn key(&self) -> Option<RecordKey> {
        self.0.key()
    }

    /// Changed fields, excluding `id`.
    pub fn changes(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.0.fields().filter(|(name, _)| *name != ID_FIELD)
    }

    /// Number of changed fields, excluding `id`.
    pub fn change_count(&self) -> usize {
        self.changes().count()
    }

    /// True when nothing besides `id` is present.
    pub fn is_noop(&self) -> bool {
        self.change_count() == 0
    }

    pub fn as_record(&self) -> &CanonicalRecord {
        &self.0
    }

    pub fn into_record(self) -> CanonicalRecord {
        self.0
    }
}
