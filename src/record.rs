//! Entity records - immutable, provenance-tagged value bags
//!
//! A [`Record`] maps every column of its table to a [`Value`] and carries a
//! [`Provenance`] tag saying where it came from. Records are immutable; any
//! "mutation" produces a new copy. Construction goes through
//! [`RecordBuilder`], which applies column defaults and rejects records
//! missing a value for a non-nullable column.
//!
//! While a record's provenance is new/imported/computed it may also carry a
//! natural-key map: foreign-key columns whose parent row is not yet persisted
//! are marked with a snapshot of the parent's natural-key text instead of an
//! identifier. The resolution engine consumes those entries and substitutes
//! the real ids before the record can be inserted.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::schema::{AnyColumn, Column, ColumnMeta, DefaultRule, Table};
use crate::value::{ColumnValue, Value};
use crate::{Error, Result};

/// Placeholder identifier for a foreign key whose parent id is stamped in
/// later within the same atomic operation. Rejected by the resolution
/// postcondition check if it survives until insert time.
pub const UNASSIGNED_ID: i64 = 0;

/// Where an entity record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Read from the store and not modified since
    Unchanged,
    /// Newly created by the user
    New,
    /// Created by a bulk import
    Imported,
    /// Read from the store, then modified
    Edited,
    /// Reloaded from a backup, keeping its original identifier
    Restored,
    /// Derived by computation (nutrition sums, rescaled data)
    Computed,
}

impl Provenance {
    /// Get the string representation of the provenance tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Unchanged => "unchanged",
            Provenance::New => "new",
            Provenance::Imported => "imported",
            Provenance::Edited => "edited",
            Provenance::Restored => "restored",
            Provenance::Computed => "computed",
        }
    }

    /// Get all provenance tags
    pub fn all() -> &'static [Provenance] {
        &[
            Provenance::Unchanged,
            Provenance::New,
            Provenance::Imported,
            Provenance::Edited,
            Provenance::Restored,
            Provenance::Computed,
        ]
    }

    /// Whether records with this provenance may carry a natural-key map
    pub fn carries_natural_keys(&self) -> bool {
        matches!(self, Provenance::New | Provenance::Imported | Provenance::Computed)
    }
}

impl std::str::FromStr for Provenance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "unchanged" | "persisted" => Ok(Provenance::Unchanged),
            "new" => Ok(Provenance::New),
            "imported" | "import" => Ok(Provenance::Imported),
            "edited" | "edit" => Ok(Provenance::Edited),
            "restored" | "restore" => Ok(Provenance::Restored),
            "computed" | "derived" => Ok(Provenance::Computed),
            _ => Err(Error::InvalidArguments(format!("unknown provenance: {}", s))),
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of one table: an immutable mapping from every column to a value.
pub struct Record<T: Table> {
    values: Vec<Value>,
    provenance: Provenance,
    natural_keys: BTreeMap<usize, String>,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> Record<T> {
    /// Start building a record with the given provenance
    pub fn build(provenance: Provenance) -> RecordBuilder<T> {
        RecordBuilder::new(provenance)
    }

    /// Typed read of one column; `None` means the column holds no value
    pub fn get<V: ColumnValue>(&self, column: &Column<T, V>) -> Option<V> {
        V::from_value(&self.values[column.meta().index])
    }

    /// Raw read of one column
    pub fn value(&self, column: &dyn AnyColumn<T>) -> &Value {
        &self.values[column.meta().index]
    }

    pub(crate) fn value_at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// The surrogate identifier, if assigned
    pub fn id(&self) -> Option<i64> {
        self.get(T::id_column())
    }

    /// Provenance tag
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Copy of this record with one column replaced; same provenance.
    ///
    /// Setting a foreign-key column also discards any pending natural-key
    /// entry for it.
    pub fn with<V: ColumnValue>(&self, column: &Column<T, V>, value: V) -> Record<T> {
        let index = column.meta().index;
        let mut next = self.clone();
        next.values[index] = value.into_value();
        next.natural_keys.remove(&index);
        next
    }

    /// Copy of this record with the identifier column set
    pub fn with_id(&self, id: i64) -> Record<T> {
        self.with(T::id_column(), id)
    }

    /// Full, order-preserving snapshot of all columns and values
    pub fn entries(&self) -> impl Iterator<Item = (&'static ColumnMeta, &Value)> + '_ {
        T::columns().iter().zip(self.values.iter()).map(|(column, value)| (column.meta(), value))
    }

    /// Pending natural key for a foreign-key column, if resolution has not
    /// yet substituted the parent's identifier
    pub fn natural_key_for(&self, column: &Column<T, i64>) -> Option<&str> {
        self.natural_keys.get(&column.meta().index).map(String::as_str)
    }

    /// Whether the given column still has a pending natural-key entry
    pub fn has_pending_key(&self, column: &dyn AnyColumn<T>) -> bool {
        self.natural_keys.contains_key(&column.meta().index)
    }

    /// Whether any column still references its parent by natural key
    pub fn has_unresolved_references(&self) -> bool {
        !self.natural_keys.is_empty()
    }

    /// Names of all columns still referencing parents by natural key
    pub fn unresolved_columns(&self) -> Vec<&'static str> {
        T::columns()
            .iter()
            .filter(|column| self.natural_keys.contains_key(&column.meta().index))
            .map(|column| column.meta().name)
            .collect()
    }

    /// Compare the user-supplied data of two records: every editable,
    /// non-identifier, non-timestamp column. Store-assigned columns are
    /// excluded so a freshly-read row compares equal to the record that
    /// produced it.
    pub fn user_data_equals(&self, other: &Record<T>) -> bool {
        use crate::schema::ColumnType;
        T::columns().iter().all(|column| {
            let meta = column.meta();
            if !meta.editable || matches!(meta.kind, ColumnType::Id | ColumnType::Timestamp) {
                return true;
            }
            self.values[meta.index] == other.values[meta.index]
        })
    }

    /// Export as a JSON object keyed by column name
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (meta, value) in self.entries() {
            let json = match value {
                Value::Null => serde_json::Value::Null,
                Value::Integer(i) => serde_json::Value::from(*i),
                Value::Real(r) => serde_json::Value::from(*r),
                Value::Text(s) => serde_json::Value::from(s.clone()),
                Value::Boolean(b) => serde_json::Value::from(*b),
            };
            object.insert(meta.name.to_string(), json);
        }
        serde_json::Value::Object(object)
    }
}

impl<T: Table> Clone for Record<T> {
    fn clone(&self) -> Self {
        Record {
            values: self.values.clone(),
            provenance: self.provenance,
            natural_keys: self.natural_keys.clone(),
            _table: PhantomData,
        }
    }
}

impl<T: Table> PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
            && self.provenance == other.provenance
            && self.natural_keys == other.natural_keys
    }
}

impl<T: Table> std::fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct(T::NAME);
        for (meta, value) in self.entries() {
            if !value.is_null() {
                debug.field(meta.name, value);
            }
        }
        debug.field("provenance", &self.provenance.as_str());
        debug.finish()
    }
}

/// Builder for one record; validates on [`RecordBuilder::build`].
pub struct RecordBuilder<T: Table> {
    values: Vec<Value>,
    natural_keys: BTreeMap<usize, String>,
    provenance: Provenance,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> RecordBuilder<T> {
    fn new(provenance: Provenance) -> Self {
        RecordBuilder {
            values: vec![Value::Null; T::column_count()],
            natural_keys: BTreeMap::new(),
            provenance,
            _table: PhantomData,
        }
    }

    /// Set a column to a typed value
    pub fn set<V: ColumnValue>(mut self, column: &Column<T, V>, value: V) -> Self {
        self.values[column.meta().index] = value.into_value();
        self
    }

    pub(crate) fn set_raw(mut self, column: &dyn AnyColumn<T>, value: Value) -> Self {
        self.values[column.meta().index] = value;
        self
    }

    /// Mark a foreign-key column as referencing its parent by natural key.
    ///
    /// The column stays unset; resolution substitutes the parent's identifier
    /// and consumes the entry.
    pub fn reference_by_key(mut self, column: &Column<T, i64>, key: impl Into<String>) -> Self {
        self.natural_keys.insert(column.meta().index, key.into());
        self
    }

    /// Apply defaults, validate, and freeze the record.
    ///
    /// Fails with [`Error::SchemaViolation`] listing every non-nullable,
    /// non-defaulted column still missing a value. The identifier column is
    /// exempt (the store assigns it), as is any foreign-key column with a
    /// pending natural-key entry. Records read back from the store
    /// (provenance unchanged) skip validation; their cells were already
    /// type-checked during row conversion.
    pub fn build(self) -> Result<Record<T>> {
        let RecordBuilder { mut values, natural_keys, provenance, _table } = self;

        if !natural_keys.is_empty() && !provenance.carries_natural_keys() {
            return Err(Error::InvalidArguments(format!(
                "{} record with provenance {} cannot carry natural-key references",
                T::NAME,
                provenance
            )));
        }

        for column in T::columns() {
            let meta = column.meta();
            if !values[meta.index].is_null() {
                continue;
            }
            values[meta.index] = match meta.default {
                DefaultRule::None => continue,
                DefaultRule::Int(i) => Value::Integer(i),
                DefaultRule::Real(r) => Value::Real(r),
                DefaultRule::Text(s) => Value::Text(s.to_string()),
                DefaultRule::Bool(b) => Value::Boolean(b),
                DefaultRule::CurrentTime => Value::Integer(now_epoch()),
            };
        }

        if provenance != Provenance::Unchanged {
            let missing: Vec<&'static str> = T::columns()
                .iter()
                .filter(|column| {
                    let meta = column.meta();
                    !meta.nullable
                        && values[meta.index].is_null()
                        && !natural_keys.contains_key(&meta.index)
                })
                .map(|column| column.meta().name)
                .collect();
            if !missing.is_empty() {
                return Err(Error::SchemaViolation { table: T::NAME, columns: missing });
            }
        }

        Ok(Record { values, provenance, natural_keys, _table: PhantomData })
    }
}

fn now_epoch() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
