//! SQLite storage adapter
//!
//! Moves entity records to and from the store with no knowledge of
//! cross-entity relationships. All statements are parameterized and derived
//! from the declarative table model; every batch operation runs inside one
//! transaction and either commits whole or leaves the store untouched.

use std::cell::Cell;
use std::collections::HashSet;
use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};

use super::schema;
use crate::record::{Provenance, Record};
use crate::schema::tables::*;
use crate::schema::{Column, ColumnMeta, ColumnType, Table};
use crate::value::{ColumnValue, Value};
use crate::{Error, Result};

/// SQLite host parameter ceiling leaves headroom below the engine's limit
const MAX_SQL_PARAMS: usize = 500;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(*b as i64)),
        })
    }
}

/// Result of a batch update: how many records were submitted and how many
/// actually matched a stored row. `matched < submitted` means some records'
/// identifiers had no row behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub submitted: usize,
    pub matched: usize,
}

impl UpdateOutcome {
    /// Whether every submitted record matched a stored row
    pub fn complete(&self) -> bool {
        self.submitted == self.matched
    }
}

/// SQLite-backed store for the food log.
pub struct SqliteDatabase {
    conn: Connection,
    txn_depth: Cell<u32>,
}

impl SqliteDatabase {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn, txn_depth: Cell::new(0) };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn, txn_depth: Cell::new(0) };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(&stmt, [])?;
        }
        Ok(())
    }

    // ========== Transactions ==========

    /// Run `f` inside a transaction.
    ///
    /// The outermost call issues BEGIN IMMEDIATE and COMMIT/ROLLBACK; nested
    /// calls join the open transaction, so a failure anywhere rolls back the
    /// whole outer operation.
    pub fn transactionally<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let root = self.txn_depth.get() == 0;
        if root {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        self.txn_depth.set(self.txn_depth.get() + 1);
        let outcome = f(self);
        self.txn_depth.set(self.txn_depth.get() - 1);
        match outcome {
            Ok(value) => {
                if root {
                    self.conn.execute_batch("COMMIT")?;
                }
                Ok(value)
            }
            Err(err) => {
                if root {
                    // The failed statement may already have aborted the
                    // transaction; the original error is what matters.
                    let _ = self.conn.execute_batch("ROLLBACK");
                }
                Err(err)
            }
        }
    }

    // ========== Select Operations ==========

    /// Select all rows whose key column matches one of `keys`.
    ///
    /// Empty `keys` is rejected; callers wanting every row must say so via
    /// [`SqliteDatabase::select_all`].
    pub fn select_by_keys<T: Table, V: ColumnValue>(
        &self,
        key: &Column<T, V>,
        keys: &[V],
    ) -> Result<Vec<Record<T>>> {
        if keys.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "select on {}.{} requires at least one key",
                T::NAME,
                key.name()
            )));
        }
        let keys: Vec<Value> = keys.iter().map(|k| k.clone().into_value()).collect();
        let mut records = Vec::new();
        for chunk in keys.chunks(MAX_SQL_PARAMS) {
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                projection::<T>(),
                T::NAME,
                key.name(),
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                records.push(record_from_row::<T>(row)?);
            }
        }
        Ok(records)
    }

    /// Select every row of the table - the explicit full-scan entry point
    pub fn select_all<T: Table>(&self) -> Result<Vec<Record<T>>> {
        let sql = format!("SELECT {} FROM {}", projection::<T>(), T::NAME);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row::<T>(row)?);
        }
        Ok(records)
    }

    /// Select rows where any of the given text columns matches a LIKE pattern
    pub fn select_like<T: Table>(
        &self,
        columns: &[&Column<T, String>],
        pattern: &str,
    ) -> Result<Vec<Record<T>>> {
        if columns.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "pattern select on {} requires at least one column",
                T::NAME
            )));
        }
        let predicate = columns
            .iter()
            .map(|column| format!("{} LIKE ?1", column.name()))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!("SELECT {} FROM {} WHERE {}", projection::<T>(), T::NAME, predicate);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([pattern])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row::<T>(row)?);
        }
        Ok(records)
    }

    // ========== Insert Operations ==========

    /// Insert every record in one transaction with a single prepared
    /// statement; all rows are written or none are.
    ///
    /// With `keep_existing_id` false the identifier column is omitted and the
    /// store assigns it; true binds the given identifier verbatim (restore and
    /// bulk-reload scenarios). Records still referencing parents by natural
    /// key are rejected before any write.
    pub fn insert_batch<T: Table>(
        &self,
        records: &[Record<T>],
        keep_existing_id: bool,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            if let Some(&column) = record.unresolved_columns().first() {
                return Err(Error::UnresolvedReference { table: T::NAME, column });
            }
        }
        let columns = bound_columns::<T>(keep_existing_id);
        let names = columns.iter().map(|meta| meta.name).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::NAME,
            names,
            placeholders(columns.len())
        );
        let written = self.transactionally(|db| {
            let mut stmt = db.conn.prepare(&sql)?;
            let mut written = 0;
            for record in records {
                let params: Vec<&Value> =
                    columns.iter().map(|meta| record.value_at(meta.index)).collect();
                written += stmt.execute(params_from_iter(params))?;
            }
            Ok(written)
        })?;
        tracing::debug!(table = T::NAME, rows = written, "insert batch");
        Ok(written)
    }

    /// Insert a single record, returning its identifier
    pub fn insert_one<T: Table>(&self, record: &Record<T>, keep_existing_id: bool) -> Result<i64> {
        self.transactionally(|db| {
            db.insert_batch(std::slice::from_ref(record), keep_existing_id)?;
            if keep_existing_id {
                record.id().ok_or_else(|| {
                    Error::InvalidArguments(format!(
                        "insert into {} keeping the existing id requires an id",
                        T::NAME
                    ))
                })
            } else {
                Ok(db.conn.last_insert_rowid())
            }
        })
    }

    // ========== Update Operations ==========

    /// Update every record's editable columns, keyed by identifier, in one
    /// transaction. The outcome reports how many rows actually matched.
    pub fn update_batch<T: Table>(&self, records: &[Record<T>]) -> Result<UpdateOutcome> {
        if records.is_empty() {
            return Ok(UpdateOutcome { submitted: 0, matched: 0 });
        }
        let id = T::id_column().meta();
        let columns: Vec<&'static ColumnMeta> = T::columns()
            .iter()
            .map(|column| column.meta())
            .filter(|meta| meta.editable)
            .collect();
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(position, meta)| format!("{} = ?{}", meta.name, position + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            T::NAME,
            assignments,
            id.name,
            columns.len() + 1
        );
        let outcome = self.transactionally(|db| {
            let mut stmt = db.conn.prepare(&sql)?;
            let mut matched = 0;
            for record in records {
                let record_id = record.id().ok_or_else(|| {
                    Error::InvalidArguments(format!("update on {} requires an id", T::NAME))
                })?;
                let mut params: Vec<Value> =
                    columns.iter().map(|meta| record.value_at(meta.index).clone()).collect();
                params.push(Value::Integer(record_id));
                matched += stmt.execute(params_from_iter(params.iter()))?;
            }
            Ok(UpdateOutcome { submitted: records.len(), matched })
        })?;
        tracing::debug!(
            table = T::NAME,
            submitted = outcome.submitted,
            matched = outcome.matched,
            "update batch"
        );
        Ok(outcome)
    }

    // ========== Delete Operations ==========

    /// Delete rows whose key column equals the given value
    pub fn delete_by_key<T: Table, V: ColumnValue>(
        &self,
        key: &Column<T, V>,
        value: V,
    ) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE {} = ?1", T::NAME, key.name());
        let deleted = self.conn.execute(&sql, [value.into_value()])?;
        tracing::debug!(table = T::NAME, rows = deleted, "delete by key");
        Ok(deleted)
    }

    /// Delete rows whose column matches any of the given values, in one
    /// transaction
    pub fn delete_by_column_values<T: Table, V: ColumnValue>(
        &self,
        column: &Column<T, V>,
        values: &[V],
    ) -> Result<usize> {
        if values.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "delete on {}.{} requires at least one value",
                T::NAME,
                column.name()
            )));
        }
        let values: Vec<Value> = values.iter().map(|v| v.clone().into_value()).collect();
        self.transactionally(|db| {
            let mut deleted = 0;
            for chunk in values.chunks(MAX_SQL_PARAMS) {
                let sql = format!(
                    "DELETE FROM {} WHERE {} IN ({})",
                    T::NAME,
                    column.name(),
                    placeholders(chunk.len())
                );
                deleted += db.conn.execute(&sql, params_from_iter(chunk.iter()))?;
            }
            Ok(deleted)
        })
    }

    // ========== Existence Probes ==========

    /// Whether a row with the given identifier exists
    pub fn exists_by_id<T: Table>(&self, id: i64) -> Result<bool> {
        let id_name = T::id_column().name();
        let sql = format!("SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1", T::NAME, id_name);
        let hit: Option<i64> = self.conn.query_row(&sql, [id], |row| row.get(0)).optional()?;
        Ok(hit.is_some())
    }

    /// The subset of the given identifiers that exist
    pub fn exists_by_ids<T: Table>(&self, ids: &[i64]) -> Result<HashSet<i64>> {
        let mut found = HashSet::new();
        if ids.is_empty() {
            return Ok(found);
        }
        let id_name = T::id_column().name();
        for chunk in ids.chunks(MAX_SQL_PARAMS) {
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                id_name,
                T::NAME,
                id_name,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                found.insert(row.get(0)?);
            }
        }
        Ok(found)
    }

    /// Count all rows of a table
    pub fn count<T: Table>(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", T::NAME);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            categories: self.count::<FoodCategoryTable>()?,
            foods: self.count::<FoodTable>()?,
            servings: self.count::<ServingTable>()?,
            nutrition_records: self.count::<NutritionDataTable>()?,
            meals: self.count::<MealTable>()?,
            portions: self.count::<FoodPortionTable>()?,
            ingredients: self.count::<IngredientTable>()?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    pub categories: usize,
    pub foods: usize,
    pub servings: usize,
    pub nutrition_records: usize,
    pub meals: usize,
    pub portions: usize,
    pub ingredients: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Categories: {}", self.categories)?;
        writeln!(f, "  Foods: {}", self.foods)?;
        writeln!(f, "  Servings: {}", self.servings)?;
        writeln!(f, "  Nutrition records: {}", self.nutrition_records)?;
        writeln!(f, "  Meals: {}", self.meals)?;
        writeln!(f, "  Portions: {}", self.portions)?;
        write!(f, "  Ingredients: {}", self.ingredients)
    }
}

// ========== Row Conversion Helpers ==========

fn projection<T: Table>() -> String {
    T::columns().iter().map(|column| column.meta().name).collect::<Vec<_>>().join(", ")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn bound_columns<T: Table>(keep_existing_id: bool) -> Vec<&'static ColumnMeta> {
    let id_index = T::id_column().meta().index;
    T::columns()
        .iter()
        .map(|column| column.meta())
        .filter(|meta| keep_existing_id || meta.index != id_index)
        .collect()
}

fn record_from_row<T: Table>(row: &rusqlite::Row<'_>) -> Result<Record<T>> {
    let mut builder = Record::<T>::build(Provenance::Unchanged);
    for column in T::columns() {
        let meta = column.meta();
        let raw = row.get_ref(meta.index)?;
        builder = builder.set_raw(*column, value_from_ref(T::NAME, meta, raw)?);
    }
    builder.build()
}

/// Convert one stored cell to a value, directed by the column's declared type
fn value_from_ref(table: &'static str, meta: &ColumnMeta, raw: ValueRef<'_>) -> Result<Value> {
    let mismatch = || Error::TypeMismatch {
        table,
        column: meta.name,
        expected: meta.kind.as_str(),
    };
    let value = match (meta.kind, raw) {
        (_, ValueRef::Null) => Value::Null,
        (ColumnType::Id | ColumnType::Integer | ColumnType::Timestamp, ValueRef::Integer(i)) => {
            Value::Integer(i)
        }
        (ColumnType::Real, ValueRef::Real(r)) => Value::Real(r),
        (ColumnType::Real, ValueRef::Integer(i)) => Value::Real(i as f64),
        (ColumnType::Boolean, ValueRef::Integer(i)) => Value::Boolean(i != 0),
        (ColumnType::Text | ColumnType::Date, ValueRef::Text(bytes)) => {
            match std::str::from_utf8(bytes) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => return Err(mismatch()),
            }
        }
        _ => return Err(mismatch()),
    };
    Ok(value)
}
