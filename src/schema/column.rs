//! Column and table descriptors - the declarative schema model
//!
//! Every persisted entity kind is described once, as statics: a marker type
//! implementing [`Table`] plus one [`Column`] static per attribute. Column
//! handles are parameterized by their owning table and by the Rust type of
//! their payload, so using a column against the wrong table or with the wrong
//! value type is a compile error rather than a runtime surprise. Within a
//! table, a column's identity is its declaration index.

use std::marker::PhantomData;

/// Semantic type of a column.
///
/// Decides both the SQL affinity used when provisioning the store and the
/// value shape accepted when a stored row is converted back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Surrogate identifier, assigned by the store on insert
    Id,
    /// Plain integer
    Integer,
    /// Floating-point quantity
    Real,
    /// Free text
    Text,
    /// Flag, stored as 0/1
    Boolean,
    /// Unix-epoch seconds, stored as an integer
    Timestamp,
    /// ISO `YYYY-MM-DD` day, stored as text
    Date,
}

impl ColumnType {
    /// Get the string representation of the column type
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Id => "id",
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Date => "date",
        }
    }

    /// SQL type keyword used when generating the store schema
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Id | ColumnType::Integer | ColumnType::Boolean | ColumnType::Timestamp => {
                "INTEGER"
            }
            ColumnType::Real => "REAL",
            ColumnType::Text | ColumnType::Date => "TEXT",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default rule applied to an unset column at record construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultRule {
    /// No default; the caller must supply a value (or the column is nullable)
    None,
    /// Static integer default
    Int(i64),
    /// Static real default
    Real(f64),
    /// Static text default
    Text(&'static str),
    /// Static boolean default
    Bool(bool),
    /// Computed default: the current unix-epoch time
    CurrentTime,
}

/// Target of a foreign-key column: the parent table and the parent column the
/// value must match, plus whether deleting the parent cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FkTarget {
    pub table: &'static str,
    pub column: &'static str,
    pub cascade: bool,
}

/// Untyped description of one column: everything the persistence layer needs.
#[derive(Debug)]
pub struct ColumnMeta {
    /// Column name as stored
    pub name: &'static str,
    /// Position in the owning table's column list
    pub index: usize,
    /// Semantic type
    pub kind: ColumnType,
    /// Whether a record may carry no value for this column
    pub nullable: bool,
    /// Whether the column participates in updates (identifier and
    /// creation-time columns do not)
    pub editable: bool,
    /// Default applied at record construction
    pub default: DefaultRule,
    /// Foreign-key target, if this column references a parent table
    pub fk: Option<FkTarget>,
}

/// Typed column handle.
///
/// `T` is the owning table's marker type and `V` the payload type used by
/// [`crate::record::Record::get`]. Handles are declared as statics next to
/// their table, so two tables' columns are distinct types and can never be
/// confused even when they share a name.
pub struct Column<T, V> {
    meta: ColumnMeta,
    _marker: PhantomData<fn() -> (T, V)>,
}

impl<T, V> Column<T, V> {
    /// Declare a column: non-nullable, editable, no default
    pub const fn new(name: &'static str, index: usize, kind: ColumnType) -> Self {
        Column {
            meta: ColumnMeta {
                name,
                index,
                kind,
                nullable: false,
                editable: true,
                default: DefaultRule::None,
                fk: None,
            },
            _marker: PhantomData,
        }
    }

    /// Declare the surrogate identifier column.
    ///
    /// Nullable at record level (the store assigns the value on insert) and
    /// excluded from updates.
    pub const fn id(name: &'static str, index: usize) -> Self {
        let mut column = Self::new(name, index, ColumnType::Id);
        column.meta.nullable = true;
        column.meta.editable = false;
        column
    }

    /// Mark the column nullable
    pub const fn nullable(mut self) -> Self {
        self.meta.nullable = true;
        self
    }

    /// Exclude the column from updates
    pub const fn read_only(mut self) -> Self {
        self.meta.editable = false;
        self
    }

    /// Attach a default rule
    pub const fn with_default(mut self, default: DefaultRule) -> Self {
        self.meta.default = default;
        self
    }

    /// Declare a foreign-key target
    pub const fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.meta.fk = Some(FkTarget { table, column, cascade: false });
        self
    }

    /// Declare a foreign-key target whose parent deletion cascades
    pub const fn references_cascade(mut self, table: &'static str, column: &'static str) -> Self {
        self.meta.fk = Some(FkTarget { table, column, cascade: true });
        self
    }

    /// Untyped description of this column
    pub fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    /// Column name as stored
    pub fn name(&self) -> &'static str {
        self.meta.name
    }
}

/// Type-erased view of a column, for iterating a table's column list.
pub trait AnyColumn<T>: Sync {
    /// Untyped description of this column
    fn meta(&self) -> &ColumnMeta;
}

impl<T, V> AnyColumn<T> for Column<T, V> {
    fn meta(&self) -> &ColumnMeta {
        &self.meta
    }
}

/// A persisted entity kind: an ordered, named set of columns.
///
/// Implemented by zero-sized marker types; all descriptors are statics, so the
/// schema is immutable and globally singleton and identity comparisons between
/// columns are valid.
pub trait Table: Sized + 'static {
    /// Table name as stored
    const NAME: &'static str;

    /// All columns in declaration order; a column's `index` is its position
    /// in this slice
    fn columns() -> &'static [&'static dyn AnyColumn<Self>];

    /// The surrogate identifier column
    fn id_column() -> &'static Column<Self, i64>;

    /// The natural/unique key column, if the table declares one
    fn natural_key() -> Option<&'static dyn AnyColumn<Self>> {
        None
    }

    /// Foreign-key columns in declaration order
    fn fk_columns() -> Vec<&'static dyn AnyColumn<Self>> {
        Self::columns()
            .iter()
            .copied()
            .filter(|column| column.meta().fk.is_some())
            .collect()
    }

    /// Number of columns
    fn column_count() -> usize {
        Self::columns().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_sql_affinity() {
        assert_eq!(ColumnType::Id.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Timestamp.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Real.sql_type(), "REAL");
        assert_eq!(ColumnType::Date.sql_type(), "TEXT");
    }

    #[test]
    fn test_id_column_shape() {
        struct Dummy;
        const COL: Column<Dummy, i64> = Column::id("id", 0);
        assert_eq!(COL.name(), "id");
        assert!(COL.meta().nullable);
        assert!(!COL.meta().editable);
        assert_eq!(COL.meta().kind, ColumnType::Id);
    }

    #[test]
    fn test_builder_flags() {
        struct Dummy;
        const COL: Column<Dummy, String> = Column::new("notes", 3, ColumnType::Text)
            .nullable()
            .with_default(DefaultRule::Text("-"));
        assert!(COL.meta().nullable);
        assert!(COL.meta().editable);
        assert_eq!(COL.meta().default, DefaultRule::Text("-"));
    }

    #[test]
    fn test_fk_target() {
        struct Dummy;
        const COL: Column<Dummy, i64> =
            Column::new("food_id", 7, ColumnType::Integer).references_cascade("food", "id");
        let fk = COL.meta().fk.unwrap();
        assert_eq!(fk.table, "food");
        assert_eq!(fk.column, "id");
        assert!(fk.cascade);
    }
}
