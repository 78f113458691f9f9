//! # Larder - typed persistence core for a food and nutrition log
//!
//! Persists a small relational model - foods, servings, nutrition records,
//! meals, food portions, composite-food ingredients - into SQLite, and
//! reassembles flat rows into connected in-memory aggregates.
//!
//! Larder provides:
//! - A declarative, typed schema model (tables as marker types, columns as
//!   typed static handles)
//! - Immutable, provenance-tagged entity records with construction-time
//!   validation
//! - A parameterized batch insert/update/select adapter with atomic
//!   transactions
//! - A graph assembler that attaches children with one batched lookup per
//!   child table
//! - A foreign-key resolution engine so batches of brand-new records can
//!   reference each other by natural key and commit together
//! - A read-through cache with write invalidation

pub mod assemble;
pub mod cache;
pub mod config;
pub mod nutrition;
pub mod record;
pub mod resolve;
pub mod schema;
pub mod storage;
pub mod units;
pub mod value;
pub mod write;

// Re-exports for convenient access
pub use assemble::{Food, FoodType, Meal};
pub use cache::CachedStore;
pub use record::{Provenance, Record, RecordBuilder};
pub use schema::{Column, ColumnType, Table};
pub use storage::{SqliteDatabase, UpdateOutcome};
pub use units::QtyUnit;
pub use value::Value;

/// Result type alias for Larder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Larder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-nullable column had no value at record construction
    #[error("{table}: missing values for non-nullable columns: {columns:?}")]
    SchemaViolation { table: &'static str, columns: Vec<&'static str> },

    /// A stored value could not convert to its column's declared type
    #[error("{table}.{column}: stored value does not match declared type {expected}")]
    TypeMismatch { table: &'static str, column: &'static str, expected: &'static str },

    /// The caller supplied arguments the operation cannot act on
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A natural-key reference matched no parent row
    #[error("{table}.{column}: no parent row for natural keys {keys:?}")]
    DanglingReference { table: &'static str, column: &'static str, keys: Vec<String> },

    /// A foreign-key column reached persistence without a concrete identifier
    #[error("{table}.{column}: foreign key is not resolved to an identifier")]
    UnresolvedReference { table: &'static str, column: &'static str },

    /// The store contradicts a structural invariant; a defect, not bad input
    #[error("store consistency fault: {0}")]
    Consistency(String),

    /// Storage error (constraint violations, connectivity)
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure indicates a broken internal invariant rather than
    /// recoverable bad input
    pub fn is_invariant_breach(&self) -> bool {
        matches!(self, Error::Consistency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::Consistency("broken".to_string()).is_invariant_breach());
        assert!(!Error::InvalidArguments("bad".to_string()).is_invariant_breach());
        assert!(!Error::DanglingReference {
            table: "ingredient",
            column: "food_id",
            keys: vec!["oats".to_string()],
        }
        .is_invariant_breach());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::SchemaViolation { table: "food", columns: vec!["name"] };
        assert!(err.to_string().contains("food"));
        assert!(err.to_string().contains("name"));

        let err = Error::DanglingReference {
            table: "ingredient",
            column: "food_id",
            keys: vec!["unicorn_dust".to_string()],
        };
        assert!(err.to_string().contains("ingredient.food_id"));
        assert!(err.to_string().contains("unicorn_dust"));
    }
}
