//! Schema Model - declarative, typed description of persisted entities
//!
//! Tables are zero-sized marker types; columns are typed static handles.
//! The storage layer derives its DDL and all its SQL column lists from these
//! descriptors, so the schema is declared exactly once.

pub mod column;
pub mod tables;

pub use column::{AnyColumn, Column, ColumnMeta, ColumnType, DefaultRule, FkTarget, Table};
pub use tables::*;
