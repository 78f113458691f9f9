//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite, provisioned from the declarative table model:
//! - food_category(id, name)
//! - food(id, index_name, name, category, ...)
//! - serving(id, food_id, name, quantity, ...)
//! - nutrition_data(id, food_id, quantity, density, nutrients...)
//! - meal(id, name, day)
//! - food_portion(id, meal_id, food_id, serving_id, quantity, ...)
//! - ingredient(id, composite_food_id, food_id, quantity, ...)

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteDatabase, UpdateOutcome};
