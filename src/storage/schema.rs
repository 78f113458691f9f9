//! Database schema definitions, generated from the declarative table model
//!
//! The schema is declared once in [`crate::schema::tables`]; this module
//! renders it as CREATE TABLE / CREATE INDEX statements so the store can be
//! provisioned on open. Foreign-key columns get a FOREIGN KEY clause (with
//! ON DELETE CASCADE where declared) and a supporting index; the natural-key
//! column, where declared, gets a UNIQUE constraint.

use crate::schema::tables::*;
use crate::schema::{ColumnType, Table};

/// Render the CREATE TABLE statement for one table
pub fn create_table_sql<T: Table>() -> String {
    let natural_key_index = T::natural_key().map(|column| column.meta().index);
    let mut clauses = Vec::new();

    for column in T::columns() {
        let meta = column.meta();
        let mut clause = format!("{} {}", meta.name, meta.kind.sql_type());
        if meta.kind == ColumnType::Id {
            clause.push_str(" PRIMARY KEY AUTOINCREMENT");
        } else if !meta.nullable {
            clause.push_str(" NOT NULL");
        }
        if Some(meta.index) == natural_key_index {
            clause.push_str(" UNIQUE");
        }
        clauses.push(clause);
    }

    for column in T::columns() {
        if let Some(fk) = column.meta().fk {
            let mut clause = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                column.meta().name,
                fk.table,
                fk.column
            );
            if fk.cascade {
                clause.push_str(" ON DELETE CASCADE");
            }
            clauses.push(clause);
        }
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        T::NAME,
        clauses.join(",\n    ")
    )
}

/// Render the supporting index statements for one table's foreign keys
pub fn index_sql<T: Table>() -> Vec<String> {
    T::columns()
        .iter()
        .filter(|column| column.meta().fk.is_some())
        .map(|column| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})",
                table = T::NAME,
                column = column.meta().name
            )
        })
        .collect()
}

/// All schema creation statements, parents before children
pub fn all_schema_statements() -> Vec<String> {
    let mut statements = vec![
        create_table_sql::<FoodCategoryTable>(),
        create_table_sql::<FoodTable>(),
        create_table_sql::<ServingTable>(),
        create_table_sql::<NutritionDataTable>(),
        create_table_sql::<MealTable>(),
        create_table_sql::<FoodPortionTable>(),
        create_table_sql::<IngredientTable>(),
    ];
    statements.extend(index_sql::<FoodTable>());
    statements.extend(index_sql::<ServingTable>());
    statements.extend(index_sql::<NutritionDataTable>());
    statements.extend(index_sql::<FoodPortionTable>());
    statements.extend(index_sql::<IngredientTable>());
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_table_ddl() {
        let sql = create_table_sql::<FoodTable>();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS food"));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("index_name TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("brand TEXT,"));
        assert!(sql.contains("FOREIGN KEY (category) REFERENCES food_category (name)"));
    }

    #[test]
    fn test_cascade_rendered() {
        let sql = create_table_sql::<ServingTable>();
        assert!(sql.contains("FOREIGN KEY (food_id) REFERENCES food (id) ON DELETE CASCADE"));
        let sql = create_table_sql::<FoodPortionTable>();
        assert!(sql.contains("FOREIGN KEY (food_id) REFERENCES food (id)"));
        assert!(sql.contains("FOREIGN KEY (meal_id) REFERENCES meal (id) ON DELETE CASCADE"));
    }

    #[test]
    fn test_fk_indexes() {
        let indexes = index_sql::<IngredientTable>();
        assert_eq!(indexes.len(), 3);
        assert!(indexes[0].contains("idx_ingredient_composite_food_id"));
    }

    #[test]
    fn test_statement_count() {
        // 7 tables + fk indexes (food 1, serving 1, nutrition 1, portion 3, ingredient 3)
        assert_eq!(all_schema_statements().len(), 16);
    }
}
