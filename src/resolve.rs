//! Foreign-key resolution - natural keys to surrogate identifiers
//!
//! A batch of new records may reference parents that were themselves only just
//! inserted (or are being inserted in the same operation) by the parent's
//! natural key instead of its identifier. Resolution substitutes the real
//! identifiers, one foreign-key column at a time, in the dependency order the
//! caller supplies: a column is resolvable once its parent rows exist in the
//! store, including rows written earlier inside the same open transaction.
//!
//! Resolution is all-or-nothing per call: a single natural key with no parent
//! row fails the whole call and no records come back resolved.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::{Record, UNASSIGNED_ID};
use crate::schema::{Column, Table};
use crate::storage::SqliteDatabase;
use crate::value::Value;
use crate::{Error, Result};

/// Resolve one foreign-key column of `records` against the parent table's
/// natural-key column.
///
/// Records without a pending natural key for this column pass through
/// untouched. Consumes each resolved record's natural-key entry, so the
/// returned records no longer reference their parents by name.
pub fn resolve_fk_column<T: Table, P: Table>(
    db: &SqliteDatabase,
    records: Vec<Record<T>>,
    fk: &'static Column<T, i64>,
    parent_key: &'static Column<P, String>,
) -> Result<Vec<Record<T>>> {
    let target = fk.meta().fk.ok_or_else(|| {
        Error::Consistency(format!("{}.{} is not a foreign-key column", T::NAME, fk.name()))
    })?;
    if target.table != P::NAME || target.column != P::id_column().name() {
        return Err(Error::Consistency(format!(
            "{}.{} references {}.{}, not {}.{}",
            T::NAME,
            fk.name(),
            target.table,
            target.column,
            P::NAME,
            P::id_column().name()
        )));
    }
    let declared_key = P::natural_key().ok_or_else(|| {
        Error::Consistency(format!("{} declares no natural key", P::NAME))
    })?;
    if declared_key.meta().index != parent_key.meta().index {
        return Err(Error::Consistency(format!(
            "{}.{} is not the natural key of {}",
            P::NAME,
            parent_key.name(),
            P::NAME
        )));
    }

    let wanted: BTreeSet<String> = records
        .iter()
        .filter_map(|record| record.natural_key_for(fk))
        .map(str::to_string)
        .collect();
    if wanted.is_empty() {
        return Ok(records);
    }

    let keys: Vec<String> = wanted.into_iter().collect();
    let parents = db.select_by_keys(parent_key, &keys)?;

    let mut id_by_key: BTreeMap<String, i64> = BTreeMap::new();
    for parent in &parents {
        let key = parent.get(parent_key).ok_or_else(|| {
            Error::Consistency(format!(
                "{} row without a {} value matched a key lookup",
                P::NAME,
                parent_key.name()
            ))
        })?;
        let id = parent.id().ok_or_else(|| {
            Error::Consistency(format!("{} row for key {:?} has no id", P::NAME, key))
        })?;
        if id_by_key.insert(key.clone(), id).is_some() {
            return Err(Error::Consistency(format!(
                "natural key {}.{} = {:?} matches more than one row",
                P::NAME,
                parent_key.name(),
                key
            )));
        }
    }

    let missing: Vec<String> =
        keys.iter().filter(|key| !id_by_key.contains_key(*key)).cloned().collect();
    if !missing.is_empty() {
        return Err(Error::DanglingReference {
            table: T::NAME,
            column: fk.name(),
            keys: missing,
        });
    }

    tracing::debug!(
        table = T::NAME,
        column = fk.name(),
        keys = keys.len(),
        "resolved foreign keys"
    );

    Ok(records
        .into_iter()
        .map(|record| {
            match record.natural_key_for(fk).and_then(|key| id_by_key.get(key)).copied() {
                Some(id) => record.with(fk, id),
                None => record,
            }
        })
        .collect())
}

/// Postcondition gate before persistence: every foreign-key column of every
/// record must hold a concrete identifier, however it got there.
///
/// Rejects pending natural-key entries, placeholder identifiers, and missing
/// values on non-nullable foreign keys.
pub fn check_all_fks_resolved<T: Table>(records: &[Record<T>]) -> Result<()> {
    for record in records {
        for column in T::fk_columns() {
            let meta = column.meta();
            if record.has_pending_key(column) {
                return Err(Error::UnresolvedReference { table: T::NAME, column: meta.name });
            }
            match record.value(column) {
                Value::Integer(id) if *id == UNASSIGNED_ID => {
                    return Err(Error::UnresolvedReference { table: T::NAME, column: meta.name });
                }
                Value::Null if !meta.nullable => {
                    return Err(Error::UnresolvedReference { table: T::NAME, column: meta.name });
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Provenance;
    use crate::schema::tables::*;

    fn seeded_db() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let category = Record::<FoodCategoryTable>::build(Provenance::New)
            .set(&CATEGORY_NAME, "grains".to_string())
            .build()
            .unwrap();
        db.insert_batch(&[category], false).unwrap();
        db
    }

    fn stored_food(db: &SqliteDatabase, index_name: &str) -> i64 {
        let food = Record::<FoodTable>::build(Provenance::New)
            .set(&FOOD_INDEX_NAME, index_name.to_string())
            .set(&FOOD_NAME, index_name.to_string())
            .set(&FOOD_CATEGORY, "grains".to_string())
            .build()
            .unwrap();
        db.insert_one(&food, false).unwrap()
    }

    fn pending_ingredient(composite: &str, food: &str) -> Record<IngredientTable> {
        Record::build(Provenance::Imported)
            .reference_by_key(&INGREDIENT_COMPOSITE_FOOD_ID, composite)
            .reference_by_key(&INGREDIENT_FOOD_ID, food)
            .set(&INGREDIENT_QUANTITY, 50.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolution_totality() {
        let db = seeded_db();
        let muesli = stored_food(&db, "muesli");
        let oats = stored_food(&db, "oats");
        let wheat = stored_food(&db, "wheat");

        let batch = vec![
            pending_ingredient("muesli", "oats"),
            pending_ingredient("muesli", "wheat"),
            pending_ingredient("muesli", "oats"),
        ];
        let batch =
            resolve_fk_column(&db, batch, &INGREDIENT_COMPOSITE_FOOD_ID, &FOOD_INDEX_NAME)
                .unwrap();
        let batch = resolve_fk_column(&db, batch, &INGREDIENT_FOOD_ID, &FOOD_INDEX_NAME).unwrap();

        assert_eq!(batch.len(), 3);
        for record in &batch {
            assert!(!record.has_unresolved_references());
            assert_eq!(record.get(&INGREDIENT_COMPOSITE_FOOD_ID), Some(muesli));
        }
        assert_eq!(batch[0].get(&INGREDIENT_FOOD_ID), Some(oats));
        assert_eq!(batch[1].get(&INGREDIENT_FOOD_ID), Some(wheat));
        check_all_fks_resolved(&batch).unwrap();
    }

    #[test]
    fn test_dangling_key_fails_whole_call() {
        let db = seeded_db();
        stored_food(&db, "muesli");
        stored_food(&db, "oats");

        let batch = vec![
            pending_ingredient("muesli", "oats"),
            pending_ingredient("muesli", "unicorn_dust"),
        ];
        let batch =
            resolve_fk_column(&db, batch, &INGREDIENT_COMPOSITE_FOOD_ID, &FOOD_INDEX_NAME)
                .unwrap();
        let err =
            resolve_fk_column(&db, batch, &INGREDIENT_FOOD_ID, &FOOD_INDEX_NAME).unwrap_err();
        match err {
            Error::DanglingReference { table, column, keys } => {
                assert_eq!(table, "ingredient");
                assert_eq!(column, "food_id");
                assert_eq!(keys, vec!["unicorn_dust".to_string()]);
            }
            other => panic!("expected DanglingReference, got {:?}", other),
        }
    }

    #[test]
    fn test_records_without_pending_keys_pass_through() {
        let db = seeded_db();
        let oats = stored_food(&db, "oats");
        let muesli = stored_food(&db, "muesli");

        let direct = Record::<IngredientTable>::build(Provenance::New)
            .set(&INGREDIENT_COMPOSITE_FOOD_ID, muesli)
            .set(&INGREDIENT_FOOD_ID, oats)
            .set(&INGREDIENT_QUANTITY, 25.0)
            .build()
            .unwrap();
        let resolved =
            resolve_fk_column(&db, vec![direct.clone()], &INGREDIENT_FOOD_ID, &FOOD_INDEX_NAME)
                .unwrap();
        assert_eq!(resolved[0], direct);
    }

    #[test]
    fn test_mismatched_parent_column_is_consistency_fault() {
        let db = seeded_db();
        let batch = vec![pending_ingredient("muesli", "oats")];
        let err = resolve_fk_column(&db, batch, &INGREDIENT_FOOD_ID, &FOOD_NAME).unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
        assert!(err.is_invariant_breach());
    }

    #[test]
    fn test_postcondition_rejects_placeholder_ids() {
        let portion = Record::<FoodPortionTable>::build(Provenance::New)
            .set(&PORTION_QUANTITY, 100.0)
            .set(&PORTION_FOOD_ID, 1)
            .set(&PORTION_MEAL_ID, UNASSIGNED_ID)
            .build()
            .unwrap();
        let err = check_all_fks_resolved(std::slice::from_ref(&portion)).unwrap_err();
        match err {
            Error::UnresolvedReference { table, column } => {
                assert_eq!(table, "food_portion");
                assert_eq!(column, "meal_id");
            }
            other => panic!("expected UnresolvedReference, got {:?}", other),
        }
    }
}
