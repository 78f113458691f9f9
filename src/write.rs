//! Write operations - provenance-directed saves and atomic imports
//!
//! [`save`] routes a single record to insert or update based on its
//! provenance, probing the store when the provenance alone cannot decide.
//! The import operations are the reason the resolution engine exists: a whole
//! batch of new foods plus ingredients referencing them by index name goes
//! through insert, resolve, and insert again inside one transaction, so a
//! single bad row rolls back everything including the already-staged parents.

use crate::record::{Provenance, Record};
use crate::resolve::{check_all_fks_resolved, resolve_fk_column};
use crate::schema::tables::*;
use crate::schema::Table;
use crate::storage::{SqliteDatabase, UpdateOutcome};
use crate::Result;

/// What a [`save`] call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    /// A row was inserted with this identifier
    Inserted { id: i64 },
    /// An update ran; the outcome says whether it matched a row
    Updated(UpdateOutcome),
    /// The record was already persisted and unchanged; nothing was written
    Unchanged,
}

/// Persist one record according to its provenance.
///
/// Unchanged records are a no-op; edited records update; restored records
/// insert keeping their identifier. New, imported, and computed records
/// insert, unless they already carry an identifier that exists in the store,
/// in which case they update instead.
pub fn save<T: Table>(db: &SqliteDatabase, record: &Record<T>) -> Result<WriteResult> {
    match record.provenance() {
        Provenance::Unchanged => Ok(WriteResult::Unchanged),
        Provenance::Edited => update_one(db, record),
        Provenance::Restored => {
            let id = db.insert_one(record, true)?;
            Ok(WriteResult::Inserted { id })
        }
        Provenance::New | Provenance::Imported | Provenance::Computed => match record.id() {
            Some(id) if db.exists_by_id::<T>(id)? => update_one(db, record),
            _ => {
                let id = db.insert_one(record, false)?;
                Ok(WriteResult::Inserted { id })
            }
        },
    }
}

fn update_one<T: Table>(db: &SqliteDatabase, record: &Record<T>) -> Result<WriteResult> {
    let outcome = db.update_batch(std::slice::from_ref(record))?;
    Ok(WriteResult::Updated(outcome))
}

/// Insert a batch of records of one table in one transaction
pub fn insert_records<T: Table>(
    db: &SqliteDatabase,
    records: &[Record<T>],
    keep_existing_ids: bool,
) -> Result<usize> {
    db.insert_batch(records, keep_existing_ids)
}

/// Update a batch of records of one table in one transaction
pub fn update_records<T: Table>(db: &SqliteDatabase, records: &[Record<T>]) -> Result<UpdateOutcome> {
    db.update_batch(records)
}

/// Delete one row by identifier; returns the number of rows removed
pub fn delete_by_id<T: Table>(db: &SqliteDatabase, id: i64) -> Result<usize> {
    db.delete_by_key(T::id_column(), id)
}

/// Counts written by a food import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub foods: usize,
    pub ingredients: usize,
}

/// Import new foods and their ingredients as one atomic unit.
///
/// Ingredients may reference the foods in this same batch (and any
/// already-stored food) by index name. The foods are inserted first, the
/// ingredients' references are resolved against the open transaction, and the
/// ingredients are inserted last; any failure rolls the whole batch back,
/// foods included.
pub fn import_foods(
    db: &SqliteDatabase,
    foods: Vec<Record<FoodTable>>,
    ingredients: Vec<Record<IngredientTable>>,
) -> Result<ImportReport> {
    db.transactionally(move |db| {
        let food_rows = db.insert_batch(&foods, false)?;
        let ingredients =
            resolve_fk_column(db, ingredients, &INGREDIENT_COMPOSITE_FOOD_ID, &FOOD_INDEX_NAME)?;
        let ingredients = resolve_fk_column(db, ingredients, &INGREDIENT_FOOD_ID, &FOOD_INDEX_NAME)?;
        check_all_fks_resolved(&ingredients)?;
        let ingredient_rows = db.insert_batch(&ingredients, false)?;
        tracing::info!(foods = food_rows, ingredients = ingredient_rows, "food import committed");
        Ok(ImportReport { foods: food_rows, ingredients: ingredient_rows })
    })
}

/// Counts written by a meal import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealImport {
    pub meal_id: i64,
    pub portions: usize,
}

/// Import a new meal and its portions as one atomic unit.
///
/// The meal's new identifier is stamped into every portion; portions may
/// reference foods by index name. Any failure rolls back the meal row too.
pub fn import_meal(
    db: &SqliteDatabase,
    meal: Record<MealTable>,
    portions: Vec<Record<FoodPortionTable>>,
) -> Result<MealImport> {
    db.transactionally(move |db| {
        let meal_id = db.insert_one(&meal, false)?;
        let portions: Vec<Record<FoodPortionTable>> =
            portions.iter().map(|portion| portion.with(&PORTION_MEAL_ID, meal_id)).collect();
        let portions = resolve_fk_column(db, portions, &PORTION_FOOD_ID, &FOOD_INDEX_NAME)?;
        check_all_fks_resolved(&portions)?;
        let portion_rows = db.insert_batch(&portions, false)?;
        tracing::info!(meal_id, portions = portion_rows, "meal import committed");
        Ok(MealImport { meal_id, portions: portion_rows })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;
    use crate::record::UNASSIGNED_ID;
    use crate::Error;

    fn seeded_db() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let category = Record::<FoodCategoryTable>::build(Provenance::New)
            .set(&CATEGORY_NAME, "grains".to_string())
            .build()
            .unwrap();
        db.insert_batch(&[category], false).unwrap();
        db
    }

    fn new_food(index_name: &str) -> Record<FoodTable> {
        Record::build(Provenance::New)
            .set(&FOOD_INDEX_NAME, index_name.to_string())
            .set(&FOOD_NAME, index_name.to_string())
            .set(&FOOD_CATEGORY, "grains".to_string())
            .build()
            .unwrap()
    }

    fn composite_food(index_name: &str) -> Record<FoodTable> {
        new_food(index_name).with(&FOOD_TYPE, "composite".to_string())
    }

    fn pending_ingredient(composite: &str, food: &str, grams: f64) -> Record<IngredientTable> {
        Record::build(Provenance::Imported)
            .reference_by_key(&INGREDIENT_COMPOSITE_FOOD_ID, composite)
            .reference_by_key(&INGREDIENT_FOOD_ID, food)
            .set(&INGREDIENT_QUANTITY, grams)
            .build()
            .unwrap()
    }

    #[test]
    fn test_save_routes_by_provenance() {
        let db = seeded_db();

        let food = new_food("oats");
        let result = save(&db, &food).unwrap();
        let id = match result {
            WriteResult::Inserted { id } => id,
            other => panic!("expected insert, got {:?}", other),
        };

        let stored = db.select_by_keys(&FOOD_ID, &[id]).unwrap().remove(0);
        assert_eq!(save(&db, &stored).unwrap(), WriteResult::Unchanged);

        // New provenance with an existing id falls back to update
        let renamed = stored.with(&FOOD_NAME, "Rolled Oats".to_string());
        let reimported = new_food("oats").with_id(id).with(&FOOD_NAME, "Oats".to_string());
        assert!(matches!(save(&db, &renamed.with(&FOOD_ID, id)), Ok(WriteResult::Unchanged)));
        match save(&db, &reimported).unwrap() {
            WriteResult::Updated(outcome) => assert!(outcome.complete()),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_save_restored_keeps_id() {
        let db = seeded_db();
        let food = Record::<FoodTable>::build(Provenance::Restored)
            .set(&FOOD_INDEX_NAME, "oats".to_string())
            .set(&FOOD_NAME, "oats".to_string())
            .set(&FOOD_CATEGORY, "grains".to_string())
            .set(&FOOD_ID, 42)
            .build()
            .unwrap();
        assert_eq!(save(&db, &food).unwrap(), WriteResult::Inserted { id: 42 });
        assert!(db.exists_by_id::<FoodTable>(42).unwrap());
    }

    #[test]
    fn test_import_composite_food_with_ingredients() {
        let db = seeded_db();
        db.insert_one(&new_food("water"), false).unwrap();

        let nutrition = |food: &str, fat: f64, density: Option<f64>| {
            let food_id = assemble::food_by_index_name(&db, food).unwrap().unwrap().id;
            let mut builder = Record::<NutritionDataTable>::build(Provenance::New)
                .set(&NUTRITION_FOOD_ID, food_id)
                .set(&NUTRITION_FAT, fat);
            if let Some(density) = density {
                builder = builder.set(&NUTRITION_DENSITY, density);
            }
            db.insert_one(&builder.build().unwrap(), false).unwrap();
        };
        nutrition("water", 0.0, None);

        let report = import_foods(
            &db,
            vec![composite_food("dressing"), new_food("olive_oil")],
            vec![
                pending_ingredient("dressing", "olive_oil", 100.0),
                pending_ingredient("dressing", "water", 100.0),
            ],
        )
        .unwrap();
        assert_eq!(report, ImportReport { foods: 2, ingredients: 2 });

        nutrition("olive_oil", 92.0, Some(0.92));

        let foods = assemble::all_foods(&db).unwrap();
        let dressing = foods
            .values()
            .find(|food| food.index_name() == "dressing")
            .unwrap();
        assert!(dressing.is_composite());
        assert_eq!(dressing.ingredients.len(), 2);

        let derived = crate::nutrition::composite_nutrition(dressing, &foods).unwrap();
        assert_eq!(derived.get(&NUTRITION_FAT), Some(92.0));
        assert_eq!(derived.get(&NUTRITION_QUANTITY), Some(200.0));
    }

    #[test]
    fn test_import_rolls_back_on_dangling_ingredient() {
        let db = seeded_db();
        db.insert_one(&new_food("oats"), false).unwrap();

        let err = import_foods(
            &db,
            vec![composite_food("muesli")],
            vec![
                pending_ingredient("muesli", "oats", 50.0),
                pending_ingredient("muesli", "unicorn_dust", 10.0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DanglingReference { .. }));

        // The logically-valid composite food row rolled back with the batch
        assert!(assemble::food_by_index_name(&db, "muesli").unwrap().is_none());
        assert_eq!(db.count::<IngredientTable>().unwrap(), 0);
        assert_eq!(db.count::<FoodTable>().unwrap(), 1);
    }

    #[test]
    fn test_import_meal_stamps_meal_id() {
        let db = seeded_db();
        db.insert_one(&new_food("oats"), false).unwrap();

        let meal = Record::<MealTable>::build(Provenance::Imported)
            .set(&MEAL_NAME, "breakfast".to_string())
            .set(&MEAL_DAY, "2024-05-01".to_string())
            .build()
            .unwrap();
        let portion = Record::<FoodPortionTable>::build(Provenance::Imported)
            .set(&PORTION_QUANTITY, 80.0)
            .set(&PORTION_MEAL_ID, UNASSIGNED_ID)
            .reference_by_key(&PORTION_FOOD_ID, "oats")
            .build()
            .unwrap();

        let result = import_meal(&db, meal, vec![portion]).unwrap();
        assert_eq!(result.portions, 1);

        let (meals, foods) = assemble::meals_by_ids(&db, &[result.meal_id]).unwrap();
        assert_eq!(meals[&result.meal_id].portions.len(), 1);
        assert_eq!(foods.len(), 1);
    }

    #[test]
    fn test_import_meal_rolls_back_on_bad_portion() {
        let db = seeded_db();
        let meal = Record::<MealTable>::build(Provenance::Imported)
            .set(&MEAL_NAME, "breakfast".to_string())
            .set(&MEAL_DAY, "2024-05-01".to_string())
            .build()
            .unwrap();
        let portion = Record::<FoodPortionTable>::build(Provenance::Imported)
            .set(&PORTION_QUANTITY, 80.0)
            .set(&PORTION_MEAL_ID, UNASSIGNED_ID)
            .reference_by_key(&PORTION_FOOD_ID, "nothing_here")
            .build()
            .unwrap();

        let err = import_meal(&db, meal, vec![portion]).unwrap_err();
        assert!(matches!(err, Error::DanglingReference { .. }));
        assert_eq!(db.count::<MealTable>().unwrap(), 0);
        assert_eq!(db.count::<FoodPortionTable>().unwrap(), 0);
    }

    #[test]
    fn test_delete_by_id() {
        let db = seeded_db();
        let id = db.insert_one(&new_food("oats"), false).unwrap();
        assert_eq!(delete_by_id::<FoodTable>(&db, id).unwrap(), 1);
        assert_eq!(delete_by_id::<FoodTable>(&db, id).unwrap(), 0);
    }
}
