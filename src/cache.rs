//! Read-through cache over the storage adapter and assembler
//!
//! [`CachedStore`] owns the database handle plus in-memory food and meal
//! caches; it is constructed once at process start and passed by reference to
//! everything that reads or writes, so there are no global singletons. Reads
//! populate the cache on miss; every write invalidates the written entity's
//! entry and the parent entries it affects. There is no expiry - staleness is
//! bounded entirely by invalidation.

use std::collections::BTreeMap;
use std::path::Path;

use crate::assemble::{self, Food, Meal};
use crate::record::Record;
use crate::schema::tables::*;
use crate::storage::SqliteDatabase;
use crate::write::{self, ImportReport, MealImport, WriteResult};
use crate::Result;

/// Process-lifetime persistence context: database handle plus caches.
pub struct CachedStore {
    db: SqliteDatabase,
    foods: BTreeMap<i64, Food>,
    meals: BTreeMap<i64, Meal>,
    all_foods_loaded: bool,
}

impl CachedStore {
    /// Wrap an already-open database
    pub fn new(db: SqliteDatabase) -> Self {
        CachedStore { db, foods: BTreeMap::new(), meals: BTreeMap::new(), all_foods_loaded: false }
    }

    /// Open a database file and wrap it
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(SqliteDatabase::open(path)?))
    }

    /// Open an in-memory database and wrap it (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqliteDatabase::open_in_memory()?))
    }

    /// Direct access to the underlying database
    pub fn database(&self) -> &SqliteDatabase {
        &self.db
    }

    // ========== Cached Reads ==========

    /// One food by id, from cache or store
    pub fn food(&mut self, id: i64) -> Result<Option<&Food>> {
        if !self.foods.contains_key(&id) {
            match assemble::food_by_id(&self.db, id)? {
                Some(food) => {
                    self.foods.insert(id, food);
                }
                None => return Ok(None),
            }
        }
        Ok(self.foods.get(&id))
    }

    /// Every food, from cache or store
    pub fn all_foods(&mut self) -> Result<&BTreeMap<i64, Food>> {
        if !self.all_foods_loaded {
            self.foods = assemble::all_foods(&self.db)?;
            self.all_foods_loaded = true;
        }
        Ok(&self.foods)
    }

    /// One meal by id, from cache or store; referenced foods land in the
    /// food cache as a side effect
    pub fn meal(&mut self, id: i64) -> Result<Option<&Meal>> {
        if !self.meals.contains_key(&id) {
            let (mut meals, foods) = assemble::meals_by_ids(&self.db, &[id])?;
            for (food_id, food) in foods {
                self.foods.entry(food_id).or_insert(food);
            }
            match meals.remove(&id) {
                Some(meal) => {
                    self.meals.insert(id, meal);
                }
                None => return Ok(None),
            }
        }
        Ok(self.meals.get(&id))
    }

    /// Ids of every meal on the given ISO day; the meals themselves land in
    /// the meal cache
    pub fn meals_for_day(&mut self, day: &str) -> Result<Vec<i64>> {
        let (meals, foods) = assemble::meals_for_day(&self.db, day)?;
        for (food_id, food) in foods {
            self.foods.entry(food_id).or_insert(food);
        }
        let ids: Vec<i64> = meals.keys().copied().collect();
        for (meal_id, meal) in meals {
            self.meals.insert(meal_id, meal);
        }
        Ok(ids)
    }

    // ========== Write-Through Operations ==========

    /// Save a food; invalidates its entry and the all-foods snapshot
    pub fn save_food(&mut self, record: &Record<FoodTable>) -> Result<WriteResult> {
        let result = write::save(&self.db, record)?;
        if let Some(id) = record.id() {
            self.invalidate_food(id);
        }
        if let WriteResult::Inserted { id } = result {
            self.invalidate_food(id);
        }
        self.all_foods_loaded = false;
        Ok(result)
    }

    /// Save a serving; invalidates its owning food and the all-foods snapshot
    pub fn save_serving(&mut self, record: &Record<ServingTable>) -> Result<WriteResult> {
        let result = write::save(&self.db, record)?;
        if let Some(food_id) = record.get(&SERVING_FOOD_ID) {
            self.invalidate_food(food_id);
        }
        self.all_foods_loaded = false;
        Ok(result)
    }

    /// Save a nutrition row; invalidates its owning food and the all-foods
    /// snapshot
    pub fn save_nutrition(&mut self, record: &Record<NutritionDataTable>) -> Result<WriteResult> {
        let result = write::save(&self.db, record)?;
        if let Some(food_id) = record.get(&NUTRITION_FOOD_ID) {
            self.invalidate_food(food_id);
        }
        self.all_foods_loaded = false;
        Ok(result)
    }

    /// Save a meal; invalidates its entry
    pub fn save_meal(&mut self, record: &Record<MealTable>) -> Result<WriteResult> {
        let result = write::save(&self.db, record)?;
        if let Some(id) = record.id() {
            self.invalidate_meal(id);
        }
        if let WriteResult::Inserted { id } = result {
            self.invalidate_meal(id);
        }
        Ok(result)
    }

    /// Save a portion; invalidates its owning meal
    pub fn save_portion(&mut self, record: &Record<FoodPortionTable>) -> Result<WriteResult> {
        let result = write::save(&self.db, record)?;
        if let Some(meal_id) = record.get(&PORTION_MEAL_ID) {
            self.invalidate_meal(meal_id);
        }
        Ok(result)
    }

    /// Delete a food; invalidates its entry and the all-foods snapshot
    pub fn delete_food(&mut self, id: i64) -> Result<usize> {
        let deleted = write::delete_by_id::<FoodTable>(&self.db, id)?;
        self.invalidate_food(id);
        self.all_foods_loaded = false;
        Ok(deleted)
    }

    /// Delete a meal (portions cascade); invalidates its entry
    pub fn delete_meal(&mut self, id: i64) -> Result<usize> {
        let deleted = write::delete_by_id::<MealTable>(&self.db, id)?;
        self.invalidate_meal(id);
        Ok(deleted)
    }

    /// Atomic food import; invalidates the all-foods snapshot
    pub fn import_foods(
        &mut self,
        foods: Vec<Record<FoodTable>>,
        ingredients: Vec<Record<IngredientTable>>,
    ) -> Result<ImportReport> {
        let report = write::import_foods(&self.db, foods, ingredients)?;
        self.all_foods_loaded = false;
        Ok(report)
    }

    /// Atomic meal import
    pub fn import_meal(
        &mut self,
        meal: Record<MealTable>,
        portions: Vec<Record<FoodPortionTable>>,
    ) -> Result<MealImport> {
        write::import_meal(&self.db, meal, portions)
    }

    fn invalidate_food(&mut self, id: i64) {
        self.foods.remove(&id);
    }

    fn invalidate_meal(&mut self, id: i64) {
        self.meals.remove(&id);
    }
}
