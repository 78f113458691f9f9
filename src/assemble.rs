//! Graph Assembler - flat rows into connected aggregates
//!
//! Rows come out of the store unlinked; this module attaches children to
//! parents and hands back aggregates keyed by id in `BTreeMap` arenas.
//! Relationships are held as identifiers and looked up in the arena at read
//! time, so there are no back-pointers and no reference cycles.
//!
//! Child attachment always issues one batched lookup per child table, never
//! one per parent: collect the parent ids, select every child row whose
//! foreign key is in that set, group by foreign-key value, and register each
//! group on its parent. A child whose parent is missing from the arena means
//! the store contradicts itself; that is a consistency fault, not bad input.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::Record;
use crate::schema::tables::*;
use crate::schema::{Column, Table};
use crate::storage::SqliteDatabase;
use crate::{Error, Result};

/// Kind of a food: a basic food with stored nutrition data, or a composite
/// food whose nutrition is derived from its ingredients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoodType {
    /// Basic food with stored nutrition data
    Primary,
    /// Food made of ingredient amounts of other foods
    Composite,
}

impl FoodType {
    /// Get the string representation of the food type
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodType::Primary => "primary",
            FoodType::Composite => "composite",
        }
    }

    /// Get all food types
    pub fn all() -> &'static [FoodType] {
        &[FoodType::Primary, FoodType::Composite]
    }
}

impl std::str::FromStr for FoodType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "primary" | "basic" => Ok(FoodType::Primary),
            "composite" | "recipe" => Ok(FoodType::Composite),
            _ => Err(Error::InvalidArguments(format!("unknown food type: {}", s))),
        }
    }
}

impl std::fmt::Display for FoodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A food with its attached children.
#[derive(Debug, Clone)]
pub struct Food {
    /// Surrogate identifier (always present on assembled foods)
    pub id: i64,
    pub record: Record<FoodTable>,
    pub servings: Vec<Record<ServingTable>>,
    /// Stored nutrition data; composite foods derive theirs instead
    pub nutrition: Option<Record<NutritionDataTable>>,
    /// Ingredient rows, for composite foods
    pub ingredients: Vec<Record<IngredientTable>>,
}

impl Food {
    fn new(record: Record<FoodTable>) -> Result<Self> {
        let id = record
            .id()
            .ok_or_else(|| Error::Consistency("food row without an id".to_string()))?;
        Ok(Food { id, record, servings: Vec::new(), nutrition: None, ingredients: Vec::new() })
    }

    /// Natural key of this food
    pub fn index_name(&self) -> String {
        self.record.get(&FOOD_INDEX_NAME).unwrap_or_default()
    }

    /// Display name of this food
    pub fn name(&self) -> String {
        self.record.get(&FOOD_NAME).unwrap_or_default()
    }

    /// Kind of this food; unrecognized stored values read as primary
    pub fn food_type(&self) -> FoodType {
        self.record
            .get(&FOOD_TYPE)
            .and_then(|stored| stored.parse().ok())
            .unwrap_or(FoodType::Primary)
    }

    /// Whether this food's nutrition is derived from ingredients
    pub fn is_composite(&self) -> bool {
        self.food_type() == FoodType::Composite
    }

    /// Find an attached serving by id
    pub fn serving(&self, serving_id: i64) -> Option<&Record<ServingTable>> {
        self.servings.iter().find(|serving| serving.id() == Some(serving_id))
    }

    /// The serving marked as default, if any
    pub fn default_serving(&self) -> Option<&Record<ServingTable>> {
        self.servings.iter().find(|serving| serving.get(&SERVING_IS_DEFAULT) == Some(true))
    }
}

/// A meal with its attached portions.
#[derive(Debug, Clone)]
pub struct Meal {
    /// Surrogate identifier (always present on assembled meals)
    pub id: i64,
    pub record: Record<MealTable>,
    pub portions: Vec<Record<FoodPortionTable>>,
}

impl Meal {
    fn new(record: Record<MealTable>) -> Result<Self> {
        let id = record
            .id()
            .ok_or_else(|| Error::Consistency("meal row without an id".to_string()))?;
        Ok(Meal { id, record, portions: Vec::new() })
    }

    /// Display name of this meal
    pub fn name(&self) -> String {
        self.record.get(&MEAL_NAME).unwrap_or_default()
    }

    /// Day this meal belongs to, as ISO text
    pub fn day(&self) -> String {
        self.record.get(&MEAL_DAY).unwrap_or_default()
    }
}

// ========== Food Assembly ==========

/// Assemble every food in the store
pub fn all_foods(db: &SqliteDatabase) -> Result<BTreeMap<i64, Food>> {
    foods_from_records(db, db.select_all::<FoodTable>()?)
}

/// Assemble the foods with the given ids; ids without a row are skipped
pub fn foods_by_ids(db: &SqliteDatabase, ids: &[i64]) -> Result<BTreeMap<i64, Food>> {
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    foods_from_records(db, db.select_by_keys(FoodTable::id_column(), ids)?)
}

/// Assemble one food by id
pub fn food_by_id(db: &SqliteDatabase, id: i64) -> Result<Option<Food>> {
    Ok(foods_by_ids(db, &[id])?.remove(&id))
}

/// Assemble one food by its natural key
pub fn food_by_index_name(db: &SqliteDatabase, index_name: &str) -> Result<Option<Food>> {
    let records = db.select_by_keys(&FOOD_INDEX_NAME, &[index_name.to_string()])?;
    let id = records.first().and_then(|record| record.id());
    let mut foods = foods_from_records(db, records)?;
    Ok(id.and_then(|id| foods.remove(&id)))
}

/// Assemble every food whose index name or display name contains the fragment
pub fn search_foods(db: &SqliteDatabase, fragment: &str) -> Result<BTreeMap<i64, Food>> {
    let pattern = format!("%{}%", fragment);
    let records = db.select_like(&[&FOOD_INDEX_NAME, &FOOD_NAME], &pattern)?;
    let matched: BTreeSet<i64> = records.iter().filter_map(|record| record.id()).collect();
    let mut foods = foods_from_records(db, records)?;
    foods.retain(|id, _| matched.contains(id));
    Ok(foods)
}

/// Assemble the given food rows, attach their children, and pull in the
/// foods their ingredients reference so the returned arena is self-contained
/// for nutrition derivation. Each round of the loop handles one frontier of
/// not-yet-assembled foods with one batched lookup per child table.
fn foods_from_records(
    db: &SqliteDatabase,
    records: Vec<Record<FoodTable>>,
) -> Result<BTreeMap<i64, Food>> {
    let mut foods = BTreeMap::new();
    let mut frontier = Vec::new();
    for record in records {
        let food = Food::new(record)?;
        frontier.push(food.id);
        foods.insert(food.id, food);
    }

    while !frontier.is_empty() {
        for (food_id, servings) in children_by_parent(db, &SERVING_FOOD_ID, &frontier)? {
            parent_mut(&mut foods, food_id, ServingTable::NAME)?.servings = servings;
        }

        for (food_id, mut rows) in children_by_parent(db, &NUTRITION_FOOD_ID, &frontier)? {
            if rows.len() > 1 {
                return Err(Error::Consistency(format!(
                    "food {} has {} nutrition rows",
                    food_id,
                    rows.len()
                )));
            }
            parent_mut(&mut foods, food_id, NutritionDataTable::NAME)?.nutrition = rows.pop();
        }

        for (food_id, ingredients) in
            children_by_parent(db, &INGREDIENT_COMPOSITE_FOOD_ID, &frontier)?
        {
            parent_mut(&mut foods, food_id, IngredientTable::NAME)?.ingredients = ingredients;
        }

        let mut referenced: BTreeSet<i64> = BTreeSet::new();
        for food_id in &frontier {
            if let Some(food) = foods.get(food_id) {
                for ingredient in &food.ingredients {
                    if let Some(ingredient_food_id) = ingredient.get(&INGREDIENT_FOOD_ID) {
                        if !foods.contains_key(&ingredient_food_id) {
                            referenced.insert(ingredient_food_id);
                        }
                    }
                }
            }
        }

        frontier.clear();
        if !referenced.is_empty() {
            let wanted: Vec<i64> = referenced.into_iter().collect();
            for record in db.select_by_keys(FoodTable::id_column(), &wanted)? {
                let food = Food::new(record)?;
                frontier.push(food.id);
                foods.insert(food.id, food);
            }
        }
    }

    Ok(foods)
}

fn parent_mut<'a>(
    foods: &'a mut BTreeMap<i64, Food>,
    food_id: i64,
    child_table: &str,
) -> Result<&'a mut Food> {
    foods.get_mut(&food_id).ok_or_else(|| {
        Error::Consistency(format!("{} rows reference missing food {}", child_table, food_id))
    })
}

/// One batched child lookup: all rows of `C` whose foreign-key column is in
/// `parent_ids`, grouped by that column's value
fn children_by_parent<C: Table>(
    db: &SqliteDatabase,
    fk: &'static Column<C, i64>,
    parent_ids: &[i64],
) -> Result<BTreeMap<i64, Vec<Record<C>>>> {
    let mut grouped: BTreeMap<i64, Vec<Record<C>>> = BTreeMap::new();
    if parent_ids.is_empty() {
        return Ok(grouped);
    }
    for child in db.select_by_keys(fk, parent_ids)? {
        let parent_id = child.get(fk).ok_or_else(|| {
            Error::Consistency(format!("{} row without a {} value", C::NAME, fk.name()))
        })?;
        grouped.entry(parent_id).or_default().push(child);
    }
    Ok(grouped)
}

// ========== Meal Assembly ==========

/// Assemble the meals with the given ids, plus the arena of every food their
/// portions reference
pub fn meals_by_ids(
    db: &SqliteDatabase,
    ids: &[i64],
) -> Result<(BTreeMap<i64, Meal>, BTreeMap<i64, Food>)> {
    if ids.is_empty() {
        return Ok((BTreeMap::new(), BTreeMap::new()));
    }
    meals_from_records(db, db.select_by_keys(MealTable::id_column(), ids)?)
}

/// Assemble every meal on the given ISO day, plus the referenced foods
pub fn meals_for_day(
    db: &SqliteDatabase,
    day: &str,
) -> Result<(BTreeMap<i64, Meal>, BTreeMap<i64, Food>)> {
    meals_from_records(db, db.select_by_keys(&MEAL_DAY, &[day.to_string()])?)
}

fn meals_from_records(
    db: &SqliteDatabase,
    records: Vec<Record<MealTable>>,
) -> Result<(BTreeMap<i64, Meal>, BTreeMap<i64, Food>)> {
    let mut meals = BTreeMap::new();
    for record in records {
        let meal = Meal::new(record)?;
        meals.insert(meal.id, meal);
    }
    if meals.is_empty() {
        return Ok((meals, BTreeMap::new()));
    }
    let ids: Vec<i64> = meals.keys().copied().collect();

    for (meal_id, portions) in children_by_parent(db, &PORTION_MEAL_ID, &ids)? {
        meals
            .get_mut(&meal_id)
            .ok_or_else(|| {
                Error::Consistency(format!(
                    "food_portion rows reference missing meal {}",
                    meal_id
                ))
            })?
            .portions = portions;
    }

    let mut food_ids: BTreeSet<i64> = BTreeSet::new();
    for meal in meals.values() {
        for portion in &meal.portions {
            if let Some(food_id) = portion.get(&PORTION_FOOD_ID) {
                food_ids.insert(food_id);
            }
        }
    }
    let foods = foods_by_ids(db, &food_ids.into_iter().collect::<Vec<_>>())?;

    // Portions must point at foods we just fetched, and any serving they name
    // must belong to that food.
    for meal in meals.values() {
        for portion in &meal.portions {
            let food_id = portion.get(&PORTION_FOOD_ID).ok_or_else(|| {
                Error::Consistency("food_portion row without a food_id value".to_string())
            })?;
            let food = foods.get(&food_id).ok_or_else(|| {
                Error::Consistency(format!("portion references missing food {}", food_id))
            })?;
            if let Some(serving_id) = portion.get(&PORTION_SERVING_ID) {
                if food.serving(serving_id).is_none() {
                    return Err(Error::Consistency(format!(
                        "portion references serving {} which does not belong to food {}",
                        serving_id, food_id
                    )));
                }
            }
        }
    }

    Ok((meals, foods))
}
