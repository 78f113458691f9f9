//! Nutrition arithmetic - rescaling, normalization, and summation
//!
//! Nutrition data rows express nutrient amounts for a reference quantity
//! (typically 100 g). Combining amounts across foods first normalizes every
//! quantity to grams - volumes convert through the row's declared density -
//! after which summation is plain addition and therefore order-independent.
//!
//! All derived rows carry provenance `Computed` and are never written back to
//! the store; a composite food's totals in particular are always recomputed
//! from its ingredients.

use std::collections::BTreeMap;

use crate::assemble::Food;
use crate::record::{Provenance, Record};
use crate::schema::tables::*;
use crate::schema::Column;
use crate::units::QtyUnit;
use crate::{Error, Result};

/// The nutrient columns that participate in rescaling and summation
static NUTRIENT_COLUMNS: [&Column<NutritionDataTable, f64>; 9] = [
    &NUTRITION_KILOJOULES,
    &NUTRITION_CALORIES,
    &NUTRITION_PROTEIN,
    &NUTRITION_FAT,
    &NUTRITION_SATURATED_FAT,
    &NUTRITION_CARBOHYDRATE,
    &NUTRITION_SUGAR,
    &NUTRITION_FIBRE,
    &NUTRITION_SODIUM,
];

/// Convert a quantity to grams.
///
/// Mass units convert through their metric factor alone; volume units
/// additionally need a density (grams per millilitre).
pub fn quantity_in_grams(quantity: f64, unit: QtyUnit, density: Option<f64>) -> Result<f64> {
    if unit.is_volume() {
        let density = density.ok_or_else(|| {
            Error::InvalidArguments(format!(
                "cannot convert {} {} to grams without a density",
                quantity, unit
            ))
        })?;
        Ok(quantity * unit.metric_factor() * density)
    } else {
        Ok(quantity * unit.metric_factor())
    }
}

fn declared_unit(stored: Option<String>, fallback: QtyUnit) -> Result<QtyUnit> {
    match stored {
        Some(text) => text.parse(),
        None => Ok(fallback),
    }
}

/// The gram equivalent of a nutrition row's reference quantity
pub fn data_grams(data: &Record<NutritionDataTable>) -> Result<f64> {
    let quantity = data.get(&NUTRITION_QUANTITY).unwrap_or(100.0);
    let unit = declared_unit(data.get(&NUTRITION_QUANTITY_UNIT), QtyUnit::Grams)?;
    quantity_in_grams(quantity, unit, data.get(&NUTRITION_DENSITY))
}

/// Rescale a nutrition row to a new quantity.
///
/// Every nutrient scales by the ratio of gram-normalized quantities; the
/// result is expressed in grams with provenance `Computed`.
pub fn rescale(
    data: &Record<NutritionDataTable>,
    quantity: f64,
    unit: QtyUnit,
) -> Result<Record<NutritionDataTable>> {
    let current_grams = data_grams(data)?;
    if current_grams <= 0.0 {
        return Err(Error::InvalidArguments(format!(
            "nutrition quantity must be positive, got {} g",
            current_grams
        )));
    }
    let density = data.get(&NUTRITION_DENSITY);
    let target_grams = quantity_in_grams(quantity, unit, density)?;
    let ratio = target_grams / current_grams;

    let mut builder = Record::build(Provenance::Computed)
        .set(&NUTRITION_QUANTITY, target_grams)
        .set(&NUTRITION_QUANTITY_UNIT, QtyUnit::Grams.abbr().to_string());
    if let Some(food_id) = data.get(&NUTRITION_FOOD_ID) {
        builder = builder.set(&NUTRITION_FOOD_ID, food_id);
    }
    if let Some(density) = density {
        builder = builder.set(&NUTRITION_DENSITY, density);
    }
    for column in NUTRIENT_COLUMNS {
        if let Some(amount) = data.get(column) {
            builder = builder.set(column, amount * ratio);
        }
    }
    builder.build()
}

/// Sum nutrition rows into one combined row.
///
/// Each row's quantity is normalized to grams first; nutrient amounts add
/// directly, with a nutrient staying absent only when no operand carries it.
/// Addition is commutative, so any permutation of the same rows produces the
/// same totals.
pub fn sum(items: &[Record<NutritionDataTable>]) -> Result<Record<NutritionDataTable>> {
    let mut total_grams = 0.0;
    let mut totals: Vec<Option<f64>> = vec![None; NUTRIENT_COLUMNS.len()];

    for data in items {
        total_grams += data_grams(data)?;
        for (slot, column) in NUTRIENT_COLUMNS.iter().enumerate() {
            if let Some(amount) = data.get(*column) {
                totals[slot] = Some(totals[slot].unwrap_or(0.0) + amount);
            }
        }
    }

    let mut builder = Record::build(Provenance::Computed)
        .set(&NUTRITION_QUANTITY, total_grams)
        .set(&NUTRITION_QUANTITY_UNIT, QtyUnit::Grams.abbr().to_string());
    for (slot, column) in NUTRIENT_COLUMNS.iter().enumerate() {
        if let Some(total) = totals[slot] {
            builder = builder.set(*column, total);
        }
    }
    builder.build()
}

/// Nutrition for one food: stored data for primary foods, derived from
/// ingredients for composite foods
pub fn food_nutrition(food: &Food, arena: &BTreeMap<i64, Food>) -> Result<Record<NutritionDataTable>> {
    if food.is_composite() {
        return composite_nutrition(food, arena);
    }
    food.nutrition.clone().ok_or_else(|| {
        Error::InvalidArguments(format!("food {} has no nutrition data", food.index_name()))
    })
}

/// Derive a composite food's nutrition by summing its ingredients'
/// contributions. Ingredient foods are looked up in the arena; their own
/// stored nutrition is rescaled to the ingredient's amount.
pub fn composite_nutrition(
    food: &Food,
    arena: &BTreeMap<i64, Food>,
) -> Result<Record<NutritionDataTable>> {
    if !food.is_composite() {
        return Err(Error::InvalidArguments(format!(
            "food {} is not composite",
            food.index_name()
        )));
    }
    let mut contributions = Vec::with_capacity(food.ingredients.len());
    for ingredient in &food.ingredients {
        let ingredient_food_id = ingredient.get(&INGREDIENT_FOOD_ID).ok_or_else(|| {
            Error::Consistency("ingredient row without a food_id value".to_string())
        })?;
        let ingredient_food = arena.get(&ingredient_food_id).ok_or_else(|| {
            Error::Consistency(format!(
                "ingredient references food {} not in the assembled set",
                ingredient_food_id
            ))
        })?;
        let base = ingredient_food.nutrition.clone().ok_or_else(|| {
            Error::InvalidArguments(format!(
                "ingredient food {} has no nutrition data",
                ingredient_food.index_name()
            ))
        })?;
        let (quantity, unit) = effective_quantity(
            ingredient.get(&INGREDIENT_QUANTITY),
            ingredient.get(&INGREDIENT_QUANTITY_UNIT),
            ingredient.get(&INGREDIENT_SERVING_ID),
            ingredient_food,
        )?;
        contributions.push(rescale(&base, quantity, unit)?);
    }
    sum(&contributions)
}

/// Nutrition for one portion of a food.
///
/// A portion naming a serving counts servings; otherwise its quantity is
/// taken in its own unit.
pub fn portion_nutrition(
    portion: &Record<FoodPortionTable>,
    food: &Food,
    arena: &BTreeMap<i64, Food>,
) -> Result<Record<NutritionDataTable>> {
    let base = food_nutrition(food, arena)?;
    let (quantity, unit) = effective_quantity(
        portion.get(&PORTION_QUANTITY),
        portion.get(&PORTION_QUANTITY_UNIT),
        portion.get(&PORTION_SERVING_ID),
        food,
    )?;
    rescale(&base, quantity, unit)
}

/// Combined nutrition of every portion of a meal
pub fn meal_nutrition(
    meal: &crate::assemble::Meal,
    foods: &BTreeMap<i64, Food>,
) -> Result<Record<NutritionDataTable>> {
    let mut parts = Vec::with_capacity(meal.portions.len());
    for portion in &meal.portions {
        let food_id = portion.get(&PORTION_FOOD_ID).ok_or_else(|| {
            Error::Consistency("food_portion row without a food_id value".to_string())
        })?;
        let food = foods.get(&food_id).ok_or_else(|| {
            Error::Consistency(format!("portion references food {} not in the assembled set", food_id))
        })?;
        parts.push(portion_nutrition(portion, food, foods)?);
    }
    sum(&parts)
}

fn effective_quantity(
    quantity: Option<f64>,
    unit: Option<String>,
    serving_id: Option<i64>,
    food: &Food,
) -> Result<(f64, QtyUnit)> {
    let quantity = quantity.ok_or_else(|| {
        Error::Consistency("portion or ingredient row without a quantity value".to_string())
    })?;
    match serving_id {
        Some(serving_id) => {
            let serving = food.serving(serving_id).ok_or_else(|| {
                Error::Consistency(format!(
                    "serving {} does not belong to food {}",
                    serving_id, food.id
                ))
            })?;
            let serving_quantity = serving.get(&SERVING_QUANTITY).ok_or_else(|| {
                Error::Consistency("serving row without a quantity value".to_string())
            })?;
            let serving_unit =
                declared_unit(serving.get(&SERVING_QUANTITY_UNIT), QtyUnit::Grams)?;
            Ok((quantity * serving_quantity, serving_unit))
        }
        None => Ok((quantity, declared_unit(unit, QtyUnit::Grams)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nutrition(
        quantity: f64,
        unit: &str,
        density: Option<f64>,
        fat: f64,
    ) -> Record<NutritionDataTable> {
        let mut builder = Record::build(Provenance::New)
            .set(&NUTRITION_QUANTITY, quantity)
            .set(&NUTRITION_QUANTITY_UNIT, unit.to_string())
            .set(&NUTRITION_FAT, fat);
        if let Some(density) = density {
            builder = builder.set(&NUTRITION_DENSITY, density);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_gram_normalization() {
        assert_eq!(quantity_in_grams(100.0, QtyUnit::Grams, None).unwrap(), 100.0);
        assert_eq!(quantity_in_grams(500.0, QtyUnit::Milligrams, None).unwrap(), 0.5);
        assert_eq!(quantity_in_grams(100.0, QtyUnit::Millilitres, Some(0.92)).unwrap(), 92.0);
        assert_eq!(quantity_in_grams(1.0, QtyUnit::Litres, Some(1.0)).unwrap(), 1000.0);
        assert!(quantity_in_grams(100.0, QtyUnit::Millilitres, None).is_err());
    }

    #[test]
    fn test_rescale_halves_nutrients() {
        let data = nutrition(100.0, "g", None, 10.0);
        let rescaled = rescale(&data, 50.0, QtyUnit::Grams).unwrap();
        assert_eq!(rescaled.get(&NUTRITION_FAT), Some(5.0));
        assert_eq!(rescaled.get(&NUTRITION_QUANTITY), Some(50.0));
        assert_eq!(rescaled.provenance(), Provenance::Computed);
        // Absent nutrients stay absent
        assert_eq!(rescaled.get(&NUTRITION_PROTEIN), None);
    }

    #[test]
    fn test_combined_fat_example() {
        // Food A: density 0.92, 92 g fat per 100 g; food B: water, no fat
        let a = nutrition(100.0, "g", Some(0.92), 92.0);
        let b = nutrition(100.0, "g", None, 0.0);

        let combined = sum(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(combined.get(&NUTRITION_FAT), Some(92.0));
        assert_eq!(combined.get(&NUTRITION_QUANTITY), Some(200.0));
        assert_eq!(combined.get(&NUTRITION_QUANTITY_UNIT), Some("g".to_string()));

        let flipped = sum(&[b, a]).unwrap();
        assert_eq!(flipped.get(&NUTRITION_FAT), combined.get(&NUTRITION_FAT));
        assert_eq!(flipped.get(&NUTRITION_QUANTITY), combined.get(&NUTRITION_QUANTITY));
    }

    #[test]
    fn test_sum_normalizes_volumes() {
        // 100 ml at density 0.92 contributes 92 g of quantity
        let volume = nutrition(100.0, "ml", Some(0.92), 46.0);
        let mass = nutrition(100.0, "g", None, 1.0);
        let combined = sum(&[volume, mass]).unwrap();
        assert_eq!(combined.get(&NUTRITION_QUANTITY), Some(192.0));
        assert_eq!(combined.get(&NUTRITION_FAT), Some(47.0));
    }

    #[test]
    fn test_sum_keeps_unset_nutrients_absent() {
        let a = nutrition(100.0, "g", None, 5.0);
        let b = nutrition(100.0, "g", None, 5.0);
        let combined = sum(&[a, b]).unwrap();
        assert_eq!(combined.get(&NUTRITION_FAT), Some(10.0));
        assert_eq!(combined.get(&NUTRITION_SODIUM), None);
    }

    #[test]
    fn test_sum_associativity() {
        let rows = [
            nutrition(50.0, "g", None, 1.5),
            nutrition(25.0, "g", None, 2.25),
            nutrition(125.0, "g", None, 0.25),
        ];
        let left = sum(&[sum(&rows[..2]).unwrap(), rows[2].clone()]).unwrap();
        let right = sum(&[rows[0].clone(), sum(&rows[1..]).unwrap()]).unwrap();
        assert_eq!(left.get(&NUTRITION_FAT), right.get(&NUTRITION_FAT));
        assert_eq!(left.get(&NUTRITION_QUANTITY), Some(200.0));
    }

    #[test]
    fn test_rescale_rejects_zero_quantity() {
        let data = nutrition(0.0, "g", None, 10.0);
        assert!(rescale(&data, 100.0, QtyUnit::Grams).is_err());
    }

    #[test]
    fn test_meal_nutrition_end_to_end() {
        use crate::storage::SqliteDatabase;

        let db = SqliteDatabase::open_in_memory().unwrap();
        let category = Record::<FoodCategoryTable>::build(Provenance::New)
            .set(&CATEGORY_NAME, "oils".to_string())
            .build()
            .unwrap();
        db.insert_batch(&[category], false).unwrap();

        let stored_food = |index_name: &str, fat: f64, density: Option<f64>| {
            let food = Record::<FoodTable>::build(Provenance::New)
                .set(&FOOD_INDEX_NAME, index_name.to_string())
                .set(&FOOD_NAME, index_name.to_string())
                .set(&FOOD_CATEGORY, "oils".to_string())
                .build()
                .unwrap();
            let food_id = db.insert_one(&food, false).unwrap();
            let mut builder = Record::<NutritionDataTable>::build(Provenance::New)
                .set(&NUTRITION_FOOD_ID, food_id)
                .set(&NUTRITION_FAT, fat);
            if let Some(density) = density {
                builder = builder.set(&NUTRITION_DENSITY, density);
            }
            db.insert_one(&builder.build().unwrap(), false).unwrap();
            food_id
        };
        let oil = stored_food("olive_oil", 92.0, Some(0.92));
        let water = stored_food("water", 0.0, None);

        let meal = Record::<MealTable>::build(Provenance::New)
            .set(&MEAL_NAME, "dressing tasting".to_string())
            .set(&MEAL_DAY, "2024-05-01".to_string())
            .build()
            .unwrap();
        let meal_id = db.insert_one(&meal, false).unwrap();
        for food_id in [oil, water] {
            let portion = Record::<FoodPortionTable>::build(Provenance::New)
                .set(&PORTION_QUANTITY, 100.0)
                .set(&PORTION_FOOD_ID, food_id)
                .set(&PORTION_MEAL_ID, meal_id)
                .build()
                .unwrap();
            db.insert_one(&portion, false).unwrap();
        }

        let (meals, foods) = crate::assemble::meals_by_ids(&db, &[meal_id]).unwrap();
        let combined = meal_nutrition(&meals[&meal_id], &foods).unwrap();
        assert_eq!(combined.get(&NUTRITION_FAT), Some(92.0));
        assert_eq!(combined.get(&NUTRITION_QUANTITY), Some(200.0));
    }
}
