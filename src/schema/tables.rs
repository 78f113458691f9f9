//! Singleton table definitions for the food log data model
//!
//! Seven entity kinds:
//! - `food_category`: named grouping, referenced by foods by name
//! - `food`: a basic or composite food, keyed naturally by `index_name`
//! - `serving`: a named amount of one food ("1 cup", "1 slice")
//! - `nutrition_data`: per-food nutrient amounts for a reference quantity
//! - `meal`: a named meal on a day
//! - `food_portion`: an amount of one food eaten as part of a meal
//! - `ingredient`: an amount of one food contained in a composite food
//!
//! Column `index` fields must match the position in the table's column list;
//! the tests at the bottom enforce that for every table.

use super::column::{AnyColumn, Column, ColumnType, DefaultRule, Table};

// ========== food_category ==========

/// Marker type for the `food_category` table
pub struct FoodCategoryTable;

pub static CATEGORY_ID: Column<FoodCategoryTable, i64> = Column::id("id", 0);
pub static CATEGORY_CREATED_AT: Column<FoodCategoryTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static CATEGORY_MODIFIED_AT: Column<FoodCategoryTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
pub static CATEGORY_NAME: Column<FoodCategoryTable, String> =
    Column::new("name", 3, ColumnType::Text);

static CATEGORY_COLUMNS: [&dyn AnyColumn<FoodCategoryTable>; 4] =
    [&CATEGORY_ID, &CATEGORY_CREATED_AT, &CATEGORY_MODIFIED_AT, &CATEGORY_NAME];

impl Table for FoodCategoryTable {
    const NAME: &'static str = "food_category";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &CATEGORY_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &CATEGORY_ID
    }

    fn natural_key() -> Option<&'static dyn AnyColumn<Self>> {
        Some(&CATEGORY_NAME)
    }
}

// ========== food ==========

/// Marker type for the `food` table
pub struct FoodTable;

pub static FOOD_ID: Column<FoodTable, i64> = Column::id("id", 0);
pub static FOOD_CREATED_AT: Column<FoodTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static FOOD_MODIFIED_AT: Column<FoodTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
/// Human-readable unique key, used to reference foods before their id is known
pub static FOOD_INDEX_NAME: Column<FoodTable, String> =
    Column::new("index_name", 3, ColumnType::Text);
pub static FOOD_NAME: Column<FoodTable, String> = Column::new("name", 4, ColumnType::Text);
pub static FOOD_BRAND: Column<FoodTable, String> =
    Column::new("brand", 5, ColumnType::Text).nullable();
pub static FOOD_VARIETY: Column<FoodTable, String> =
    Column::new("variety", 6, ColumnType::Text).nullable();
pub static FOOD_NOTES: Column<FoodTable, String> =
    Column::new("notes", 7, ColumnType::Text).nullable();
/// Category reference; the stored value is the category's natural key itself
pub static FOOD_CATEGORY: Column<FoodTable, String> =
    Column::new("category", 8, ColumnType::Text).references("food_category", "name");
pub static FOOD_TYPE: Column<FoodTable, String> =
    Column::new("food_type", 9, ColumnType::Text).with_default(DefaultRule::Text("primary"));
pub static FOOD_USDA_INDEX: Column<FoodTable, i64> =
    Column::new("usda_index", 10, ColumnType::Integer).nullable();

static FOOD_COLUMNS: [&dyn AnyColumn<FoodTable>; 11] = [
    &FOOD_ID,
    &FOOD_CREATED_AT,
    &FOOD_MODIFIED_AT,
    &FOOD_INDEX_NAME,
    &FOOD_NAME,
    &FOOD_BRAND,
    &FOOD_VARIETY,
    &FOOD_NOTES,
    &FOOD_CATEGORY,
    &FOOD_TYPE,
    &FOOD_USDA_INDEX,
];

impl Table for FoodTable {
    const NAME: &'static str = "food";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &FOOD_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &FOOD_ID
    }

    fn natural_key() -> Option<&'static dyn AnyColumn<Self>> {
        Some(&FOOD_INDEX_NAME)
    }
}

// ========== serving ==========

/// Marker type for the `serving` table
pub struct ServingTable;

pub static SERVING_ID: Column<ServingTable, i64> = Column::id("id", 0);
pub static SERVING_CREATED_AT: Column<ServingTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static SERVING_MODIFIED_AT: Column<ServingTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
pub static SERVING_NAME: Column<ServingTable, String> = Column::new("name", 3, ColumnType::Text);
pub static SERVING_QUANTITY: Column<ServingTable, f64> =
    Column::new("quantity", 4, ColumnType::Real);
pub static SERVING_QUANTITY_UNIT: Column<ServingTable, String> =
    Column::new("quantity_unit", 5, ColumnType::Text).with_default(DefaultRule::Text("g"));
pub static SERVING_IS_DEFAULT: Column<ServingTable, bool> =
    Column::new("is_default", 6, ColumnType::Boolean).with_default(DefaultRule::Bool(false));
pub static SERVING_FOOD_ID: Column<ServingTable, i64> =
    Column::new("food_id", 7, ColumnType::Integer).references_cascade("food", "id");

static SERVING_COLUMNS: [&dyn AnyColumn<ServingTable>; 8] = [
    &SERVING_ID,
    &SERVING_CREATED_AT,
    &SERVING_MODIFIED_AT,
    &SERVING_NAME,
    &SERVING_QUANTITY,
    &SERVING_QUANTITY_UNIT,
    &SERVING_IS_DEFAULT,
    &SERVING_FOOD_ID,
];

impl Table for ServingTable {
    const NAME: &'static str = "serving";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &SERVING_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &SERVING_ID
    }
}

// ========== nutrition_data ==========

/// Marker type for the `nutrition_data` table
pub struct NutritionDataTable;

pub static NUTRITION_ID: Column<NutritionDataTable, i64> = Column::id("id", 0);
pub static NUTRITION_CREATED_AT: Column<NutritionDataTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static NUTRITION_MODIFIED_AT: Column<NutritionDataTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
/// Nullable so that derived totals (sums, composite foods) can exist as
/// records without belonging to a stored food row
pub static NUTRITION_FOOD_ID: Column<NutritionDataTable, i64> =
    Column::new("food_id", 3, ColumnType::Integer)
        .nullable()
        .references_cascade("food", "id");
pub static NUTRITION_DATA_SOURCE: Column<NutritionDataTable, String> =
    Column::new("data_source", 4, ColumnType::Text).nullable();
/// Grams per millilitre, for volume/mass conversion
pub static NUTRITION_DENSITY: Column<NutritionDataTable, f64> =
    Column::new("density", 5, ColumnType::Real).nullable();
/// Reference quantity the nutrient amounts are expressed for
pub static NUTRITION_QUANTITY: Column<NutritionDataTable, f64> =
    Column::new("quantity", 6, ColumnType::Real).with_default(DefaultRule::Real(100.0));
pub static NUTRITION_QUANTITY_UNIT: Column<NutritionDataTable, String> =
    Column::new("quantity_unit", 7, ColumnType::Text).with_default(DefaultRule::Text("g"));
pub static NUTRITION_KILOJOULES: Column<NutritionDataTable, f64> =
    Column::new("kilojoules", 8, ColumnType::Real).nullable();
pub static NUTRITION_CALORIES: Column<NutritionDataTable, f64> =
    Column::new("calories", 9, ColumnType::Real).nullable();
pub static NUTRITION_PROTEIN: Column<NutritionDataTable, f64> =
    Column::new("protein", 10, ColumnType::Real).nullable();
pub static NUTRITION_FAT: Column<NutritionDataTable, f64> =
    Column::new("fat", 11, ColumnType::Real).nullable();
pub static NUTRITION_SATURATED_FAT: Column<NutritionDataTable, f64> =
    Column::new("saturated_fat", 12, ColumnType::Real).nullable();
pub static NUTRITION_CARBOHYDRATE: Column<NutritionDataTable, f64> =
    Column::new("carbohydrate", 13, ColumnType::Real).nullable();
pub static NUTRITION_SUGAR: Column<NutritionDataTable, f64> =
    Column::new("sugar", 14, ColumnType::Real).nullable();
pub static NUTRITION_FIBRE: Column<NutritionDataTable, f64> =
    Column::new("fibre", 15, ColumnType::Real).nullable();
pub static NUTRITION_SODIUM: Column<NutritionDataTable, f64> =
    Column::new("sodium", 16, ColumnType::Real).nullable();

static NUTRITION_COLUMNS: [&dyn AnyColumn<NutritionDataTable>; 17] = [
    &NUTRITION_ID,
    &NUTRITION_CREATED_AT,
    &NUTRITION_MODIFIED_AT,
    &NUTRITION_FOOD_ID,
    &NUTRITION_DATA_SOURCE,
    &NUTRITION_DENSITY,
    &NUTRITION_QUANTITY,
    &NUTRITION_QUANTITY_UNIT,
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

impl Table for NutritionDataTable {
    const NAME: &'static str = "nutrition_data";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &NUTRITION_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &NUTRITION_ID
    }
}

// ========== meal ==========

/// Marker type for the `meal` table
pub struct MealTable;

pub static MEAL_ID: Column<MealTable, i64> = Column::id("id", 0);
pub static MEAL_CREATED_AT: Column<MealTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static MEAL_MODIFIED_AT: Column<MealTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
pub static MEAL_NAME: Column<MealTable, String> = Column::new("name", 3, ColumnType::Text);
pub static MEAL_DAY: Column<MealTable, String> = Column::new("day", 4, ColumnType::Date);

static MEAL_COLUMNS: [&dyn AnyColumn<MealTable>; 5] =
    [&MEAL_ID, &MEAL_CREATED_AT, &MEAL_MODIFIED_AT, &MEAL_NAME, &MEAL_DAY];

impl Table for MealTable {
    const NAME: &'static str = "meal";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &MEAL_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &MEAL_ID
    }
}

// ========== food_portion ==========

/// Marker type for the `food_portion` table
pub struct FoodPortionTable;

pub static PORTION_ID: Column<FoodPortionTable, i64> = Column::id("id", 0);
pub static PORTION_CREATED_AT: Column<FoodPortionTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static PORTION_MODIFIED_AT: Column<FoodPortionTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
/// Amount eaten; servings of the referenced serving when `serving_id` is set,
/// otherwise in `quantity_unit`
pub static PORTION_QUANTITY: Column<FoodPortionTable, f64> =
    Column::new("quantity", 3, ColumnType::Real);
pub static PORTION_QUANTITY_UNIT: Column<FoodPortionTable, String> =
    Column::new("quantity_unit", 4, ColumnType::Text).with_default(DefaultRule::Text("g"));
pub static PORTION_FOOD_ID: Column<FoodPortionTable, i64> =
    Column::new("food_id", 5, ColumnType::Integer).references("food", "id");
pub static PORTION_SERVING_ID: Column<FoodPortionTable, i64> =
    Column::new("serving_id", 6, ColumnType::Integer)
        .nullable()
        .references("serving", "id");
pub static PORTION_MEAL_ID: Column<FoodPortionTable, i64> =
    Column::new("meal_id", 7, ColumnType::Integer).references_cascade("meal", "id");
pub static PORTION_NOTES: Column<FoodPortionTable, String> =
    Column::new("notes", 8, ColumnType::Text).nullable();

static PORTION_COLUMNS: [&dyn AnyColumn<FoodPortionTable>; 9] = [
    &PORTION_ID,
    &PORTION_CREATED_AT,
    &PORTION_MODIFIED_AT,
    &PORTION_QUANTITY,
    &PORTION_QUANTITY_UNIT,
    &PORTION_FOOD_ID,
    &PORTION_SERVING_ID,
    &PORTION_MEAL_ID,
    &PORTION_NOTES,
];

impl Table for FoodPortionTable {
    const NAME: &'static str = "food_portion";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &PORTION_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &PORTION_ID
    }
}

// ========== ingredient ==========

/// Marker type for the `ingredient` table
pub struct IngredientTable;

pub static INGREDIENT_ID: Column<IngredientTable, i64> = Column::id("id", 0);
pub static INGREDIENT_CREATED_AT: Column<IngredientTable, i64> =
    Column::new("created_at", 1, ColumnType::Timestamp)
        .read_only()
        .with_default(DefaultRule::CurrentTime);
pub static INGREDIENT_MODIFIED_AT: Column<IngredientTable, i64> =
    Column::new("modified_at", 2, ColumnType::Timestamp).with_default(DefaultRule::CurrentTime);
/// The composite food this ingredient belongs to
pub static INGREDIENT_COMPOSITE_FOOD_ID: Column<IngredientTable, i64> =
    Column::new("composite_food_id", 3, ColumnType::Integer).references_cascade("food", "id");
/// The food this ingredient is an amount of
pub static INGREDIENT_FOOD_ID: Column<IngredientTable, i64> =
    Column::new("food_id", 4, ColumnType::Integer).references("food", "id");
pub static INGREDIENT_QUANTITY: Column<IngredientTable, f64> =
    Column::new("quantity", 5, ColumnType::Real);
pub static INGREDIENT_QUANTITY_UNIT: Column<IngredientTable, String> =
    Column::new("quantity_unit", 6, ColumnType::Text).with_default(DefaultRule::Text("g"));
pub static INGREDIENT_SERVING_ID: Column<IngredientTable, i64> =
    Column::new("serving_id", 7, ColumnType::Integer)
        .nullable()
        .references("serving", "id");
pub static INGREDIENT_NOTES: Column<IngredientTable, String> =
    Column::new("notes", 8, ColumnType::Text).nullable();

static INGREDIENT_COLUMNS: [&dyn AnyColumn<IngredientTable>; 9] = [
    &INGREDIENT_ID,
    &INGREDIENT_CREATED_AT,
    &INGREDIENT_MODIFIED_AT,
    &INGREDIENT_COMPOSITE_FOOD_ID,
    &INGREDIENT_FOOD_ID,
    &INGREDIENT_QUANTITY,
    &INGREDIENT_QUANTITY_UNIT,
    &INGREDIENT_SERVING_ID,
    &INGREDIENT_NOTES,
];

impl Table for IngredientTable {
    const NAME: &'static str = "ingredient";

    fn columns() -> &'static [&'static dyn AnyColumn<Self>] {
        &INGREDIENT_COLUMNS
    }

    fn id_column() -> &'static Column<Self, i64> {
        &INGREDIENT_ID
    }
}
