//! Meal aggregate and its recipes.

mod aggregate;
mod recipe;

pub use aggregate::{Meal, MealCache, MealProperty, MealUpdate, NewMeal};
pub use recipe::{
    Ingredient, NewRecipe, Rating, RatingDimension, Recipe, RecipeCache, RecipeProperty,
    RecipeUpdate,
};
