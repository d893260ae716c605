//! Menu aggregate and menu positions.

mod aggregate;
mod position;

pub use aggregate::{Menu, MenuCache, MenuProperty, MenuUpdate, NewMenu};
pub use position::{MealType, MenuMeal, MenuPosition, Weekday};
