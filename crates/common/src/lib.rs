//! Shared types for the menu planning workspace.
//!
//! - Opaque, string-backed identifiers for every aggregate and user
//! - [`Version`] used for optimistic concurrency

mod types;
mod version;

pub use types::{ClientId, MealId, MenuId, RecipeId, UserId};
pub use version::Version;
