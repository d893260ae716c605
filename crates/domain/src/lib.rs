//! Domain layer of the meal planning backend.
//!
//! This crate provides:
//! - A per-instance cache ledger for computed properties ([`cache`])
//! - Business rules and the `check_rule` gate ([`rules`])
//! - The entity/aggregate base with versioning, discard and an event queue
//! - The Meal, Recipe, Menu and Client aggregates
//! - Domain events used for cross-aggregate consistency
//!
//! Every mutation follows the same protocol: reject if discarded, check
//! rules, change state, invalidate caches, bump the version, record events.

pub mod cache;
pub mod client;
pub mod entity;
pub mod error;
pub mod events;
pub mod meal;
pub mod menu;
pub mod nutrition;
pub mod rules;
pub mod tag;

pub use cache::{CacheLedger, CachedProperty, Memo};
pub use client::{Address, Client, ClientUpdate, ContactInfo, NewClient, NewClientMenu, Profile};
pub use entity::{Aggregate, Entity, EntityBase, Lifecycle};
pub use error::{DomainError, Result};
pub use events::{DomainEvent, Event};
pub use meal::{
    Ingredient, Meal, MealUpdate, NewMeal, NewRecipe, Rating, RatingDimension, Recipe,
    RecipeUpdate,
};
pub use menu::{MealType, Menu, MenuMeal, MenuPosition, MenuUpdate, NewMenu, Weekday};
pub use nutrition::{MacroDivision, NutriFacts};
pub use rules::{BusinessRule, BusinessRuleViolation, RuleKind, check_rule, check_rules};
pub use tag::{Privacy, Role, Tag, TagType, User};
