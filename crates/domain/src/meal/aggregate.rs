//! Meal aggregate implementation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use common::{MealId, MenuId, RecipeId, UserId};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheLedger, CachedProperty, Memo};
use crate::entity::{Aggregate, Entity, EntityBase};
use crate::error::{DomainError, Result};
use crate::events::Event;
use crate::nutrition::{MacroDivision, NutriFacts, calorie_density};
use crate::rules::{BusinessRule, check_rules};
use crate::tag::{Tag, User};

use super::recipe::{NewRecipe, Rating, Recipe, RecipeUpdate};

/// Input for creating a meal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMeal {
    /// Identifier to use; a fresh one is generated when absent.
    pub id: Option<MealId>,
    pub name: String,
    pub author_id: UserId,
    pub menu_id: Option<MenuId>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub like: Option<bool>,
    pub image_url: Option<String>,
    pub tags: BTreeSet<Tag>,
    pub recipes: Vec<NewRecipe>,
}

impl NewMeal {
    pub fn new(name: impl Into<String>, author_id: impl Into<UserId>) -> Self {
        Self {
            name: name.into(),
            author_id: author_id.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<MealId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_menu(mut self, menu_id: impl Into<MenuId>) -> Self {
        self.menu_id = Some(menu_id.into());
        self
    }

    pub fn with_recipe(mut self, recipe: NewRecipe) -> Self {
        self.recipes.push(recipe);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }
}

/// Partial update of a meal's own attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub like: Option<bool>,
    pub image_url: Option<String>,
}

/// Computed properties of a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MealProperty {
    NutriFacts,
    TotalTime,
    WeightInGrams,
    CalorieDensity,
    MacroDivision,
    RecipeIndex,
}

impl CachedProperty for MealProperty {
    const ALL: &'static [Self] = &[
        MealProperty::NutriFacts,
        MealProperty::TotalTime,
        MealProperty::WeightInGrams,
        MealProperty::CalorieDensity,
        MealProperty::MacroDivision,
        MealProperty::RecipeIndex,
    ];

    fn name(&self) -> &'static str {
        match self {
            MealProperty::NutriFacts => "nutri_facts",
            MealProperty::TotalTime => "total_time",
            MealProperty::WeightInGrams => "weight_in_grams",
            MealProperty::CalorieDensity => "calorie_density",
            MealProperty::MacroDivision => "macro_division",
            MealProperty::RecipeIndex => "recipe_index",
        }
    }
}

/// Cache ledger of a meal.
#[derive(Debug, Clone, Default)]
pub struct MealCache {
    pub(crate) nutri_facts: Memo<Option<NutriFacts>>,
    pub(crate) total_time: Memo<Option<u32>>,
    pub(crate) weight_in_grams: Memo<Option<f64>>,
    pub(crate) calorie_density: Memo<Option<f64>>,
    pub(crate) macro_division: Memo<Option<MacroDivision>>,
    pub(crate) recipe_index: Memo<HashMap<RecipeId, usize>>,
}

impl CacheLedger for MealCache {
    type Property = MealProperty;

    fn clear(&mut self, property: MealProperty) {
        match property {
            MealProperty::NutriFacts => self.nutri_facts.clear(),
            MealProperty::TotalTime => self.total_time.clear(),
            MealProperty::WeightInGrams => self.weight_in_grams.clear(),
            MealProperty::CalorieDensity => self.calorie_density.clear(),
            MealProperty::MacroDivision => self.macro_division.clear(),
            MealProperty::RecipeIndex => self.recipe_index.clear(),
        }
    }

    fn is_computed(&self, property: MealProperty) -> bool {
        match property {
            MealProperty::NutriFacts => self.nutri_facts.is_computed(),
            MealProperty::TotalTime => self.total_time.is_computed(),
            MealProperty::WeightInGrams => self.weight_in_grams.is_computed(),
            MealProperty::CalorieDensity => self.calorie_density.is_computed(),
            MealProperty::MacroDivision => self.macro_division.is_computed(),
            MealProperty::RecipeIndex => self.recipe_index.is_computed(),
        }
    }
}

/// Meal aggregate root.
///
/// Owns its recipes and tags. The menu it appears on is a weak reference: a
/// meal never calls into its menu, it records a [`Event::MealUpdatedOnMenu`]
/// or [`Event::MealDeleted`] and lets a handler do the rest.
#[derive(Debug, Clone)]
pub struct Meal {
    id: MealId,
    name: String,
    author_id: UserId,
    menu_id: Option<MenuId>,
    description: Option<String>,
    notes: Option<String>,
    like: Option<bool>,
    image_url: Option<String>,

    /// Every recipe ever added, discarded ones included.
    recipes: Vec<Recipe>,

    tags: BTreeSet<Tag>,
    base: EntityBase,
    cache: MealCache,
}

impl Entity for Meal {
    type Id = MealId;
    type Ledger = MealCache;

    const ENTITY_TYPE: &'static str = "Meal";

    fn id(&self) -> &MealId {
        &self.id
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn ledger(&self) -> &MealCache {
        &self.cache
    }

    fn ledger_mut(&mut self) -> &mut MealCache {
        &mut self.cache
    }
}

impl Aggregate for Meal {
    fn author_id(&self) -> &UserId {
        &self.author_id
    }

    fn collect_events(&mut self) -> Vec<Event> {
        let mut events = self.base.take_events();
        for recipe in &mut self.recipes {
            events.extend(recipe.base_mut().take_events());
        }
        events
    }

    fn has_pending_events(&self) -> bool {
        self.base.pending_events().next().is_some()
            || self
                .recipes
                .iter()
                .any(|recipe| recipe.base().pending_events().next().is_some())
    }
}

// Factories
impl Meal {
    /// Creates a meal and its initial recipes.
    ///
    /// A meal created directly on a menu announces itself with a
    /// `MealUpdatedOnMenu` event.
    pub fn create(new: NewMeal) -> Result<Self> {
        let NewMeal {
            id,
            name,
            author_id,
            menu_id,
            description,
            notes,
            like,
            image_url,
            tags,
            recipes,
        } = new;
        let id = id.unwrap_or_default();

        check_rules(tags.iter().map(|tag| BusinessRule::tag_author(tag, &author_id)))?;
        let recipes = recipes
            .into_iter()
            .map(|recipe| Recipe::create(id.clone(), author_id.clone(), recipe))
            .collect::<Result<Vec<_>>>()?;

        let mut meal = Self {
            id,
            name,
            author_id,
            menu_id,
            description,
            notes,
            like,
            image_url,
            recipes,
            tags,
            base: EntityBase::new(),
            cache: MealCache::default(),
        };
        meal.notify_menu("meal created");

        tracing::debug!(meal_id = %meal.id, author_id = %meal.author_id, "meal created");
        Ok(meal)
    }

    /// Copies `source` for `author_id`, optionally straight onto a menu.
    ///
    /// Every id is fresh, ratings stay behind and tags are re-authored.
    pub fn copy_for(source: &Meal, author_id: impl Into<UserId>, menu_id: Option<MenuId>) -> Self {
        let author_id = author_id.into();
        let id = MealId::new();

        let mut meal = Self {
            recipes: source
                .recipes()
                .map(|recipe| recipe.copy_for(id.clone(), author_id.clone()))
                .collect(),
            tags: source
                .tags
                .iter()
                .map(|tag| tag.with_author(author_id.clone()))
                .collect(),
            id,
            author_id,
            menu_id,
            base: EntityBase::new(),
            cache: MealCache::default(),
            ..source.clone()
        };
        meal.notify_menu("meal copied");

        tracing::debug!(source_id = %source.id, meal_id = %meal.id, "meal copied");
        meal
    }
}

// Query methods
impl Meal {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the menu this meal is shown on, if any.
    pub fn menu_id(&self) -> Option<&MenuId> {
        self.menu_id.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn like(&self) -> Option<bool> {
        self.like
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    /// Returns the active recipes in insertion order.
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter().filter(|recipe| !recipe.is_discarded())
    }

    /// Returns an active recipe by id.
    pub fn recipe(&self, recipe_id: &RecipeId) -> Option<&Recipe> {
        self.recipe_index()
            .get(recipe_id)
            .map(|&slot| &self.recipes[slot])
    }

    /// Sum of the nutrition facts of every active recipe that has them.
    pub fn nutri_facts(&self) -> Option<NutriFacts> {
        *self.cache.nutri_facts.get_or_compute(|| {
            NutriFacts::sum_present(self.recipes().map(|recipe| recipe.nutri_facts()))
        })
    }

    /// Sum of the active recipes' times, in minutes.
    pub fn total_time(&self) -> Option<u32> {
        *self.cache.total_time.get_or_compute(|| {
            self.recipes()
                .filter_map(Recipe::total_time)
                .fold(None, |total, minutes| Some(total.unwrap_or(0) + minutes))
        })
    }

    pub fn weight_in_grams(&self) -> Option<f64> {
        *self.cache.weight_in_grams.get_or_compute(|| {
            self.recipes()
                .filter_map(Recipe::weight_in_grams)
                .fold(None, |total, grams| Some(total.unwrap_or(0.0) + grams))
        })
    }

    /// Calories per 100 g of the whole meal.
    pub fn calorie_density(&self) -> Option<f64> {
        *self.cache.calorie_density.get_or_compute(|| {
            calorie_density(self.nutri_facts().as_ref(), self.weight_in_grams())
        })
    }

    pub fn macro_division(&self) -> Option<MacroDivision> {
        *self
            .cache
            .macro_division
            .get_or_compute(|| self.nutri_facts().and_then(|facts| facts.macro_division()))
    }

    /// Lookup from recipe id to its slot among the owned recipes.
    pub fn recipe_index(&self) -> Arc<HashMap<RecipeId, usize>> {
        self.cache.recipe_index.get_or_compute(|| {
            self.recipes
                .iter()
                .enumerate()
                .filter(|(_, recipe)| !recipe.is_discarded())
                .map(|(slot, recipe)| (recipe.id().clone(), slot))
                .collect()
        })
    }
}

// Command methods
impl Meal {
    /// Updates the meal's own attributes.
    pub fn update_properties(&mut self, update: MealUpdate) -> Result<()> {
        let renamed = update.name.as_ref().is_some_and(|name| name != &self.name);

        self.mutate([], &[], |meal| {
            let MealUpdate {
                name,
                description,
                notes,
                like,
                image_url,
            } = update;

            if let Some(name) = name {
                meal.name = name;
            }
            if let Some(description) = description {
                meal.description = Some(description);
            }
            if let Some(notes) = notes {
                meal.notes = Some(notes);
            }
            if let Some(like) = like {
                meal.like = Some(like);
            }
            if let Some(image_url) = image_url {
                meal.image_url = Some(image_url);
            }
        })?;

        if renamed {
            self.notify_menu("name changed");
        }
        Ok(())
    }

    /// Points the meal at a menu, or detaches it with `None`.
    ///
    /// Returns `false` when the meal already had that menu. Detaching records
    /// no event.
    pub fn set_menu(&mut self, menu_id: Option<MenuId>) -> Result<bool> {
        self.ensure_active()?;
        if self.menu_id == menu_id {
            return Ok(false);
        }

        self.mutate([], &[], |meal| meal.menu_id = menu_id)?;
        self.notify_menu("meal attached to menu");
        Ok(true)
    }

    /// Adds a recipe built for this meal.
    pub fn add_recipe(&mut self, recipe: Recipe) -> Result<()> {
        let mut rules = vec![recipe.belongs_to(&self.id, &self.author_id)];
        rules.extend(
            recipe
                .tags()
                .iter()
                .map(|tag| BusinessRule::tag_author(tag, &self.author_id)),
        );

        self.mutate(rules, MealProperty::ALL, |meal| meal.recipes.push(recipe))?;
        self.notify_menu("recipe added");
        Ok(())
    }

    /// Updates one of the meal's recipes.
    ///
    /// Every rule of the update is checked before either the recipe or the
    /// meal changes.
    pub fn update_recipe(&mut self, recipe_id: &RecipeId, update: RecipeUpdate) -> Result<()> {
        self.ensure_active()?;
        let slot = self.recipe_slot(recipe_id)?;
        let touches_nutrition = update.touches_nutrition();

        let author_id = self.author_id.clone();
        self.recipes[slot].update(update, &author_id)?;
        self.mutate([], MealProperty::ALL, |_| ())?;

        if touches_nutrition {
            self.notify_menu("recipe nutrition changed");
        }
        Ok(())
    }

    /// Discards one of the meal's recipes.
    pub fn remove_recipe(&mut self, recipe_id: &RecipeId) -> Result<()> {
        self.ensure_active()?;
        let slot = self.recipe_slot(recipe_id)?;

        self.recipes[slot].discard()?;
        self.mutate([], MealProperty::ALL, |_| ())?;
        self.notify_menu("recipe removed");
        Ok(())
    }

    /// Adds or replaces a user's rating of one of the meal's recipes.
    pub fn rate_recipe(&mut self, rating: Rating) -> Result<()> {
        self.ensure_active()?;
        let slot = self.recipe_slot(&rating.recipe_id)?;

        self.recipes[slot].rate(rating)?;
        self.mutate([], &[], |_| ())
    }

    /// Removes a user's rating from one of the meal's recipes.
    pub fn delete_recipe_rating(&mut self, recipe_id: &RecipeId, user_id: &UserId) -> Result<()> {
        self.ensure_active()?;
        let slot = self.recipe_slot(recipe_id)?;

        self.recipes[slot].delete_rating(user_id)?;
        self.mutate([], &[], |_| ())
    }

    /// Tags the meal on behalf of `user`.
    pub fn add_tag(&mut self, tag: Tag, user: &User) -> Result<()> {
        let rules = [
            BusinessRule::tag_author(&tag, &self.author_id),
            BusinessRule::public_tag(&tag, user),
        ];
        self.mutate(rules, &[], |meal| {
            meal.tags.insert(tag);
        })
    }

    /// Removes a tag; returns `false` if the meal did not carry it.
    pub fn remove_tag(&mut self, tag: &Tag) -> Result<bool> {
        self.ensure_active()?;
        if !self.tags.contains(tag) {
            return Ok(false);
        }
        self.mutate([], &[], |meal| meal.tags.remove(tag))
    }

    /// Discards the meal and all of its recipes.
    ///
    /// A meal shown on a menu records a `MealDeleted` event for that menu.
    pub fn discard(&mut self) -> Result<()> {
        self.ensure_active()?;
        for recipe in self.recipes.iter_mut().filter(|recipe| !recipe.is_discarded()) {
            recipe.discard()?;
        }

        self.mutate([], MealProperty::ALL, |meal| meal.base.discard())?;
        if let Some(menu_id) = self.menu_id.clone() {
            self.base.record(Event::meal_deleted(menu_id, self.id.clone()));
        }

        tracing::debug!(meal_id = %self.id, "meal discarded");
        Ok(())
    }
}

impl Meal {
    fn recipe_slot(&self, recipe_id: &RecipeId) -> Result<usize> {
        self.recipe_index()
            .get(recipe_id)
            .copied()
            .ok_or_else(|| DomainError::not_found(Recipe::ENTITY_TYPE, recipe_id))
    }

    fn notify_menu(&mut self, message: &str) {
        if let Some(menu_id) = self.menu_id.clone() {
            self.base.record(Event::meal_updated_on_menu(
                menu_id,
                self.id.clone(),
                message,
            ));
        }
    }
}
