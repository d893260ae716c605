//! Recipe entity, owned by exactly one meal.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{MealId, RecipeId, UserId};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheLedger, CachedProperty, Memo};
use crate::entity::{Entity, EntityBase};
use crate::error::{DomainError, Result};
use crate::nutrition::{MacroDivision, NutriFacts, calorie_density};
use crate::rules::{BusinessRule, check_rules};
use crate::tag::{Privacy, Tag};

/// Dimension a recipe is rated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingDimension {
    Taste,
    Convenience,
}

impl std::fmt::Display for RatingDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingDimension::Taste => write!(f, "Taste"),
            RatingDimension::Convenience => write!(f, "Convenience"),
        }
    }
}

/// One line of a recipe's ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub unit: Option<String>,
    pub quantity: Option<f64>,

    /// Zero-based order of the ingredient within the recipe.
    pub position: u32,

    /// The ingredient line as the author typed it.
    pub full_text: Option<String>,

    pub product_id: Option<String>,
}

impl Ingredient {
    /// Creates an ingredient with only a name and a position.
    pub fn new(name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            unit: None,
            quantity: None,
            position,
            full_text: None,
            product_id: None,
        }
    }

    /// Sets the measured amount.
    pub fn with_quantity(mut self, quantity: f64, unit: impl Into<String>) -> Self {
        self.quantity = Some(quantity);
        self.unit = Some(unit.into());
        self
    }
}

/// A user's rating of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub recipe_id: RecipeId,
    pub taste: i32,
    pub convenience: i32,
    pub comment: Option<String>,
}

impl Rating {
    /// Creates a rating, rejecting values outside the accepted range.
    pub fn new(
        user_id: impl Into<UserId>,
        recipe_id: impl Into<RecipeId>,
        taste: i32,
        convenience: i32,
        comment: Option<String>,
    ) -> Result<Self> {
        let rating = Self {
            user_id: user_id.into(),
            recipe_id: recipe_id.into(),
            taste,
            convenience,
            comment,
        };
        check_rules(rating.range_rules())?;
        Ok(rating)
    }

    /// Both dimensions must stay within `MIN_RATING..=MAX_RATING`.
    pub(crate) fn range_rules(&self) -> [BusinessRule; 2] {
        [
            BusinessRule::RatingMustBeInRange {
                dimension: RatingDimension::Taste,
                value: self.taste,
            },
            BusinessRule::RatingMustBeInRange {
                dimension: RatingDimension::Convenience,
                value: self.convenience,
            },
        ]
    }
}

/// Input for creating a recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub utensils: Option<String>,
    pub notes: Option<String>,
    pub total_time: Option<u32>,
    pub weight_in_grams: Option<f64>,
    pub privacy: Privacy,
    pub image_url: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub tags: BTreeSet<Tag>,
    pub nutri_facts: Option<NutriFacts>,
}

impl NewRecipe {
    /// Creates a recipe input with a name and everything else empty.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_ingredients(mut self, ingredients: Vec<Ingredient>) -> Self {
        self.ingredients = ingredients;
        self
    }

    pub fn with_nutri_facts(mut self, nutri_facts: NutriFacts) -> Self {
        self.nutri_facts = Some(nutri_facts);
        self
    }

    pub fn with_total_time(mut self, minutes: u32) -> Self {
        self.total_time = Some(minutes);
        self
    }

    pub fn with_weight_in_grams(mut self, grams: f64) -> Self {
        self.weight_in_grams = Some(grams);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }
}

/// Partial update of a recipe. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub utensils: Option<String>,
    pub notes: Option<String>,
    pub total_time: Option<u32>,
    pub weight_in_grams: Option<f64>,
    pub privacy: Option<Privacy>,
    pub image_url: Option<String>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub tags: Option<BTreeSet<Tag>>,
    pub nutri_facts: Option<NutriFacts>,
}

impl RecipeUpdate {
    /// Returns true if the update changes what a menu displays for the meal.
    pub fn touches_nutrition(&self) -> bool {
        self.nutri_facts.is_some()
    }

    fn rules(&self, root_author_id: &UserId) -> Vec<BusinessRule> {
        let mut rules = Vec::new();
        if let Some(ingredients) = &self.ingredients {
            rules.push(positions_rule(ingredients));
        }
        if let Some(tags) = &self.tags {
            rules.extend(tags.iter().map(|tag| BusinessRule::tag_author(tag, root_author_id)));
        }
        rules
    }

    fn invalidates(&self) -> Vec<RecipeProperty> {
        let mut properties = Vec::new();
        if self.nutri_facts.is_some() || self.weight_in_grams.is_some() {
            properties.extend([RecipeProperty::CalorieDensity, RecipeProperty::MacroDivision]);
        }
        if self.ingredients.is_some() {
            properties.push(RecipeProperty::IngredientNames);
        }
        properties
    }
}

/// Computed properties of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeProperty {
    AverageTasteRating,
    AverageConvenienceRating,
    CalorieDensity,
    MacroDivision,
    IngredientNames,
}

impl CachedProperty for RecipeProperty {
    const ALL: &'static [Self] = &[
        RecipeProperty::AverageTasteRating,
        RecipeProperty::AverageConvenienceRating,
        RecipeProperty::CalorieDensity,
        RecipeProperty::MacroDivision,
        RecipeProperty::IngredientNames,
    ];

    fn name(&self) -> &'static str {
        match self {
            RecipeProperty::AverageTasteRating => "average_taste_rating",
            RecipeProperty::AverageConvenienceRating => "average_convenience_rating",
            RecipeProperty::CalorieDensity => "calorie_density",
            RecipeProperty::MacroDivision => "macro_division",
            RecipeProperty::IngredientNames => "ingredient_names",
        }
    }
}

/// Cache ledger of a recipe.
#[derive(Debug, Clone, Default)]
pub struct RecipeCache {
    pub(crate) average_taste_rating: Memo<Option<f64>>,
    pub(crate) average_convenience_rating: Memo<Option<f64>>,
    pub(crate) calorie_density: Memo<Option<f64>>,
    pub(crate) macro_division: Memo<Option<MacroDivision>>,
    pub(crate) ingredient_names: Memo<Vec<String>>,
}

impl CacheLedger for RecipeCache {
    type Property = RecipeProperty;

    fn clear(&mut self, property: RecipeProperty) {
        match property {
            RecipeProperty::AverageTasteRating => self.average_taste_rating.clear(),
            RecipeProperty::AverageConvenienceRating => self.average_convenience_rating.clear(),
            RecipeProperty::CalorieDensity => self.calorie_density.clear(),
            RecipeProperty::MacroDivision => self.macro_division.clear(),
            RecipeProperty::IngredientNames => self.ingredient_names.clear(),
        }
    }

    fn is_computed(&self, property: RecipeProperty) -> bool {
        match property {
            RecipeProperty::AverageTasteRating => self.average_taste_rating.is_computed(),
            RecipeProperty::AverageConvenienceRating => {
                self.average_convenience_rating.is_computed()
            }
            RecipeProperty::CalorieDensity => self.calorie_density.is_computed(),
            RecipeProperty::MacroDivision => self.macro_division.is_computed(),
            RecipeProperty::IngredientNames => self.ingredient_names.is_computed(),
        }
    }
}

/// A recipe belonging to a meal.
///
/// Recipes are only mutated through their owning [`Meal`](super::Meal), so
/// every mutation here is crate-private.
#[derive(Debug, Clone)]
pub struct Recipe {
    id: RecipeId,
    meal_id: MealId,
    author_id: UserId,
    name: String,
    description: Option<String>,
    instructions: String,
    utensils: Option<String>,
    notes: Option<String>,
    total_time: Option<u32>,
    weight_in_grams: Option<f64>,
    privacy: Privacy,
    image_url: Option<String>,
    ingredients: Vec<Ingredient>,
    ratings: Vec<Rating>,
    tags: BTreeSet<Tag>,
    nutri_facts: Option<NutriFacts>,
    base: EntityBase,
    cache: RecipeCache,
}

impl Entity for Recipe {
    type Id = RecipeId;
    type Ledger = RecipeCache;

    const ENTITY_TYPE: &'static str = "Recipe";

    fn id(&self) -> &RecipeId {
        &self.id
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn ledger(&self) -> &RecipeCache {
        &self.cache
    }

    fn ledger_mut(&mut self) -> &mut RecipeCache {
        &mut self.cache
    }
}

fn positions_rule(ingredients: &[Ingredient]) -> BusinessRule {
    BusinessRule::PositionsAreConsecutiveFromZero {
        positions: ingredients.iter().map(|i| i.position).collect(),
    }
}

fn average(values: impl ExactSizeIterator<Item = i32>) -> Option<f64> {
    let count = values.len();
    if count == 0 {
        return None;
    }
    let total: i64 = values.map(i64::from).sum();
    Some(total as f64 / count as f64)
}

// Factory
impl Recipe {
    /// Creates a recipe for `meal_id`, authored by `author_id`.
    ///
    /// Fails if the ingredient positions are not `0..n` or a tag belongs to
    /// another author.
    pub fn create(
        meal_id: impl Into<MealId>,
        author_id: impl Into<UserId>,
        new: NewRecipe,
    ) -> Result<Self> {
        let meal_id = meal_id.into();
        let author_id = author_id.into();

        let mut rules = vec![positions_rule(&new.ingredients)];
        rules.extend(
            new.tags
                .iter()
                .map(|tag| BusinessRule::tag_author(tag, &author_id)),
        );
        check_rules(rules)?;

        Ok(Self {
            id: RecipeId::new(),
            meal_id,
            author_id,
            name: new.name,
            description: new.description,
            instructions: new.instructions,
            utensils: new.utensils,
            notes: new.notes,
            total_time: new.total_time,
            weight_in_grams: new.weight_in_grams,
            privacy: new.privacy,
            image_url: new.image_url,
            ingredients: new.ingredients,
            ratings: Vec::new(),
            tags: new.tags,
            nutri_facts: new.nutri_facts,
            base: EntityBase::new(),
            cache: RecipeCache::default(),
        })
    }

    /// Copies this recipe into another meal and author.
    ///
    /// The copy gets a fresh id, keeps no ratings and re-authors every tag.
    pub(crate) fn copy_for(&self, meal_id: MealId, author_id: UserId) -> Self {
        Self {
            id: RecipeId::new(),
            meal_id,
            tags: self
                .tags
                .iter()
                .map(|tag| tag.with_author(author_id.clone()))
                .collect(),
            author_id,
            ratings: Vec::new(),
            base: EntityBase::new(),
            cache: RecipeCache::default(),
            ..self.clone()
        }
    }
}

// Query methods
impl Recipe {
    pub fn meal_id(&self) -> &MealId {
        &self.meal_id
    }

    pub fn author_id(&self) -> &UserId {
        &self.author_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn utensils(&self) -> Option<&str> {
        self.utensils.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Preparation time in minutes.
    pub fn total_time(&self) -> Option<u32> {
        self.total_time
    }

    pub fn weight_in_grams(&self) -> Option<f64> {
        self.weight_in_grams
    }

    pub fn privacy(&self) -> Privacy {
        self.privacy
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Returns the rating left by `user_id`, if any.
    pub fn rating_by(&self, user_id: &UserId) -> Option<&Rating> {
        self.ratings.iter().find(|rating| &rating.user_id == user_id)
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    pub fn nutri_facts(&self) -> Option<&NutriFacts> {
        self.nutri_facts.as_ref()
    }

    /// Mean taste rating, `None` when nobody rated the recipe.
    pub fn average_taste_rating(&self) -> Option<f64> {
        *self
            .cache
            .average_taste_rating
            .get_or_compute(|| average(self.ratings.iter().map(|r| r.taste)))
    }

    /// Mean convenience rating, `None` when nobody rated the recipe.
    pub fn average_convenience_rating(&self) -> Option<f64> {
        *self
            .cache
            .average_convenience_rating
            .get_or_compute(|| average(self.ratings.iter().map(|r| r.convenience)))
    }

    /// Calories per 100 g.
    pub fn calorie_density(&self) -> Option<f64> {
        *self
            .cache
            .calorie_density
            .get_or_compute(|| calorie_density(self.nutri_facts.as_ref(), self.weight_in_grams))
    }

    pub fn macro_division(&self) -> Option<MacroDivision> {
        *self
            .cache
            .macro_division
            .get_or_compute(|| self.nutri_facts.as_ref().and_then(NutriFacts::macro_division))
    }

    /// Ingredient names ordered by position.
    pub fn ingredient_names(&self) -> Arc<Vec<String>> {
        self.cache.ingredient_names.get_or_compute(|| {
            let mut ingredients: Vec<&Ingredient> = self.ingredients.iter().collect();
            ingredients.sort_by_key(|ingredient| ingredient.position);
            ingredients.into_iter().map(|i| i.name.clone()).collect()
        })
    }
}

// Command methods, reached through the owning meal
impl Recipe {
    /// Returns the rule tying this recipe to `meal_id` / `meal_author_id`.
    pub(crate) fn belongs_to(&self, meal_id: &MealId, meal_author_id: &UserId) -> BusinessRule {
        BusinessRule::RecipeMustBelongToMeal {
            recipe_id: self.id.clone(),
            recipe_meal_id: self.meal_id.clone(),
            recipe_author_id: self.author_id.clone(),
            meal_id: meal_id.clone(),
            meal_author_id: meal_author_id.clone(),
        }
    }

    pub(crate) fn update(&mut self, update: RecipeUpdate, root_author_id: &UserId) -> Result<()> {
        let rules = update.rules(root_author_id);
        let invalidates = update.invalidates();
        self.mutate(rules, &invalidates, |recipe| {
            let RecipeUpdate {
                name,
                description,
                instructions,
                utensils,
                notes,
                total_time,
                weight_in_grams,
                privacy,
                image_url,
                ingredients,
                tags,
                nutri_facts,
            } = update;

            if let Some(name) = name {
                recipe.name = name;
            }
            if let Some(description) = description {
                recipe.description = Some(description);
            }
            if let Some(instructions) = instructions {
                recipe.instructions = instructions;
            }
            if let Some(utensils) = utensils {
                recipe.utensils = Some(utensils);
            }
            if let Some(notes) = notes {
                recipe.notes = Some(notes);
            }
            if let Some(total_time) = total_time {
                recipe.total_time = Some(total_time);
            }
            if let Some(weight) = weight_in_grams {
                recipe.weight_in_grams = Some(weight);
            }
            if let Some(privacy) = privacy {
                recipe.privacy = privacy;
            }
            if let Some(image_url) = image_url {
                recipe.image_url = Some(image_url);
            }
            if let Some(ingredients) = ingredients {
                recipe.ingredients = ingredients;
            }
            if let Some(tags) = tags {
                recipe.tags = tags;
            }
            if let Some(nutri_facts) = nutri_facts {
                recipe.nutri_facts = Some(nutri_facts);
            }
        })
    }

    /// Adds or replaces the rating of `rating.user_id`.
    pub(crate) fn rate(&mut self, rating: Rating) -> Result<()> {
        self.mutate(
            rating.range_rules(),
            &[
                RecipeProperty::AverageTasteRating,
                RecipeProperty::AverageConvenienceRating,
            ],
            |recipe| {
                recipe.ratings.retain(|r| r.user_id != rating.user_id);
                recipe.ratings.push(rating);
            },
        )
    }

    pub(crate) fn delete_rating(&mut self, user_id: &UserId) -> Result<()> {
        self.ensure_active()?;
        if self.rating_by(user_id).is_none() {
            return Err(DomainError::not_found("Rating", user_id));
        }
        self.mutate(
            [],
            &[
                RecipeProperty::AverageTasteRating,
                RecipeProperty::AverageConvenienceRating,
            ],
            |recipe| recipe.ratings.retain(|r| &r.user_id != user_id),
        )
    }

    pub(crate) fn discard(&mut self) -> Result<()> {
        self.mutate([], RecipeProperty::ALL, |recipe| recipe.base.discard())
    }
}
