//! Menu aggregate implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use common::{ClientId, MealId, MenuId, UserId};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheLedger, CachedProperty, Memo};
use crate::entity::{Aggregate, Entity, EntityBase};
use crate::error::Result;
use crate::events::Event;
use crate::nutrition::NutriFacts;
use crate::rules::{BusinessRule, check_rules};
use crate::tag::{Tag, User};

use super::{MealType, MenuMeal, MenuPosition, Weekday};

/// Input for creating a menu.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMenu {
    /// Identifier to use; a fresh one is generated when absent.
    pub id: Option<MenuId>,
    pub author_id: UserId,
    pub client_id: ClientId,
    pub description: Option<String>,
    pub tags: BTreeSet<Tag>,
    pub meals: Vec<MenuMeal>,
}

impl NewMenu {
    pub fn new(author_id: impl Into<UserId>, client_id: impl Into<ClientId>) -> Self {
        Self {
            author_id: author_id.into(),
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<MenuId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_meal(mut self, meal: MenuMeal) -> Self {
        self.meals.push(meal);
        self
    }
}

/// Partial update of a menu's own attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuUpdate {
    pub description: Option<String>,
}

/// Computed properties of a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuProperty {
    MealsByPosition,
    MealIds,
    PositionsByMealId,
    NutriFacts,
}

impl CachedProperty for MenuProperty {
    const ALL: &'static [Self] = &[
        MenuProperty::MealsByPosition,
        MenuProperty::MealIds,
        MenuProperty::PositionsByMealId,
        MenuProperty::NutriFacts,
    ];

    fn name(&self) -> &'static str {
        match self {
            MenuProperty::MealsByPosition => "meals_by_position",
            MenuProperty::MealIds => "meal_ids",
            MenuProperty::PositionsByMealId => "positions_by_meal_id",
            MenuProperty::NutriFacts => "nutri_facts",
        }
    }
}

/// Cache ledger of a menu. Lookups store slots into `Menu::meals`.
#[derive(Debug, Clone, Default)]
pub struct MenuCache {
    pub(crate) meals_by_position: Memo<BTreeMap<MenuPosition, usize>>,
    pub(crate) meal_ids: Memo<BTreeSet<MealId>>,
    pub(crate) positions_by_meal_id: Memo<HashMap<MealId, Vec<MenuPosition>>>,
    pub(crate) nutri_facts: Memo<Option<NutriFacts>>,
}

impl CacheLedger for MenuCache {
    type Property = MenuProperty;

    fn clear(&mut self, property: MenuProperty) {
        match property {
            MenuProperty::MealsByPosition => self.meals_by_position.clear(),
            MenuProperty::MealIds => self.meal_ids.clear(),
            MenuProperty::PositionsByMealId => self.positions_by_meal_id.clear(),
            MenuProperty::NutriFacts => self.nutri_facts.clear(),
        }
    }

    fn is_computed(&self, property: MenuProperty) -> bool {
        match property {
            MenuProperty::MealsByPosition => self.meals_by_position.is_computed(),
            MenuProperty::MealIds => self.meal_ids.is_computed(),
            MenuProperty::PositionsByMealId => self.positions_by_meal_id.is_computed(),
            MenuProperty::NutriFacts => self.nutri_facts.is_computed(),
        }
    }
}

/// Menu aggregate root.
///
/// Holds at most one [`MenuMeal`] per [`MenuPosition`]. Meals are referenced
/// by id; the snapshot fields are kept in sync through events.
#[derive(Debug, Clone)]
pub struct Menu {
    id: MenuId,
    author_id: UserId,
    client_id: ClientId,
    description: Option<String>,
    tags: BTreeSet<Tag>,
    meals: Vec<MenuMeal>,
    base: EntityBase,
    cache: MenuCache,
}

impl Entity for Menu {
    type Id = MenuId;
    type Ledger = MenuCache;

    const ENTITY_TYPE: &'static str = "Menu";

    fn id(&self) -> &MenuId {
        &self.id
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn ledger(&self) -> &MenuCache {
        &self.cache
    }

    fn ledger_mut(&mut self) -> &mut MenuCache {
        &mut self.cache
    }
}

impl Aggregate for Menu {
    fn author_id(&self) -> &UserId {
        &self.author_id
    }
}

/// Builds one `MenuPositionMustBeFree` rule per placement, counting slots
/// claimed earlier in the same batch as taken.
fn placement_rules(
    occupant_of: impl Fn(&MenuPosition) -> Option<MealId>,
    meals: &[MenuMeal],
) -> Vec<BusinessRule> {
    let mut claimed: HashMap<MenuPosition, MealId> = HashMap::new();
    meals
        .iter()
        .map(|meal| {
            let occupant = occupant_of(&meal.position)
                .or_else(|| claimed.get(&meal.position).cloned());
            claimed
                .entry(meal.position)
                .or_insert_with(|| meal.meal_id.clone());
            BusinessRule::MenuPositionMustBeFree {
                position: meal.position,
                occupant,
            }
        })
        .collect()
}

/// Distinct meal ids of `meals`, in first-seen order, skipping `known` ones.
fn new_meal_ids<'a>(
    meals: impl IntoIterator<Item = &'a MenuMeal>,
    known: &BTreeSet<MealId>,
) -> Vec<MealId> {
    let mut seen = BTreeSet::new();
    meals
        .into_iter()
        .map(|meal| &meal.meal_id)
        .filter(|id| !known.contains(*id) && seen.insert((*id).clone()))
        .cloned()
        .collect()
}

// Factory
impl Menu {
    /// Creates a menu, optionally with meals already placed.
    pub fn create(new: NewMenu) -> Result<Self> {
        let NewMenu {
            id,
            author_id,
            client_id,
            description,
            tags,
            meals,
        } = new;

        let mut rules: Vec<BusinessRule> = tags
            .iter()
            .map(|tag| BusinessRule::tag_author(tag, &author_id))
            .collect();
        rules.extend(placement_rules(|_| None, &meals));
        check_rules(rules)?;

        let added = new_meal_ids(&meals, &BTreeSet::new());
        let mut menu = Self {
            id: id.unwrap_or_default(),
            author_id,
            client_id,
            description,
            tags,
            meals,
            base: EntityBase::new(),
            cache: MenuCache::default(),
        };
        if !added.is_empty() {
            menu.base
                .record(Event::menu_meals_added(menu.id.clone(), added));
        }

        tracing::debug!(menu_id = %menu.id, client_id = %menu.client_id, "menu created");
        Ok(menu)
    }
}

// Query methods
impl Menu {
    /// Returns the client this menu was made for.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    /// Returns every placed meal in insertion order.
    pub fn meals(&self) -> &[MenuMeal] {
        &self.meals
    }

    /// Returns the meal occupying `position`.
    pub fn meal_at(&self, position: &MenuPosition) -> Option<&MenuMeal> {
        self.meals_by_position()
            .get(position)
            .map(|&slot| &self.meals[slot])
    }

    /// Returns every placement of `meal_id`, in chronological order.
    pub fn meals_of(&self, meal_id: &MealId) -> Vec<&MenuMeal> {
        let by_meal = self.positions_by_meal_id();
        let Some(positions) = by_meal.get(meal_id) else {
            return Vec::new();
        };
        let by_position = self.meals_by_position();
        positions
            .iter()
            .filter_map(|position| by_position.get(position))
            .map(|&slot| &self.meals[slot])
            .collect()
    }

    /// Returns the placed meals matching every filter that is set, in
    /// chronological order.
    pub fn filter_meals(
        &self,
        week: Option<u16>,
        weekday: Option<Weekday>,
        meal_type: Option<MealType>,
    ) -> Vec<&MenuMeal> {
        self.meals_by_position()
            .iter()
            .filter(|(position, _)| position.matches(week, weekday, meal_type))
            .map(|(_, &slot)| &self.meals[slot])
            .collect()
    }

    pub fn contains_meal(&self, meal_id: &MealId) -> bool {
        self.meal_ids().contains(meal_id)
    }

    /// Lookup from position to slot.
    pub fn meals_by_position(&self) -> Arc<BTreeMap<MenuPosition, usize>> {
        self.cache.meals_by_position.get_or_compute(|| {
            self.meals
                .iter()
                .enumerate()
                .map(|(slot, meal)| (meal.position, slot))
                .collect()
        })
    }

    /// Distinct meals placed on the menu.
    pub fn meal_ids(&self) -> Arc<BTreeSet<MealId>> {
        self.cache
            .meal_ids
            .get_or_compute(|| self.meals.iter().map(|meal| meal.meal_id.clone()).collect())
    }

    /// Positions of every placed meal, each list in chronological order.
    pub fn positions_by_meal_id(&self) -> Arc<HashMap<MealId, Vec<MenuPosition>>> {
        self.cache.positions_by_meal_id.get_or_compute(|| {
            let mut by_meal: HashMap<MealId, Vec<MenuPosition>> = HashMap::new();
            for meal in &self.meals {
                by_meal
                    .entry(meal.meal_id.clone())
                    .or_default()
                    .push(meal.position);
            }
            for positions in by_meal.values_mut() {
                positions.sort_unstable();
            }
            by_meal
        })
    }

    /// Sum of the nutrition snapshots of every placed meal.
    pub fn nutri_facts(&self) -> Option<NutriFacts> {
        *self.cache.nutri_facts.get_or_compute(|| {
            NutriFacts::sum_present(self.meals.iter().map(|meal| meal.nutri_facts.as_ref()))
        })
    }
}

// Command methods
impl Menu {
    /// Places meals on free positions.
    ///
    /// Records `MenuMealsAdded` with the meals that were not on the menu yet.
    pub fn add_meals(&mut self, meals: Vec<MenuMeal>) -> Result<()> {
        let rules = {
            let by_position = self.meals_by_position();
            placement_rules(
                |position| {
                    by_position
                        .get(position)
                        .map(|&slot| self.meals[slot].meal_id.clone())
                },
                &meals,
            )
        };
        let added = new_meal_ids(&meals, &self.meal_ids());

        self.mutate(rules, MenuProperty::ALL, |menu| menu.meals.extend(meals))?;
        if !added.is_empty() {
            self.base
                .record(Event::menu_meals_added(self.id.clone(), added));
        }
        Ok(())
    }

    /// Clears the given positions and returns the meals that occupied them.
    ///
    /// Positions holding nothing are ignored. Records `MenuMealsRemoved` with
    /// the meals that no longer appear anywhere on the menu.
    pub fn remove_meals(&mut self, positions: &[MenuPosition]) -> Result<Vec<MenuMeal>> {
        self.ensure_active()?;
        let targeted: BTreeSet<MenuPosition> = positions
            .iter()
            .copied()
            .filter(|position| self.meal_at(position).is_some())
            .collect();
        if targeted.is_empty() {
            return Ok(Vec::new());
        }

        let removed = self.mutate([], MenuProperty::ALL, |menu| {
            let (removed, kept): (Vec<MenuMeal>, Vec<MenuMeal>) = std::mem::take(&mut menu.meals)
                .into_iter()
                .partition(|meal| targeted.contains(&meal.position));
            menu.meals = kept;
            removed
        })?;

        let gone = new_meal_ids(&removed, &self.meal_ids());
        if !gone.is_empty() {
            self.base
                .record(Event::menu_meals_removed(self.id.clone(), gone));
        }
        Ok(removed)
    }

    /// Replaces placed meals in place.
    ///
    /// Each replacement must target a position already holding the same meal;
    /// an update never places a meal.
    pub fn update_meals(&mut self, meals: Vec<MenuMeal>) -> Result<()> {
        let rules: Vec<BusinessRule> = meals
            .iter()
            .map(|meal| BusinessRule::MenuMealMustAlreadyBeInMenu {
                position: meal.position,
                meal_id: meal.meal_id.clone(),
                occupant: self
                    .meal_at(&meal.position)
                    .map(|occupant| occupant.meal_id.clone()),
            })
            .collect();
        let by_position = self.meals_by_position();

        self.mutate(rules, MenuProperty::ALL, |menu| {
            for meal in meals {
                if let Some(&slot) = by_position.get(&meal.position) {
                    menu.meals[slot] = meal;
                }
            }
        })
    }

    pub fn update_properties(&mut self, update: MenuUpdate) -> Result<()> {
        self.mutate([], &[], |menu| {
            if let Some(description) = update.description {
                menu.description = Some(description);
            }
        })
    }

    /// Tags the menu on behalf of `user`.
    pub fn add_tag(&mut self, tag: Tag, user: &User) -> Result<()> {
        let rules = [
            BusinessRule::tag_author(&tag, &self.author_id),
            BusinessRule::public_tag(&tag, user),
        ];
        self.mutate(rules, &[], |menu| {
            menu.tags.insert(tag);
        })
    }

    /// Removes a tag; returns `false` if the menu did not carry it.
    pub fn remove_tag(&mut self, tag: &Tag) -> Result<bool> {
        self.ensure_active()?;
        if !self.tags.contains(tag) {
            return Ok(false);
        }
        self.mutate([], &[], |menu| menu.tags.remove(tag))
    }

    /// Discards the menu, recording `MenuDeleted` for its client and meals.
    pub fn discard(&mut self) -> Result<()> {
        let meal_ids: Vec<MealId> = self.meal_ids().iter().cloned().collect();

        self.mutate([], MenuProperty::ALL, |menu| menu.base.discard())?;
        self.base.record(Event::menu_deleted(
            self.id.clone(),
            self.client_id.clone(),
            meal_ids,
        ));

        tracing::debug!(menu_id = %self.id, "menu discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::rules::RuleKind;
    use crate::tag::TagType;

    fn at(week: u16, weekday: Weekday, meal_type: MealType) -> MenuPosition {
        MenuPosition::new(week, weekday, meal_type)
    }

    fn placed(meal_id: &str, position: MenuPosition, calories: f64) -> MenuMeal {
        MenuMeal::new(meal_id, format!("meal {meal_id}"), position)
            .with_nutri_facts(Some(NutriFacts::new(calories, 0.0, 0.0, 0.0)))
    }

    fn menu() -> Menu {
        let mut menu = Menu::create(
            NewMenu::new("u1", "c1")
                .with_id("menu-1")
                .with_meal(placed("m1", at(1, Weekday::Monday, MealType::Lunch), 500.0))
                .with_meal(placed("m2", at(1, Weekday::Monday, MealType::Dinner), 700.0))
                .with_meal(placed("m1", at(1, Weekday::Tuesday, MealType::Lunch), 500.0)),
        )
        .unwrap();
        menu.collect_events();
        menu
    }

    #[test]
    fn create_with_meals_records_distinct_additions() {
        let mut menu = Menu::create(
            NewMenu::new("u1", "c1")
                .with_meal(placed("m1", at(1, Weekday::Monday, MealType::Lunch), 1.0))
                .with_meal(placed("m1", at(1, Weekday::Friday, MealType::Lunch), 1.0)),
        )
        .unwrap();

        let events = menu.collect_events();
        assert!(matches!(
            events.as_slice(),
            [Event::MenuMealsAdded(data)] if data.meal_ids == vec![MealId::from("m1")]
        ));
    }

    #[test]
    fn create_rejects_two_meals_on_one_position() {
        let err = Menu::create(
            NewMenu::new("u1", "c1")
                .with_meal(placed("m1", at(1, Weekday::Monday, MealType::Lunch), 1.0))
                .with_meal(placed("m2", at(1, Weekday::Monday, MealType::Lunch), 1.0)),
        )
        .unwrap_err();
        assert_eq!(err.rule_kind(), Some(RuleKind::MenuPositionMustBeFree));
    }

    #[test]
    fn lookups_follow_mutations() {
        let mut menu = menu();
        let lunch = at(1, Weekday::Monday, MealType::Lunch);
        let friday = at(1, Weekday::Friday, MealType::Breakfast);

        assert_eq!(menu.meal_at(&lunch).unwrap().meal_id, MealId::from("m1"));
        assert!(menu.meal_at(&friday).is_none());
        assert_eq!(menu.meals_of(&MealId::from("m1")).len(), 2);
        assert_eq!(menu.nutri_facts().unwrap().calories, 1700.0);

        menu.add_meals(vec![placed("m3", friday, 300.0)]).unwrap();

        assert_eq!(menu.meal_at(&friday).unwrap().meal_id, MealId::from("m3"));
        assert!(menu.contains_meal(&MealId::from("m3")));
        assert_eq!(menu.nutri_facts().unwrap().calories, 2000.0);
    }

    #[test]
    fn repeated_lookup_is_cached() {
        let menu = menu();
        let first = menu.meals_by_position();
        let second = menu.meals_by_position();
        assert!(Arc::ptr_eq(&first, &second));

        let mut menu = menu;
        menu.update_properties(MenuUpdate {
            description: Some("week plan".into()),
        })
        .unwrap();
        assert!(menu.ledger().is_computed(MenuProperty::MealsByPosition));
    }

    #[test]
    fn add_meals_on_taken_position_is_rejected() {
        let mut menu = menu();
        let version = menu.version();

        let err = menu
            .add_meals(vec![placed("m9", at(1, Weekday::Monday, MealType::Dinner), 1.0)])
            .unwrap_err();

        assert_eq!(err.rule_kind(), Some(RuleKind::MenuPositionMustBeFree));
        assert!(err.to_string().contains("m2"));
        assert_eq!(menu.version(), version);
        assert_eq!(menu.meals().len(), 3);
    }

    #[test]
    fn add_meals_records_only_new_meals() {
        let mut menu = menu();
        menu.add_meals(vec![
            placed("m1", at(2, Weekday::Monday, MealType::Lunch), 1.0),
            placed("m4", at(2, Weekday::Monday, MealType::Dinner), 1.0),
        ])
        .unwrap();

        let events = menu.collect_events();
        assert!(matches!(
            events.as_slice(),
            [Event::MenuMealsAdded(data)] if data.meal_ids == vec![MealId::from("m4")]
        ));
    }

    #[test]
    fn remove_meals_reports_meals_gone_from_menu() {
        let mut menu = menu();
        let removed = menu
            .remove_meals(&[
                at(1, Weekday::Monday, MealType::Lunch),
                at(1, Weekday::Monday, MealType::Dinner),
            ])
            .unwrap();

        assert_eq!(removed.len(), 2);
        assert!(menu.contains_meal(&MealId::from("m1")));
        assert!(!menu.contains_meal(&MealId::from("m2")));

        let events = menu.collect_events();
        assert!(matches!(
            events.as_slice(),
            [Event::MenuMealsRemoved(data)] if data.meal_ids == vec![MealId::from("m2")]
        ));
    }

    #[test]
    fn removing_empty_positions_changes_nothing() {
        let mut menu = menu();
        let version = menu.version();
        let removed = menu
            .remove_meals(&[at(5, Weekday::Sunday, MealType::Supper)])
            .unwrap();
        assert!(removed.is_empty());
        assert_eq!(menu.version(), version);
        assert!(menu.collect_events().is_empty());
    }

    #[test]
    fn update_meals_replaces_snapshot_in_place() {
        let mut menu = menu();
        let lunch = at(1, Weekday::Monday, MealType::Lunch);
        assert_eq!(menu.nutri_facts().unwrap().calories, 1700.0);

        let mut refreshed = placed("m1", lunch, 100.0);
        refreshed.meal_name = "Renamed".into();
        menu.update_meals(vec![refreshed]).unwrap();

        assert_eq!(menu.meal_at(&lunch).unwrap().meal_name, "Renamed");
        assert_eq!(menu.nutri_facts().unwrap().calories, 1300.0);
        assert!(menu.collect_events().is_empty());
    }

    #[test]
    fn update_meals_cannot_place_new_meal() {
        let mut menu = menu();

        let empty_slot = placed("m1", at(3, Weekday::Monday, MealType::Lunch), 1.0);
        let err = menu.update_meals(vec![empty_slot]).unwrap_err();
        assert_eq!(err.rule_kind(), Some(RuleKind::MenuMealMustAlreadyBeInMenu));

        let other_meal = placed("m2", at(1, Weekday::Monday, MealType::Lunch), 1.0);
        let err = menu.update_meals(vec![other_meal]).unwrap_err();
        assert_eq!(err.rule_kind(), Some(RuleKind::MenuMealMustAlreadyBeInMenu));
    }

    #[test]
    fn filter_meals_by_day_and_type() {
        let menu = menu();
        let monday = menu.filter_meals(Some(1), Some(Weekday::Monday), None);
        let ids: Vec<&str> = monday.iter().map(|m| m.meal_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);

        let lunches = menu.filter_meals(None, None, Some(MealType::Lunch));
        assert_eq!(lunches.len(), 2);
        assert!(menu.filter_meals(Some(4), None, None).is_empty());
    }

    #[test]
    fn discard_records_deletion_with_meals() {
        let mut menu = menu();
        menu.discard().unwrap();

        let events = menu.collect_events();
        match events.as_slice() {
            [Event::MenuDeleted(data)] => {
                assert_eq!(data.client_id, ClientId::from("c1"));
                assert_eq!(data.meal_ids, vec![MealId::from("m1"), MealId::from("m2")]);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        let err = menu.add_meals(vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Discarded { entity: "Menu", .. }));
    }

    #[test]
    fn foreign_tag_is_rejected() {
        let mut menu = menu();
        let err = menu
            .add_tag(Tag::new("k", "v", "u2", TagType::Menu), &User::new("u2"))
            .unwrap_err();
        assert_eq!(err.rule_kind(), Some(RuleKind::TagAuthorMustMatchRootAuthor));
        assert!(menu.tags().is_empty());
    }
}
