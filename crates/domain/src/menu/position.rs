//! Menu slots and the meal snapshots placed in them.

use std::fmt;

use common::MealId;
use serde::{Deserialize, Serialize};

use crate::nutrition::NutriFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        };
        f.write_str(name)
    }
}

/// The meal of the day a slot is for, in the order they are eaten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    MorningSnack,
    Lunch,
    AfternoonSnack,
    Dinner,
    Supper,
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MealType::Breakfast => "breakfast",
            MealType::MorningSnack => "morning snack",
            MealType::Lunch => "lunch",
            MealType::AfternoonSnack => "afternoon snack",
            MealType::Dinner => "dinner",
            MealType::Supper => "supper",
        };
        f.write_str(name)
    }
}

/// A slot on a menu. Ordering is chronological: week, then day, then meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MenuPosition {
    /// One-based week number.
    pub week: u16,
    pub weekday: Weekday,
    pub meal_type: MealType,
}

impl MenuPosition {
    pub fn new(week: u16, weekday: Weekday, meal_type: MealType) -> Self {
        Self {
            week,
            weekday,
            meal_type,
        }
    }

    /// Returns true if the position matches every filter that is set.
    pub fn matches(
        &self,
        week: Option<u16>,
        weekday: Option<Weekday>,
        meal_type: Option<MealType>,
    ) -> bool {
        week.is_none_or(|week| week == self.week)
            && weekday.is_none_or(|weekday| weekday == self.weekday)
            && meal_type.is_none_or(|meal_type| meal_type == self.meal_type)
    }
}

impl fmt::Display for MenuPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "week {} {} {}", self.week, self.weekday, self.meal_type)
    }
}

/// A meal placed on a menu, with the fields the menu displays copied in.
///
/// The copied fields are refreshed by a handler when the meal reports a
/// change; the menu never reads the meal itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuMeal {
    pub meal_id: MealId,
    pub meal_name: String,
    pub nutri_facts: Option<NutriFacts>,
    pub position: MenuPosition,
}

impl MenuMeal {
    pub fn new(meal_id: impl Into<MealId>, meal_name: impl Into<String>, position: MenuPosition) -> Self {
        Self {
            meal_id: meal_id.into(),
            meal_name: meal_name.into(),
            nutri_facts: None,
            position,
        }
    }

    pub fn with_nutri_facts(mut self, nutri_facts: Option<NutriFacts>) -> Self {
        self.nutri_facts = nutri_facts;
        self
    }
}
