//! Nutrition value objects.

use serde::{Deserialize, Serialize};

/// Nutrition facts of a recipe or an aggregate of recipes.
///
/// Energy is in kcal, masses in grams (sodium in milligrams).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutriFacts {
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub total_fat: f64,
    pub saturated_fat: f64,
    pub sugar: f64,
    pub dietary_fiber: f64,
    pub sodium: f64,
}

impl NutriFacts {
    /// Creates nutrition facts from the main macro values.
    pub fn new(calories: f64, protein: f64, carbohydrate: f64, total_fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbohydrate,
            total_fat,
            ..Default::default()
        }
    }

    /// Returns the combined mass of the three macronutrients.
    pub fn macro_grams(&self) -> f64 {
        self.protein + self.carbohydrate + self.total_fat
    }

    /// Returns the share of each macronutrient, or `None` when there are none.
    pub fn macro_division(&self) -> Option<MacroDivision> {
        let total = self.macro_grams();
        if total <= 0.0 {
            return None;
        }
        Some(MacroDivision {
            carbohydrate: self.carbohydrate / total * 100.0,
            protein: self.protein / total * 100.0,
            fat: self.total_fat / total * 100.0,
        })
    }

    /// Sums every `Some` entry; `None` when the iterator holds no facts at all.
    pub fn sum_present<'a>(facts: impl IntoIterator<Item = Option<&'a NutriFacts>>) -> Option<Self> {
        facts
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<NutriFacts>, facts| {
                Some(acc.unwrap_or_default() + *facts)
            })
    }
}

impl std::ops::Add for NutriFacts {
    type Output = NutriFacts;

    fn add(self, rhs: Self) -> Self::Output {
        NutriFacts {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbohydrate: self.carbohydrate + rhs.carbohydrate,
            total_fat: self.total_fat + rhs.total_fat,
            saturated_fat: self.saturated_fat + rhs.saturated_fat,
            sugar: self.sugar + rhs.sugar,
            dietary_fiber: self.dietary_fiber + rhs.dietary_fiber,
            sodium: self.sodium + rhs.sodium,
        }
    }
}

impl std::ops::AddAssign for NutriFacts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Percentage of macro grams contributed by each macronutrient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroDivision {
    pub carbohydrate: f64,
    pub protein: f64,
    pub fat: f64,
}

/// Calories per 100 g, when both energy and weight are known.
pub fn calorie_density(nutri_facts: Option<&NutriFacts>, weight_in_grams: Option<f64>) -> Option<f64> {
    match (nutri_facts, weight_in_grams) {
        (Some(facts), Some(weight)) if weight > 0.0 => Some(facts.calories / weight * 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_add_field_by_field() {
        let a = NutriFacts::new(100.0, 10.0, 20.0, 5.0);
        let b = NutriFacts::new(50.0, 5.0, 0.0, 5.0);
        let sum = a + b;
        assert_eq!(sum.calories, 150.0);
        assert_eq!(sum.protein, 15.0);
        assert_eq!(sum.carbohydrate, 20.0);
        assert_eq!(sum.total_fat, 10.0);
    }

    #[test]
    fn sum_present_skips_missing_facts() {
        let a = NutriFacts::new(100.0, 10.0, 20.0, 5.0);
        let total = NutriFacts::sum_present([Some(&a), None, Some(&a)]).unwrap();
        assert_eq!(total.calories, 200.0);
    }

    #[test]
    fn sum_present_of_nothing_is_none() {
        assert!(NutriFacts::sum_present([None, None]).is_none());
        assert!(NutriFacts::sum_present(std::iter::empty()).is_none());
    }

    #[test]
    fn macro_division_is_a_percentage_split() {
        let facts = NutriFacts::new(0.0, 25.0, 50.0, 25.0);
        let division = facts.macro_division().unwrap();
        assert_eq!(division.carbohydrate, 50.0);
        assert_eq!(division.protein, 25.0);
        assert_eq!(division.fat, 25.0);
    }

    #[test]
    fn macro_division_without_macros_is_none() {
        assert!(NutriFacts::default().macro_division().is_none());
    }

    #[test]
    fn calorie_density_needs_positive_weight() {
        let facts = NutriFacts::new(250.0, 0.0, 0.0, 0.0);
        assert_eq!(calorie_density(Some(&facts), Some(500.0)), Some(50.0));
        assert_eq!(calorie_density(Some(&facts), Some(0.0)), None);
        assert_eq!(calorie_density(Some(&facts), None), None);
        assert_eq!(calorie_density(None, Some(100.0)), None);
    }
}
