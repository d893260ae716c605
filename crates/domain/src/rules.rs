//! Business rules and the gate that enforces them.
//!
//! A [`BusinessRule`] carries exactly the data needed to decide whether it
//! holds; it never reaches out to repositories or other aggregates. Rules are
//! built fresh at the call site and handed to [`check_rule`], which turns a
//! broken rule into a [`BusinessRuleViolation`].

use common::{MealId, RecipeId, UserId};
use thiserror::Error;

use crate::meal::RatingDimension;
use crate::menu::MenuPosition;
use crate::tag::{Privacy, Tag, User};

/// Smallest accepted rating value.
pub const MIN_RATING: i32 = 0;

/// Largest accepted rating value.
pub const MAX_RATING: i32 = 5;

/// A single business constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum BusinessRule {
    /// Ingredient positions, once sorted, must be exactly `0..n`.
    PositionsAreConsecutiveFromZero { positions: Vec<u32> },

    /// A recipe must point at the meal that owns it and share its author.
    RecipeMustBelongToMeal {
        recipe_id: RecipeId,
        recipe_meal_id: MealId,
        recipe_author_id: UserId,
        meal_id: MealId,
        meal_author_id: UserId,
    },

    /// A tag must be authored by the root aggregate's author.
    TagAuthorMustMatchRootAuthor {
        tag_author_id: UserId,
        root_author_id: UserId,
    },

    /// An in-place update must target a position already holding that meal.
    MenuMealMustAlreadyBeInMenu {
        position: MenuPosition,
        meal_id: MealId,
        occupant: Option<MealId>,
    },

    /// A new menu meal may only be placed on an empty position.
    MenuPositionMustBeFree {
        position: MenuPosition,
        occupant: Option<MealId>,
    },

    /// Only administrators may create public tags.
    OnlyAdministratorCanCreatePublicTag {
        privacy: Privacy,
        is_administrator: bool,
    },

    /// Ratings must fall within `MIN_RATING..=MAX_RATING`.
    RatingMustBeInRange {
        dimension: RatingDimension,
        value: i32,
    },
}

/// Discriminant of a [`BusinessRule`], for programmatic matching on violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    PositionsAreConsecutiveFromZero,
    RecipeMustBelongToMeal,
    TagAuthorMustMatchRootAuthor,
    MenuMealMustAlreadyBeInMenu,
    MenuPositionMustBeFree,
    OnlyAdministratorCanCreatePublicTag,
    RatingMustBeInRange,
}

impl RuleKind {
    /// Returns the rule name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::PositionsAreConsecutiveFromZero => "PositionsAreConsecutiveFromZero",
            RuleKind::RecipeMustBelongToMeal => "RecipeMustBelongToMeal",
            RuleKind::TagAuthorMustMatchRootAuthor => "TagAuthorMustMatchRootAuthor",
            RuleKind::MenuMealMustAlreadyBeInMenu => "MenuMealMustAlreadyBeInMenu",
            RuleKind::MenuPositionMustBeFree => "MenuPositionMustBeFree",
            RuleKind::OnlyAdministratorCanCreatePublicTag => "OnlyAdministratorCanCreatePublicTag",
            RuleKind::RatingMustBeInRange => "RatingMustBeInRange",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl BusinessRule {
    /// Builds the tag ownership rule for `tag` under a root authored by `root_author_id`.
    pub fn tag_author(tag: &Tag, root_author_id: &UserId) -> Self {
        BusinessRule::TagAuthorMustMatchRootAuthor {
            tag_author_id: tag.author_id.clone(),
            root_author_id: root_author_id.clone(),
        }
    }

    /// Builds the public-tag rule for `tag` added on behalf of `user`.
    pub fn public_tag(tag: &Tag, user: &User) -> Self {
        BusinessRule::OnlyAdministratorCanCreatePublicTag {
            privacy: tag.privacy,
            is_administrator: user.is_administrator(),
        }
    }

    /// Returns the discriminant of this rule.
    pub fn kind(&self) -> RuleKind {
        match self {
            BusinessRule::PositionsAreConsecutiveFromZero { .. } => {
                RuleKind::PositionsAreConsecutiveFromZero
            }
            BusinessRule::RecipeMustBelongToMeal { .. } => RuleKind::RecipeMustBelongToMeal,
            BusinessRule::TagAuthorMustMatchRootAuthor { .. } => {
                RuleKind::TagAuthorMustMatchRootAuthor
            }
            BusinessRule::MenuMealMustAlreadyBeInMenu { .. } => {
                RuleKind::MenuMealMustAlreadyBeInMenu
            }
            BusinessRule::MenuPositionMustBeFree { .. } => RuleKind::MenuPositionMustBeFree,
            BusinessRule::OnlyAdministratorCanCreatePublicTag { .. } => {
                RuleKind::OnlyAdministratorCanCreatePublicTag
            }
            BusinessRule::RatingMustBeInRange { .. } => RuleKind::RatingMustBeInRange,
        }
    }

    /// Returns true if the constraint does not hold.
    pub fn is_broken(&self) -> bool {
        match self {
            BusinessRule::PositionsAreConsecutiveFromZero { positions } => {
                let mut sorted = positions.clone();
                sorted.sort_unstable();
                !sorted.iter().copied().eq(0..positions.len() as u32)
            }
            BusinessRule::RecipeMustBelongToMeal {
                recipe_meal_id,
                recipe_author_id,
                meal_id,
                meal_author_id,
                ..
            } => recipe_meal_id != meal_id || recipe_author_id != meal_author_id,
            BusinessRule::TagAuthorMustMatchRootAuthor {
                tag_author_id,
                root_author_id,
            } => tag_author_id != root_author_id,
            BusinessRule::MenuMealMustAlreadyBeInMenu {
                meal_id, occupant, ..
            } => occupant.as_ref() != Some(meal_id),
            BusinessRule::MenuPositionMustBeFree { occupant, .. } => occupant.is_some(),
            BusinessRule::OnlyAdministratorCanCreatePublicTag {
                privacy,
                is_administrator,
            } => *privacy == Privacy::Public && !is_administrator,
            BusinessRule::RatingMustBeInRange { value, .. } => {
                !(MIN_RATING..=MAX_RATING).contains(value)
            }
        }
    }

    /// Returns the human-readable reason the rule is broken.
    pub fn message(&self) -> String {
        match self {
            BusinessRule::PositionsAreConsecutiveFromZero { positions } => format!(
                "Ingredient positions must be consecutive and start from 0, got {positions:?}"
            ),
            BusinessRule::RecipeMustBelongToMeal {
                recipe_id,
                recipe_meal_id,
                recipe_author_id,
                meal_id,
                meal_author_id,
            } => format!(
                "Recipe {recipe_id} (meal {recipe_meal_id}, author {recipe_author_id}) does not belong to meal {meal_id} (author {meal_author_id})"
            ),
            BusinessRule::TagAuthorMustMatchRootAuthor {
                tag_author_id,
                root_author_id,
            } => format!(
                "Tag author {tag_author_id} must match the aggregate author {root_author_id}"
            ),
            BusinessRule::MenuMealMustAlreadyBeInMenu {
                position, meal_id, ..
            } => format!("Meal {meal_id} is not on the menu at {position}"),
            BusinessRule::MenuPositionMustBeFree { position, occupant } => match occupant {
                Some(occupant) => format!("Position {position} is already taken by meal {occupant}"),
                None => format!("Position {position} is already taken"),
            },
            BusinessRule::OnlyAdministratorCanCreatePublicTag { .. } => {
                "Only administrators can create public tags".to_string()
            }
            BusinessRule::RatingMustBeInRange { dimension, value } => format!(
                "{dimension} rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
            ),
        }
    }
}

/// Raised when a business rule is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BusinessRuleViolation {
    /// Which rule was broken.
    pub kind: RuleKind,

    /// Why it was broken.
    pub message: String,
}

impl From<&BusinessRule> for BusinessRuleViolation {
    fn from(rule: &BusinessRule) -> Self {
        Self {
            kind: rule.kind(),
            message: rule.message(),
        }
    }
}

/// Evaluates a rule, failing with its message when it is broken.
pub fn check_rule(rule: BusinessRule) -> Result<(), BusinessRuleViolation> {
    if rule.is_broken() {
        let violation = BusinessRuleViolation::from(&rule);
        metrics::counter!("business_rule_violations_total", "rule" => violation.kind.as_str())
            .increment(1);
        tracing::debug!(rule = %violation.kind, message = %violation.message, "business rule broken");
        return Err(violation);
    }
    Ok(())
}

/// Evaluates rules in order; the first broken one aborts.
pub fn check_rules(
    rules: impl IntoIterator<Item = BusinessRule>,
) -> Result<(), BusinessRuleViolation> {
    rules.into_iter().try_for_each(check_rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::{MealType, Weekday};

    fn positions(values: &[u32]) -> BusinessRule {
        BusinessRule::PositionsAreConsecutiveFromZero {
            positions: values.to_vec(),
        }
    }

    fn recipe_rule(recipe_meal: &str, recipe_author: &str) -> BusinessRule {
        BusinessRule::RecipeMustBelongToMeal {
            recipe_id: RecipeId::from("r1"),
            recipe_meal_id: MealId::from(recipe_meal),
            recipe_author_id: UserId::from(recipe_author),
            meal_id: MealId::from("m1"),
            meal_author_id: UserId::from("u1"),
        }
    }

    fn lunch() -> MenuPosition {
        MenuPosition::new(1, Weekday::Monday, MealType::Lunch)
    }

    #[test]
    fn consecutive_positions_hold() {
        assert!(!positions(&[0, 1, 2]).is_broken());
        assert!(!positions(&[2, 0, 1]).is_broken());
    }

    #[test]
    fn empty_positions_hold_vacuously() {
        assert!(!positions(&[]).is_broken());
    }

    #[test]
    fn gap_in_positions_is_broken() {
        assert!(positions(&[0, 2, 3]).is_broken());
        assert!(positions(&[1, 2, 3]).is_broken());
    }

    #[test]
    fn duplicate_positions_are_broken() {
        assert!(positions(&[0, 1, 1]).is_broken());
        assert!(positions(&[0, 0]).is_broken());
    }

    #[test]
    fn recipe_matching_meal_holds() {
        assert!(!recipe_rule("m1", "u1").is_broken());
    }

    #[test]
    fn recipe_with_wrong_meal_or_author_is_broken() {
        assert!(recipe_rule("wrong", "u1").is_broken());
        assert!(recipe_rule("m1", "u2").is_broken());
    }

    #[test]
    fn tag_author_rule() {
        let tag = Tag::new("diet", "vegan", "u1", crate::tag::TagType::Meal);
        assert!(!BusinessRule::tag_author(&tag, &UserId::from("u1")).is_broken());
        assert!(BusinessRule::tag_author(&tag, &UserId::from("u2")).is_broken());
    }

    #[test]
    fn menu_meal_must_already_be_in_menu() {
        let held = BusinessRule::MenuMealMustAlreadyBeInMenu {
            position: lunch(),
            meal_id: MealId::from("m1"),
            occupant: Some(MealId::from("m1")),
        };
        let other = BusinessRule::MenuMealMustAlreadyBeInMenu {
            position: lunch(),
            meal_id: MealId::from("m1"),
            occupant: Some(MealId::from("m2")),
        };
        let empty = BusinessRule::MenuMealMustAlreadyBeInMenu {
            position: lunch(),
            meal_id: MealId::from("m1"),
            occupant: None,
        };
        assert!(!held.is_broken());
        assert!(other.is_broken());
        assert!(empty.is_broken());
    }

    #[test]
    fn menu_position_must_be_free() {
        let free = BusinessRule::MenuPositionMustBeFree {
            position: lunch(),
            occupant: None,
        };
        let taken = BusinessRule::MenuPositionMustBeFree {
            position: lunch(),
            occupant: Some(MealId::from("m1")),
        };
        assert!(!free.is_broken());
        assert!(taken.is_broken());
        assert!(taken.message().contains("m1"));
    }

    #[test]
    fn public_tag_needs_administrator() {
        let rule = |privacy, is_administrator| BusinessRule::OnlyAdministratorCanCreatePublicTag {
            privacy,
            is_administrator,
        };
        assert!(rule(Privacy::Public, false).is_broken());
        assert!(!rule(Privacy::Public, true).is_broken());
        assert!(!rule(Privacy::Private, false).is_broken());
    }

    #[test]
    fn rating_range_is_inclusive() {
        let rule = |value| BusinessRule::RatingMustBeInRange {
            dimension: RatingDimension::Taste,
            value,
        };
        assert!(!rule(0).is_broken());
        assert!(!rule(5).is_broken());
        assert!(rule(6).is_broken());
        assert!(rule(-1).is_broken());
    }

    #[test]
    fn check_rule_carries_kind_and_message() {
        let err = check_rule(positions(&[0, 2])).unwrap_err();
        assert_eq!(err.kind, RuleKind::PositionsAreConsecutiveFromZero);
        assert!(err.to_string().contains("consecutive"));
    }

    #[test]
    fn check_rules_stops_at_first_violation() {
        let err = check_rules([
            positions(&[0]),
            recipe_rule("wrong", "u1"),
            positions(&[5]),
        ])
        .unwrap_err();
        assert_eq!(err.kind, RuleKind::RecipeMustBelongToMeal);
    }

    #[test]
    fn rechecking_valid_rules_never_fails() {
        let rules = vec![positions(&[0, 1]), recipe_rule("m1", "u1")];
        for _ in 0..3 {
            check_rules(rules.clone()).unwrap();
        }
    }
}
