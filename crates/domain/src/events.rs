//! Domain events.
//!
//! Events are immutable facts recorded by an aggregate for other aggregates
//! to react to. They carry identifiers and a short message only, never the
//! state of the aggregate that emitted them.

use chrono::{DateTime, Utc};
use common::{ClientId, MealId, MenuId};
use serde::{Deserialize, Serialize};

/// Trait for domain events.
pub trait DomainEvent: Send + Sync + Clone {
    /// Returns the event type name, used to route the event to its handlers.
    fn event_type(&self) -> &'static str;
}

/// Every event the domain can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// An attribute of a meal shown on a menu changed.
    MealUpdatedOnMenu(MealUpdatedOnMenuData),

    /// A meal placed on a menu was discarded.
    MealDeleted(MealDeletedData),

    /// Meals were placed on a menu.
    MenuMealsAdded(MenuMealsAddedData),

    /// Meals no longer appear anywhere on a menu.
    MenuMealsRemoved(MenuMealsRemovedData),

    /// A menu was discarded.
    MenuDeleted(MenuDeletedData),

    /// A client deleted one of its menus.
    ClientMenuDeleted(ClientMenuDeletedData),

    /// A client was discarded.
    ClientDeleted(ClientDeletedData),
}

impl Event {
    pub const MEAL_UPDATED_ON_MENU: &'static str = "MealUpdatedOnMenu";
    pub const MEAL_DELETED: &'static str = "MealDeleted";
    pub const MENU_MEALS_ADDED: &'static str = "MenuMealsAdded";
    pub const MENU_MEALS_REMOVED: &'static str = "MenuMealsRemoved";
    pub const MENU_DELETED: &'static str = "MenuDeleted";
    pub const CLIENT_MENU_DELETED: &'static str = "ClientMenuDeleted";
    pub const CLIENT_DELETED: &'static str = "ClientDeleted";

    pub fn meal_updated_on_menu(
        menu_id: MenuId,
        meal_id: MealId,
        message: impl Into<String>,
    ) -> Self {
        Event::MealUpdatedOnMenu(MealUpdatedOnMenuData {
            menu_id,
            meal_id,
            message: message.into(),
            occurred_at: Utc::now(),
        })
    }

    pub fn meal_deleted(menu_id: MenuId, meal_id: MealId) -> Self {
        Event::MealDeleted(MealDeletedData {
            menu_id,
            meal_id,
            occurred_at: Utc::now(),
        })
    }

    pub fn menu_meals_added(menu_id: MenuId, meal_ids: Vec<MealId>) -> Self {
        Event::MenuMealsAdded(MenuMealsAddedData {
            menu_id,
            meal_ids,
            occurred_at: Utc::now(),
        })
    }

    pub fn menu_meals_removed(menu_id: MenuId, meal_ids: Vec<MealId>) -> Self {
        Event::MenuMealsRemoved(MenuMealsRemovedData {
            menu_id,
            meal_ids,
            occurred_at: Utc::now(),
        })
    }

    pub fn menu_deleted(menu_id: MenuId, client_id: ClientId, meal_ids: Vec<MealId>) -> Self {
        Event::MenuDeleted(MenuDeletedData {
            menu_id,
            client_id,
            meal_ids,
            occurred_at: Utc::now(),
        })
    }

    pub fn client_menu_deleted(client_id: ClientId, menu_id: MenuId) -> Self {
        Event::ClientMenuDeleted(ClientMenuDeletedData {
            client_id,
            menu_id,
            occurred_at: Utc::now(),
        })
    }

    pub fn client_deleted(client_id: ClientId, menu_ids: Vec<MenuId>) -> Self {
        Event::ClientDeleted(ClientDeletedData {
            client_id,
            menu_ids,
            occurred_at: Utc::now(),
        })
    }

    /// Returns when the fact occurred.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Event::MealUpdatedOnMenu(data) => data.occurred_at,
            Event::MealDeleted(data) => data.occurred_at,
            Event::MenuMealsAdded(data) => data.occurred_at,
            Event::MenuMealsRemoved(data) => data.occurred_at,
            Event::MenuDeleted(data) => data.occurred_at,
            Event::ClientMenuDeleted(data) => data.occurred_at,
            Event::ClientDeleted(data) => data.occurred_at,
        }
    }
}

impl DomainEvent for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::MealUpdatedOnMenu(_) => Event::MEAL_UPDATED_ON_MENU,
            Event::MealDeleted(_) => Event::MEAL_DELETED,
            Event::MenuMealsAdded(_) => Event::MENU_MEALS_ADDED,
            Event::MenuMealsRemoved(_) => Event::MENU_MEALS_REMOVED,
            Event::MenuDeleted(_) => Event::MENU_DELETED,
            Event::ClientMenuDeleted(_) => Event::CLIENT_MENU_DELETED,
            Event::ClientDeleted(_) => Event::CLIENT_DELETED,
        }
    }
}

/// Data for MealUpdatedOnMenu event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealUpdatedOnMenuData {
    /// The menu that displays the meal.
    pub menu_id: MenuId,

    /// The meal that changed.
    pub meal_id: MealId,

    /// What changed.
    pub message: String,

    pub occurred_at: DateTime<Utc>,
}

/// Data for MealDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealDeletedData {
    pub menu_id: MenuId,
    pub meal_id: MealId,
    pub occurred_at: DateTime<Utc>,
}

/// Data for MenuMealsAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuMealsAddedData {
    pub menu_id: MenuId,

    /// Distinct meals newly placed on the menu.
    pub meal_ids: Vec<MealId>,

    pub occurred_at: DateTime<Utc>,
}

/// Data for MenuMealsRemoved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuMealsRemovedData {
    pub menu_id: MenuId,

    /// Meals that no longer occupy any position on the menu.
    pub meal_ids: Vec<MealId>,

    pub occurred_at: DateTime<Utc>,
}

/// Data for MenuDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuDeletedData {
    pub menu_id: MenuId,

    /// The client that referenced the menu.
    pub client_id: ClientId,

    /// Meals that were on the menu when it was discarded.
    pub meal_ids: Vec<MealId>,

    pub occurred_at: DateTime<Utc>,
}

/// Data for ClientMenuDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMenuDeletedData {
    pub client_id: ClientId,
    pub menu_id: MenuId,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ClientDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDeletedData {
    pub client_id: ClientId,

    /// Menus the client referenced when it was discarded.
    pub menu_ids: Vec<MenuId>,

    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names() {
        let event = Event::meal_updated_on_menu(MenuId::from("menu"), MealId::from("m1"), "name");
        assert_eq!(event.event_type(), "MealUpdatedOnMenu");

        let event = Event::client_deleted(ClientId::from("c1"), vec![]);
        assert_eq!(event.event_type(), "ClientDeleted");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::meal_deleted(MenuId::from("menu-1"), MealId::from("m1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MealDeleted");
        assert_eq!(json["data"]["menu_id"], "menu-1");
        assert_eq!(json["data"]["meal_id"], "m1");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
