//! Wires the default event handlers into a message bus.

use std::sync::Arc;

use domain::Event;

use crate::config::Config;
use crate::event_handlers::{
    AttachMealsToMenu, DetachMealsFromMenu, DiscardClientMenus, ForgetDeletedMenu,
    RefreshMenuMeals, RemoveDeletedMeal,
};
use crate::message_bus::MessageBus;
use crate::unit_of_work::Repositories;

/// Creates a message bus over `repositories` with every default handler subscribed.
pub fn bootstrap(repositories: Repositories, config: &Config) -> MessageBus {
    let mut bus = MessageBus::new(repositories, config);

    bus.subscribe(Event::MEAL_UPDATED_ON_MENU, Arc::new(RefreshMenuMeals));
    bus.subscribe(Event::MEAL_DELETED, Arc::new(RemoveDeletedMeal));
    bus.subscribe(Event::MENU_MEALS_ADDED, Arc::new(AttachMealsToMenu));
    bus.subscribe_all(
        &[Event::MENU_MEALS_REMOVED, Event::MENU_DELETED],
        Arc::new(DetachMealsFromMenu),
    );
    bus.subscribe(Event::MENU_DELETED, Arc::new(ForgetDeletedMenu));
    bus.subscribe_all(
        &[Event::CLIENT_MENU_DELETED, Event::CLIENT_DELETED],
        Arc::new(DiscardClientMenus),
    );

    tracing::info!(
        dispatch_timeout_ms = config.dispatch_timeout.as_millis() as u64,
        max_dispatch_depth = config.max_dispatch_depth,
        "message bus ready"
    );
    bus
}

/// Creates a fully wired message bus over fresh in-memory repositories.
pub fn in_memory(config: &Config) -> MessageBus {
    bootstrap(Repositories::in_memory(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_type_has_a_handler() {
        let bus = in_memory(&Config::default());
        for event_type in [
            Event::MEAL_UPDATED_ON_MENU,
            Event::MEAL_DELETED,
            Event::MENU_MEALS_ADDED,
            Event::MENU_MEALS_REMOVED,
            Event::CLIENT_MENU_DELETED,
            Event::CLIENT_DELETED,
        ] {
            assert_eq!(bus.handler_count(event_type), 1, "{event_type}");
        }
        assert_eq!(bus.handler_count(Event::MENU_DELETED), 2);
    }
}
