//! Event handlers keeping aggregates consistent with each other.
//!
//! Aggregates only hold each other's ids, so any of them may be gone by the
//! time an event arrives. A missing aggregate is treated as already handled.

use async_trait::async_trait;
use common::{MealId, MenuId};
use domain::{Event, MenuMeal, MenuPosition};
use repository::AggregateQuery;

use crate::unit_of_work::UnitOfWork;
use crate::{Result, ServiceError};

/// Handler for processing domain events.
///
/// Implementations should be idempotent: the same event handled twice must
/// leave the same state. Each invocation gets its own unit of work, which the
/// message bus commits once the handler returns `Ok`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()>;

    /// Handler name for logging and metrics.
    fn name(&self) -> &'static str;
}

/// Maps a missing aggregate to `None`.
fn found<T>(result: Result<T>, handler: &'static str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => {
            tracing::debug!(handler, error = %err, "aggregate already gone, skipping");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn unexpected(handler: &'static str, event: &Event) -> ServiceError {
    ServiceError::Handler(format!("{handler} cannot handle {event:?}"))
}

/// Copies a meal's current name and nutrition into the menu positions showing it.
pub struct RefreshMenuMeals;

#[async_trait]
impl EventHandler for RefreshMenuMeals {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()> {
        let Event::MealUpdatedOnMenu(data) = event else {
            return Err(unexpected(self.name(), event));
        };

        let Some(meal) = found(uow.meals.get(&data.meal_id).await, self.name())? else {
            return Ok(());
        };
        let name = meal.name().to_string();
        let nutri_facts = meal.nutri_facts();

        let Some(menu) = found(uow.menus.get(&data.menu_id).await, self.name())? else {
            return Ok(());
        };
        let stale: Vec<MenuMeal> = menu
            .meals_of(&data.meal_id)
            .into_iter()
            .filter(|placed| placed.meal_name != name || placed.nutri_facts != nutri_facts)
            .map(|placed| MenuMeal {
                meal_name: name.clone(),
                nutri_facts,
                ..placed.clone()
            })
            .collect();

        if !stale.is_empty() {
            menu.update_meals(stale)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RefreshMenuMeals"
    }
}

/// Clears every position a discarded meal held on its menu.
pub struct RemoveDeletedMeal;

#[async_trait]
impl EventHandler for RemoveDeletedMeal {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()> {
        let Event::MealDeleted(data) = event else {
            return Err(unexpected(self.name(), event));
        };

        let Some(menu) = found(uow.menus.get(&data.menu_id).await, self.name())? else {
            return Ok(());
        };
        let positions: Vec<MenuPosition> = menu
            .meals_of(&data.meal_id)
            .into_iter()
            .map(|placed| placed.position)
            .collect();
        menu.remove_meals(&positions)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RemoveDeletedMeal"
    }
}

/// Points meals placed on a menu at that menu.
pub struct AttachMealsToMenu;

#[async_trait]
impl EventHandler for AttachMealsToMenu {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()> {
        let Event::MenuMealsAdded(data) = event else {
            return Err(unexpected(self.name(), event));
        };

        for meal_id in &data.meal_ids {
            if let Some(meal) = found(uow.meals.get(meal_id).await, self.name())? {
                meal.set_menu(Some(data.menu_id.clone()))?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "AttachMealsToMenu"
    }
}

/// Detaches meals from a menu they no longer appear on.
///
/// Meals that meanwhile moved to another menu are left alone.
pub struct DetachMealsFromMenu;

impl DetachMealsFromMenu {
    async fn detach(
        &self,
        uow: &mut UnitOfWork,
        menu_id: &MenuId,
        meal_ids: &[MealId],
    ) -> Result<()> {
        for meal_id in meal_ids {
            let Some(meal) = found(uow.meals.get(meal_id).await, self.name())? else {
                continue;
            };
            if meal.menu_id() == Some(menu_id) {
                meal.set_menu(None)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for DetachMealsFromMenu {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()> {
        match event {
            Event::MenuMealsRemoved(data) => self.detach(uow, &data.menu_id, &data.meal_ids).await,
            Event::MenuDeleted(data) => {
                // Meals may point at the menu without being placed on it.
                let mut meal_ids = uow
                    .meals
                    .query(AggregateQuery::new().menu(data.menu_id.clone()))
                    .await?;
                meal_ids.extend(data.meal_ids.iter().cloned());
                meal_ids.sort();
                meal_ids.dedup();
                self.detach(uow, &data.menu_id, &meal_ids).await
            }
            _ => Err(unexpected(self.name(), event)),
        }
    }

    fn name(&self) -> &'static str {
        "DetachMealsFromMenu"
    }
}

/// Drops a discarded menu from its client's references.
pub struct ForgetDeletedMenu;

#[async_trait]
impl EventHandler for ForgetDeletedMenu {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()> {
        let Event::MenuDeleted(data) = event else {
            return Err(unexpected(self.name(), event));
        };

        if let Some(client) = found(uow.clients.get(&data.client_id).await, self.name())? {
            client.forget_menu(&data.menu_id)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ForgetDeletedMenu"
    }
}

/// Discards the menus a client let go of.
pub struct DiscardClientMenus;

#[async_trait]
impl EventHandler for DiscardClientMenus {
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork) -> Result<()> {
        let menu_ids = match event {
            Event::ClientMenuDeleted(data) => std::slice::from_ref(&data.menu_id),
            Event::ClientDeleted(data) => data.menu_ids.as_slice(),
            _ => return Err(unexpected(self.name(), event)),
        };

        for menu_id in menu_ids {
            if let Some(menu) = found(uow.menus.get(menu_id).await, self.name())? {
                menu.discard()?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DiscardClientMenus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit_of_work::Repositories;
    use domain::{Entity, Meal, MealType, Menu, NewMeal, NewMenu, Weekday};
    use repository::Repository;

    fn lunch() -> MenuPosition {
        MenuPosition::new(1, Weekday::Monday, MealType::Lunch)
    }

    async fn seeded() -> Repositories {
        let repositories = Repositories::in_memory();
        repositories
            .meals
            .add(&Meal::create(NewMeal::new("Soup", "u1").with_id("m1").with_menu("menu-1")).unwrap())
            .await
            .unwrap();
        repositories
            .menus
            .add(
                &Menu::create(
                    NewMenu::new("u1", "c1")
                        .with_id("menu-1")
                        .with_meal(MenuMeal::new("m1", "Old name", lunch())),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        repositories
    }

    #[tokio::test]
    async fn refresh_copies_meal_name() {
        let repositories = seeded().await;
        let event = Event::meal_updated_on_menu("menu-1".into(), "m1".into(), "name changed");

        let mut uow = UnitOfWork::begin(&repositories);
        RefreshMenuMeals.handle(&event, &mut uow).await.unwrap();
        uow.commit().await.unwrap();

        let menu = repositories.menus.get(&"menu-1".into()).await.unwrap();
        assert_eq!(menu.meal_at(&lunch()).unwrap().meal_name, "Soup");
    }

    #[tokio::test]
    async fn refresh_twice_changes_nothing_the_second_time() {
        let repositories = seeded().await;
        let event = Event::meal_updated_on_menu("menu-1".into(), "m1".into(), "name changed");

        for _ in 0..2 {
            let mut uow = UnitOfWork::begin(&repositories);
            RefreshMenuMeals.handle(&event, &mut uow).await.unwrap();
            uow.commit().await.unwrap();
        }

        let menu = repositories.menus.get(&"menu-1".into()).await.unwrap();
        assert_eq!(menu.version(), common::Version::new(2));
    }

    #[tokio::test]
    async fn missing_menu_is_skipped() {
        let repositories = seeded().await;
        let event = Event::meal_deleted("menu-9".into(), "m1".into());

        let mut uow = UnitOfWork::begin(&repositories);
        RemoveDeletedMeal.handle(&event, &mut uow).await.unwrap();
        assert_eq!(uow.menus.tracked(), 0);
    }

    #[tokio::test]
    async fn wrong_event_is_an_error() {
        let repositories = seeded().await;
        let event = Event::meal_deleted("menu-1".into(), "m1".into());

        let mut uow = UnitOfWork::begin(&repositories);
        let err = AttachMealsToMenu.handle(&event, &mut uow).await.unwrap_err();
        assert!(matches!(err, ServiceError::Handler(_)));
    }

    #[tokio::test]
    async fn detach_leaves_meals_on_other_menus() {
        let repositories = seeded().await;
        let event = Event::menu_meals_removed("menu-2".into(), vec!["m1".into()]);

        let mut uow = UnitOfWork::begin(&repositories);
        DetachMealsFromMenu.handle(&event, &mut uow).await.unwrap();
        uow.commit().await.unwrap();

        let meal = repositories.meals.get(&"m1".into()).await.unwrap();
        assert_eq!(meal.menu_id(), Some(&MenuId::from("menu-1")));
    }

    #[tokio::test]
    async fn deleted_menu_detaches_every_meal_pointing_at_it() {
        let repositories = seeded().await;
        let event = Event::menu_deleted("menu-1".into(), "c1".into(), Vec::new());

        let mut uow = UnitOfWork::begin(&repositories);
        DetachMealsFromMenu.handle(&event, &mut uow).await.unwrap();
        uow.commit().await.unwrap();

        let meal = repositories.meals.get(&"m1".into()).await.unwrap();
        assert_eq!(meal.menu_id(), None);
    }
}
