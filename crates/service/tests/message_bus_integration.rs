//! Integration tests for the message bus and the default handler wiring.
//!
//! Commands go through a fully wired bus over in-memory repositories, and the
//! assertions look at what ended up stored once every cascade has finished.

use std::sync::Arc;

use async_trait::async_trait;
use common::{ClientId, MealId, MenuId, RecipeId, Version};
use domain::{
    Aggregate, Client, Entity, Event, Ingredient, MealType, MealUpdate, MenuPosition, NewClient,
    NewClientMenu, NewMeal, NewRecipe, NutriFacts, Profile, Rating, RuleKind, Weekday,
};
use repository::Repository;
use service::commands::*;
use service::{
    CommandResult, Config, EventHandler, MessageBus, Repositories, ServiceError, UnitOfWork,
};

fn lunch() -> MenuPosition {
    MenuPosition::new(1, Weekday::Monday, MealType::Lunch)
}

fn dinner() -> MenuPosition {
    MenuPosition::new(1, Weekday::Monday, MealType::Dinner)
}

fn soup() -> NewRecipe {
    NewRecipe::named("Soup")
        .with_ingredients(vec![Ingredient::new("water", 0), Ingredient::new("leek", 1)])
        .with_nutri_facts(NutriFacts::new(300.0, 20.0, 10.0, 5.0))
        .with_total_time(30)
        .with_weight_in_grams(400.0)
}

fn bus() -> MessageBus {
    service::bootstrap::in_memory(&Config::default())
}

async fn meal_id(bus: &MessageBus, new: NewMeal) -> MealId {
    match bus
        .handle_command(CreateMeal { meal: new })
        .await
        .unwrap()
        .result
    {
        CommandResult::Meal(id) => id,
        other => panic!("unexpected result {other:?}"),
    }
}

async fn client_with_menu(bus: &MessageBus) -> (ClientId, MenuId) {
    bus.handle_command(CreateClient {
        client: NewClient::new("u1", Profile::named("Ana")).with_id("c1"),
    })
    .await
    .unwrap();
    let outcome = bus
        .handle_command(CreateMenu {
            client_id: "c1".into(),
            menu: NewClientMenu {
                id: Some("menu-1".into()),
                ..Default::default()
            },
        })
        .await
        .unwrap();
    assert_eq!(outcome.result, CommandResult::Menu("menu-1".into()));
    ("c1".into(), "menu-1".into())
}

/// Client, menu and a meal placed at lunch.
async fn planned_lunch(bus: &MessageBus) -> (ClientId, MenuId, MealId) {
    let (client_id, menu_id) = client_with_menu(bus).await;
    let meal_id = meal_id(bus, NewMeal::new("Leek soup", "u1").with_id("m1")).await;
    bus.handle_command(AddMealToMenu {
        menu_id: menu_id.clone(),
        meal_id: meal_id.clone(),
        positions: vec![lunch()],
    })
    .await
    .unwrap();
    (client_id, menu_id, meal_id)
}

mod handler_isolation {
    use super::*;

    /// Creates a client named after the handler, so its work is observable.
    struct CreatesClient(&'static str);

    #[async_trait]
    impl EventHandler for CreatesClient {
        async fn handle(&self, _event: &Event, uow: &mut UnitOfWork) -> service::Result<()> {
            let client =
                Client::create(NewClient::new("u1", Profile::named(self.0)).with_id(self.0))?;
            uow.clients.add(client)?;
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.0
        }
    }

    struct Fails;

    #[async_trait]
    impl EventHandler for Fails {
        async fn handle(&self, _event: &Event, uow: &mut UnitOfWork) -> service::Result<()> {
            let client =
                Client::create(NewClient::new("u1", Profile::named("x")).with_id("never"))?;
            uow.clients.add(client)?;
            Err(ServiceError::Handler("second handler failed".into()))
        }

        fn name(&self) -> &'static str {
            "Fails"
        }
    }

    #[tokio::test]
    async fn second_of_three_handlers_failing_spares_the_others() {
        let repositories = Repositories::in_memory();
        let mut bus = MessageBus::new(repositories.clone(), &Config::default());
        bus.subscribe(Event::MEAL_DELETED, Arc::new(CreatesClient("first")));
        bus.subscribe(Event::MEAL_DELETED, Arc::new(Fails));
        bus.subscribe(Event::MEAL_DELETED, Arc::new(CreatesClient("third")));

        let report = bus
            .handle_event(Event::meal_deleted("menu-1".into(), "m1".into()))
            .await;

        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert!(repositories.clients.get(&"first".into()).await.is_ok());
        assert!(repositories.clients.get(&"third".into()).await.is_ok());
        // The failing handler's unit of work is never committed.
        assert!(repositories.clients.get(&"never".into()).await.is_err());
    }
}

mod meal_on_menu {
    use super::*;

    #[tokio::test]
    async fn placing_a_meal_attaches_it() {
        let bus = bus();
        let (_, menu_id, meal_id) = planned_lunch(&bus).await;
        let repos = bus.repositories();

        let menu = repos.menus.get(&menu_id).await.unwrap();
        assert_eq!(menu.meal_at(&lunch()).unwrap().meal_name, "Leek soup");

        let meal = repos.meals.get(&meal_id).await.unwrap();
        assert_eq!(meal.menu_id(), Some(&menu_id));
    }

    #[tokio::test]
    async fn renaming_a_meal_refreshes_the_menu() {
        let bus = bus();
        let (_, menu_id, meal_id) = planned_lunch(&bus).await;

        let outcome = bus
            .handle_command(UpdateMeal {
                meal_id,
                update: MealUpdate {
                    name: Some("Potato leek soup".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(outcome.events, 1);
        assert_eq!(outcome.dispatch.completed, 1);

        let menu = bus.repositories().menus.get(&menu_id).await.unwrap();
        assert_eq!(menu.meal_at(&lunch()).unwrap().meal_name, "Potato leek soup");
    }

    #[tokio::test]
    async fn adding_a_recipe_refreshes_menu_nutrition() {
        let bus = bus();
        let (_, menu_id, meal_id) = planned_lunch(&bus).await;

        let outcome = bus
            .handle_command(AddRecipe {
                meal_id: meal_id.clone(),
                author_id: "u1".into(),
                recipe: soup(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome.result, CommandResult::Recipe(_)));

        let menu = bus.repositories().menus.get(&menu_id).await.unwrap();
        assert_eq!(
            menu.meal_at(&lunch()).unwrap().nutri_facts.unwrap().calories,
            300.0
        );
        assert_eq!(menu.nutri_facts().unwrap().calories, 300.0);
    }

    #[tokio::test]
    async fn deleting_a_meal_clears_its_positions() {
        let bus = bus();
        let (_, menu_id, meal_id) = planned_lunch(&bus).await;
        bus.handle_command(AddMealToMenu {
            menu_id: menu_id.clone(),
            meal_id: meal_id.clone(),
            positions: vec![dinner()],
        })
        .await
        .unwrap();

        let outcome = bus.handle_command(DeleteMeal { meal_id }).await.unwrap();
        assert!(outcome.dispatch.is_clean());

        let menu = bus.repositories().menus.get(&menu_id).await.unwrap();
        assert!(menu.meals().is_empty());
    }

    #[tokio::test]
    async fn removing_the_last_position_detaches_the_meal() {
        let bus = bus();
        let (_, menu_id, meal_id) = planned_lunch(&bus).await;

        bus.handle_command(RemoveMealsFromMenu {
            menu_id,
            positions: vec![lunch(), dinner()],
        })
        .await
        .unwrap();

        let meal = bus.repositories().meals.get(&meal_id).await.unwrap();
        assert_eq!(meal.menu_id(), None);
    }

    #[tokio::test]
    async fn placing_a_meal_on_another_menu_moves_it() {
        let bus = bus();
        let (client_id, first, meal_id) = planned_lunch(&bus).await;
        bus.handle_command(CreateMenu {
            client_id,
            menu: NewClientMenu {
                id: Some("menu-2".into()),
                ..Default::default()
            },
        })
        .await
        .unwrap();
        let second = MenuId::from("menu-2");

        let outcome = bus
            .handle_command(AddMealToMenu {
                menu_id: second.clone(),
                meal_id: meal_id.clone(),
                positions: vec![dinner()],
            })
            .await
            .unwrap();
        assert!(outcome.dispatch.is_clean());

        let repos = bus.repositories();
        assert!(repos.menus.get(&first).await.unwrap().meals().is_empty());
        assert_eq!(
            repos.meals.get(&meal_id).await.unwrap().menu_id(),
            Some(&second)
        );

        bus.handle_command(DeleteMeal { meal_id }).await.unwrap();
        assert!(repos.menus.get(&first).await.unwrap().meals().is_empty());
        assert!(repos.menus.get(&second).await.unwrap().meals().is_empty());
    }

    #[tokio::test]
    async fn occupied_position_is_rejected() {
        let bus = bus();
        let (_, menu_id, _) = planned_lunch(&bus).await;
        let other = meal_id(&bus, NewMeal::new("Salad", "u1")).await;

        let err = bus
            .handle_command(AddMealToMenu {
                menu_id: menu_id.clone(),
                meal_id: other.clone(),
                positions: vec![lunch()],
            })
            .await
            .unwrap_err();
        assert_eq!(err.rule_kind(), Some(RuleKind::MenuPositionMustBeFree));

        let meal = bus.repositories().meals.get(&other).await.unwrap();
        assert_eq!(meal.menu_id(), None);
    }
}

mod recipes {
    use super::*;

    async fn meal_with_soup(bus: &MessageBus) -> (MealId, RecipeId) {
        let meal_id = meal_id(bus, NewMeal::new("Dinner", "u1").with_id("m1")).await;
        let outcome = bus
            .handle_command(AddRecipe {
                meal_id: meal_id.clone(),
                author_id: "u1".into(),
                recipe: soup(),
            })
            .await
            .unwrap();
        match outcome.result {
            CommandResult::Recipe(recipe_id) => (meal_id, recipe_id),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_author_is_rejected_and_nothing_is_stored() {
        let bus = bus();
        let (meal_id, _) = meal_with_soup(&bus).await;
        let before = bus.repositories().meals.get(&meal_id).await.unwrap();

        let err = bus
            .handle_command(AddRecipe {
                meal_id: meal_id.clone(),
                author_id: "u2".into(),
                recipe: soup(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.rule_kind(), Some(RuleKind::RecipeMustBelongToMeal));

        let after = bus.repositories().meals.get(&meal_id).await.unwrap();
        assert_eq!(after.version(), before.version());
        assert_eq!(after.recipes().count(), 1);
    }

    #[tokio::test]
    async fn rating_and_unrating() {
        let bus = bus();
        let (meal_id, recipe_id) = meal_with_soup(&bus).await;

        bus.handle_command(RateRecipe {
            meal_id: meal_id.clone(),
            rating: Rating::new("u7", recipe_id.clone(), 5, 3, None).unwrap(),
        })
        .await
        .unwrap();
        let meal = bus.repositories().meals.get(&meal_id).await.unwrap();
        assert_eq!(
            meal.recipe(&recipe_id).unwrap().average_taste_rating(),
            Some(5.0)
        );

        bus.handle_command(DeleteRecipeRating {
            meal_id: meal_id.clone(),
            recipe_id: recipe_id.clone(),
            user_id: "u7".into(),
        })
        .await
        .unwrap();
        let meal = bus.repositories().meals.get(&meal_id).await.unwrap();
        assert_eq!(meal.recipe(&recipe_id).unwrap().average_taste_rating(), None);
    }

    #[tokio::test]
    async fn removing_an_unknown_recipe_is_not_found() {
        let bus = bus();
        let (meal_id, _) = meal_with_soup(&bus).await;

        let err = bus
            .handle_command(RemoveRecipe {
                meal_id,
                recipe_id: "nope".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn copied_meal_belongs_to_the_new_author() {
        let bus = bus();
        let (meal_id, _) = meal_with_soup(&bus).await;

        let outcome = bus
            .handle_command(CopyMeal {
                meal_id,
                author_id: "u2".into(),
                menu_id: None,
            })
            .await
            .unwrap();
        let CommandResult::Meal(copy_id) = outcome.result else {
            panic!("expected a meal id");
        };

        let copy = bus.repositories().meals.get(&copy_id).await.unwrap();
        assert_eq!(copy.author_id().as_str(), "u2");
        assert_eq!(copy.total_time(), Some(30));
        assert!(copy.recipes().all(|recipe| recipe.ratings().is_empty()));
    }
}

mod menus_and_clients {
    use super::*;
    use domain::Aggregate;

    #[tokio::test]
    async fn deleting_a_menu_discards_it_and_detaches_meals() {
        let bus = bus();
        let (client_id, menu_id, meal_id) = planned_lunch(&bus).await;

        let outcome = bus
            .handle_command(DeleteMenu {
                client_id: client_id.clone(),
                menu_id: menu_id.clone(),
            })
            .await
            .unwrap();
        assert!(outcome.dispatch.is_clean());

        let repos = bus.repositories();
        assert!(repos.menus.get(&menu_id).await.unwrap_err().is_not_found());
        assert_eq!(repos.meals.get(&meal_id).await.unwrap().menu_id(), None);
        assert!(repos.clients.get(&client_id).await.unwrap().menus().is_empty());
    }

    #[tokio::test]
    async fn deleting_an_unknown_menu_is_not_found() {
        let bus = bus();
        let (client_id, _) = client_with_menu(&bus).await;

        let err = bus
            .handle_command(DeleteMenu {
                client_id,
                menu_id: "menu-9".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deleting_a_client_discards_every_menu() {
        let bus = bus();
        let (client_id, first_menu, meal_id) = planned_lunch(&bus).await;
        let second = bus
            .handle_command(CreateMenu {
                client_id: client_id.clone(),
                menu: NewClientMenu::default(),
            })
            .await
            .unwrap();
        let CommandResult::Menu(second_menu) = second.result else {
            panic!("expected a menu id");
        };

        bus.handle_command(DeleteClient {
            client_id: client_id.clone(),
        })
        .await
        .unwrap();

        let repos = bus.repositories();
        assert!(repos.clients.get(&client_id).await.is_err());
        assert!(repos.menus.get(&first_menu).await.is_err());
        assert!(repos.menus.get(&second_menu).await.is_err());
        assert_eq!(repos.meals.get(&meal_id).await.unwrap().menu_id(), None);
    }

    #[tokio::test]
    async fn updating_a_client_bumps_its_version() {
        let bus = bus();
        let (client_id, _) = client_with_menu(&bus).await;

        bus.handle_command(UpdateClient {
            client_id: client_id.clone(),
            update: domain::ClientUpdate {
                notes: Some("prefers soups".into()),
                ..Default::default()
            },
        })
        .await
        .unwrap();

        let mut client = bus.repositories().clients.get(&client_id).await.unwrap();
        assert_eq!(client.notes(), Some("prefers soups"));
        assert_eq!(client.version(), Version::new(3));
        assert!(client.collect_events().is_empty());
    }
}
