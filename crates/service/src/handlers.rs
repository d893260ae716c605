//! Command handlers.
//!
//! Each handler loads what it needs through the unit of work, calls one
//! aggregate operation and reports what it produced. Committing and event
//! dispatch are left to the message bus.

use common::{MealId, MenuId};
use domain::{Client, Entity, Meal, MenuMeal, MenuPosition, Recipe};

use crate::commands::*;
use crate::unit_of_work::UnitOfWork;
use crate::Result;

/// Runs `command` against `uow`.
pub(crate) async fn handle(command: Command, uow: &mut UnitOfWork) -> Result<CommandResult> {
    match command {
        Command::CreateMeal(cmd) => create_meal(cmd, uow),
        Command::CopyMeal(cmd) => copy_meal(cmd, uow).await,
        Command::UpdateMeal(cmd) => {
            let meal = uow.meals.get(&cmd.meal_id).await?;
            meal.update_properties(cmd.update)?;
            Ok(CommandResult::Done)
        }
        Command::AddRecipe(cmd) => add_recipe(cmd, uow).await,
        Command::UpdateRecipe(cmd) => {
            let meal = uow.meals.get(&cmd.meal_id).await?;
            meal.update_recipe(&cmd.recipe_id, cmd.update)?;
            Ok(CommandResult::Done)
        }
        Command::RemoveRecipe(cmd) => {
            let meal = uow.meals.get(&cmd.meal_id).await?;
            meal.remove_recipe(&cmd.recipe_id)?;
            Ok(CommandResult::Done)
        }
        Command::RateRecipe(cmd) => {
            let meal = uow.meals.get(&cmd.meal_id).await?;
            meal.rate_recipe(cmd.rating)?;
            Ok(CommandResult::Done)
        }
        Command::DeleteRecipeRating(cmd) => {
            let meal = uow.meals.get(&cmd.meal_id).await?;
            meal.delete_recipe_rating(&cmd.recipe_id, &cmd.user_id)?;
            Ok(CommandResult::Done)
        }
        Command::DeleteMeal(cmd) => {
            let meal = uow.meals.get(&cmd.meal_id).await?;
            meal.discard()?;
            Ok(CommandResult::Done)
        }
        Command::CreateClient(cmd) => {
            let client = uow.clients.add(Client::create(cmd.client)?)?;
            Ok(CommandResult::Client(client.id().clone()))
        }
        Command::UpdateClient(cmd) => {
            let client = uow.clients.get(&cmd.client_id).await?;
            client.update_properties(cmd.update)?;
            Ok(CommandResult::Done)
        }
        Command::DeleteClient(cmd) => {
            let client = uow.clients.get(&cmd.client_id).await?;
            client.discard()?;
            Ok(CommandResult::Done)
        }
        Command::CreateMenu(cmd) => {
            let client = uow.clients.get(&cmd.client_id).await?;
            let menu = client.create_menu(cmd.menu)?;
            let menu = uow.menus.add(menu)?;
            Ok(CommandResult::Menu(menu.id().clone()))
        }
        Command::DeleteMenu(cmd) => {
            let client = uow.clients.get(&cmd.client_id).await?;
            client.delete_menu(&cmd.menu_id)?;
            Ok(CommandResult::Done)
        }
        Command::AddMealToMenu(cmd) => add_meal_to_menu(cmd, uow).await,
        Command::RemoveMealsFromMenu(cmd) => {
            let menu = uow.menus.get(&cmd.menu_id).await?;
            menu.remove_meals(&cmd.positions)?;
            Ok(CommandResult::Done)
        }
    }
}

fn create_meal(cmd: CreateMeal, uow: &mut UnitOfWork) -> Result<CommandResult> {
    let meal = uow.meals.add(Meal::create(cmd.meal)?)?;
    Ok(CommandResult::Meal(meal.id().clone()))
}

async fn copy_meal(cmd: CopyMeal, uow: &mut UnitOfWork) -> Result<CommandResult> {
    let source = uow.meals.get(&cmd.meal_id).await?;
    let copy = Meal::copy_for(source, cmd.author_id, cmd.menu_id);
    let copy = uow.meals.add(copy)?;
    Ok(CommandResult::Meal(copy.id().clone()))
}

async fn add_recipe(cmd: AddRecipe, uow: &mut UnitOfWork) -> Result<CommandResult> {
    let meal = uow.meals.get(&cmd.meal_id).await?;
    let recipe = Recipe::create(cmd.meal_id, cmd.author_id, cmd.recipe)?;
    let recipe_id = recipe.id().clone();
    meal.add_recipe(recipe)?;
    Ok(CommandResult::Recipe(recipe_id))
}

/// Places a meal on a menu.
///
/// A meal lives on one menu at a time: placing it elsewhere clears its
/// positions on the previous menu and points it at the new one.
async fn add_meal_to_menu(cmd: AddMealToMenu, uow: &mut UnitOfWork) -> Result<CommandResult> {
    let meal = uow.meals.get(&cmd.meal_id).await?;
    meal.ensure_active()?;
    let name = meal.name().to_string();
    let nutri_facts = meal.nutri_facts();
    let previous = meal.menu_id().filter(|menu_id| **menu_id != cmd.menu_id).cloned();

    if let Some(previous) = previous {
        leave_menu(uow, &previous, &cmd.meal_id).await?;
        uow.meals
            .get(&cmd.meal_id)
            .await?
            .set_menu(Some(cmd.menu_id.clone()))?;
    }

    let placed = cmd
        .positions
        .into_iter()
        .map(|position| {
            MenuMeal::new(cmd.meal_id.clone(), name.clone(), position).with_nutri_facts(nutri_facts)
        })
        .collect();

    let menu = uow.menus.get(&cmd.menu_id).await?;
    menu.add_meals(placed)?;
    Ok(CommandResult::Done)
}

async fn leave_menu(uow: &mut UnitOfWork, menu_id: &MenuId, meal_id: &MealId) -> Result<()> {
    let menu = match uow.menus.get(menu_id).await {
        Ok(menu) => menu,
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err),
    };
    if menu.is_discarded() {
        return Ok(());
    }

    let positions: Vec<MenuPosition> = menu
        .meals_of(meal_id)
        .into_iter()
        .map(|placed| placed.position)
        .collect();
    menu.remove_meals(&positions)?;
    tracing::debug!(%menu_id, %meal_id, removed = positions.len(), "meal moved off menu");
    Ok(())
}
