//! Commands accepted by the message bus.

use common::{ClientId, MealId, MenuId, RecipeId, UserId};
use domain::{
    ClientUpdate, MealUpdate, MenuPosition, NewClient, NewClientMenu, NewMeal, NewRecipe, Rating,
    RecipeUpdate,
};
use serde::{Deserialize, Serialize};

/// Command to create a meal, optionally already placed on a menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMeal {
    pub meal: NewMeal,
}

/// Command to copy someone's meal into a new author's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyMeal {
    /// The meal to copy.
    pub meal_id: MealId,

    /// The author who receives the copy.
    pub author_id: UserId,

    /// Menu the copy is placed on, if any.
    pub menu_id: Option<MenuId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMeal {
    pub meal_id: MealId,
    pub update: MealUpdate,
}

/// Command to add a new recipe to a meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRecipe {
    pub meal_id: MealId,

    /// The user writing the recipe; must be the meal's author.
    pub author_id: UserId,

    pub recipe: NewRecipe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecipe {
    pub meal_id: MealId,
    pub recipe_id: RecipeId,
    pub update: RecipeUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRecipe {
    pub meal_id: MealId,
    pub recipe_id: RecipeId,
}

/// Command to rate a recipe. A second rating by the same user replaces the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecipe {
    pub meal_id: MealId,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecipeRating {
    pub meal_id: MealId,
    pub recipe_id: RecipeId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMeal {
    pub meal_id: MealId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClient {
    pub client: NewClient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateClient {
    pub client_id: ClientId,
    pub update: ClientUpdate,
}

/// Command to discard a client; its menus follow through events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteClient {
    pub client_id: ClientId,
}

/// Command to create a menu for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMenu {
    pub client_id: ClientId,
    pub menu: NewClientMenu,
}

/// Command to delete one of a client's menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMenu {
    pub client_id: ClientId,
    pub menu_id: MenuId,
}

/// Command to place an existing meal on a menu.
///
/// The menu stores a snapshot of the meal's name and nutrition at every
/// position; the meal is attached to the menu afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMealToMenu {
    pub menu_id: MenuId,
    pub meal_id: MealId,
    pub positions: Vec<MenuPosition>,
}

/// Command to clear positions on a menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMealsFromMenu {
    pub menu_id: MenuId,
    pub positions: Vec<MenuPosition>,
}

macro_rules! commands {
    ($($name:ident),* $(,)?) => {
        /// Any command the message bus can handle.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type", content = "data")]
        pub enum Command {
            $($name($name),)*
        }

        impl Command {
            /// Returns the command name, used in logs and metrics.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Command::$name(_) => stringify!($name),)*
                }
            }
        }

        $(
            impl From<$name> for Command {
                fn from(command: $name) -> Self {
                    Command::$name(command)
                }
            }
        )*
    };
}

commands!(
    CreateMeal,
    CopyMeal,
    UpdateMeal,
    AddRecipe,
    UpdateRecipe,
    RemoveRecipe,
    RateRecipe,
    DeleteRecipeRating,
    DeleteMeal,
    CreateClient,
    UpdateClient,
    DeleteClient,
    CreateMenu,
    DeleteMenu,
    AddMealToMenu,
    RemoveMealsFromMenu,
);

/// What a handled command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Meal(MealId),
    Recipe(RecipeId),
    Menu(MenuId),
    Client(ClientId),
    /// The command changed existing state and returns nothing.
    Done,
}
