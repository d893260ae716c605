use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares an opaque, string-backed identifier.
///
/// Identifiers are compared by value and never parsed: any string handed
/// in by a caller is accepted as-is, while `new()` mints a fresh UUID v4.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a meal aggregate.
    MealId
);

string_id!(
    /// Unique identifier for a recipe owned by a meal.
    RecipeId
);

string_id!(
    /// Unique identifier for a menu aggregate.
    MenuId
);

string_id!(
    /// Unique identifier for a client aggregate.
    ClientId
);

string_id!(
    /// Identifier of a user acting as author, rater or administrator.
    UserId
);
