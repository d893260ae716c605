//! Tags, privacy and the acting user.

use std::collections::BTreeSet;

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::rules::{BusinessRule, check_rule};

/// Visibility of a tag or recipe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Privacy {
    #[default]
    Private,
    Public,
}

/// Which kind of aggregate a tag classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagType {
    Meal,
    Recipe,
    Menu,
    Client,
}

/// Role held by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Administrator,
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub roles: BTreeSet<Role>,
}

impl User {
    /// Creates a user holding the plain `User` role.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::from([Role::User]),
        }
    }

    /// Creates a user holding the administrator role.
    pub fn administrator(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::from([Role::User, Role::Administrator]),
        }
    }

    /// Returns true if the user may act as an administrator.
    pub fn is_administrator(&self) -> bool {
        self.roles.contains(&Role::Administrator)
    }
}

/// A key/value label owned by an author.
///
/// Tags are value objects: two tags with the same fields are the same tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
    pub author_id: UserId,
    pub tag_type: TagType,
    #[serde(default)]
    pub privacy: Privacy,
}

impl Tag {
    /// Creates a private tag.
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        author_id: impl Into<UserId>,
        tag_type: TagType,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            author_id: author_id.into(),
            tag_type,
            privacy: Privacy::Private,
        }
    }

    /// Creates a tag authored by `user`, enforcing who may publish public tags.
    pub fn create(
        key: impl Into<String>,
        value: impl Into<String>,
        tag_type: TagType,
        privacy: Privacy,
        user: &User,
    ) -> Result<Self, DomainError> {
        check_rule(BusinessRule::OnlyAdministratorCanCreatePublicTag {
            privacy,
            is_administrator: user.is_administrator(),
        })?;

        Ok(Self {
            privacy,
            ..Self::new(key, value, user.id.clone(), tag_type)
        })
    }

    /// Returns a private copy of this tag owned by another author.
    pub fn with_author(&self, author_id: UserId) -> Self {
        Self {
            author_id,
            privacy: Privacy::Private,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;

    #[test]
    fn regular_user_can_create_private_tag() {
        let user = User::new("u1");
        let tag = Tag::create("diet", "vegan", TagType::Meal, Privacy::Private, &user).unwrap();
        assert_eq!(tag.author_id, UserId::from("u1"));
        assert_eq!(tag.privacy, Privacy::Private);
    }

    #[test]
    fn regular_user_cannot_create_public_tag() {
        let user = User::new("u1");
        let err = Tag::create("diet", "vegan", TagType::Meal, Privacy::Public, &user).unwrap_err();
        assert!(matches!(
            err,
            DomainError::RuleViolation(ref v) if v.kind == RuleKind::OnlyAdministratorCanCreatePublicTag
        ));
    }

    #[test]
    fn administrator_can_create_public_tag() {
        let admin = User::administrator("admin");
        let tag = Tag::create("cuisine", "thai", TagType::Recipe, Privacy::Public, &admin).unwrap();
        assert_eq!(tag.privacy, Privacy::Public);
    }

    #[test]
    fn with_author_keeps_key_and_value() {
        let tag = Tag::new("diet", "vegan", "u1", TagType::Meal);
        let copy = tag.with_author(UserId::from("u2"));
        assert_eq!(copy.key, "diet");
        assert_eq!(copy.value, "vegan");
        assert_eq!(copy.author_id, UserId::from("u2"));
    }

    #[test]
    fn with_author_drops_public_privacy() {
        let admin = User::administrator("admin");
        let tag = Tag::create("cuisine", "thai", TagType::Recipe, Privacy::Public, &admin).unwrap();
        let copy = tag.with_author(UserId::from("u2"));
        assert_eq!(copy.privacy, Privacy::Private);
    }

    #[test]
    fn tag_serialization_defaults_privacy() {
        let json = r#"{"key":"k","value":"v","author_id":"u1","tag_type":"Menu"}"#;
        let tag: Tag = serde_json::from_str(json).unwrap();
        assert_eq!(tag.privacy, Privacy::Private);
    }
}
