//! Client aggregate implementation.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{ClientId, MenuId, UserId};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheLedger, CachedProperty, Memo};
use crate::entity::{Aggregate, Entity, EntityBase};
use crate::error::{DomainError, Result};
use crate::events::Event;
use crate::menu::{Menu, MenuMeal, NewMenu};
use crate::rules::{BusinessRule, check_rules};
use crate::tag::{Tag, User};

use super::{Address, ContactInfo, Profile};

/// Input for creating a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    /// Identifier to use; a fresh one is generated when absent.
    pub id: Option<ClientId>,
    pub author_id: UserId,
    pub profile: Profile,
    pub contact_info: Option<ContactInfo>,
    pub address: Option<Address>,
    pub notes: Option<String>,
    pub tags: BTreeSet<Tag>,
}

impl NewClient {
    pub fn new(author_id: impl Into<UserId>, profile: Profile) -> Self {
        Self {
            author_id: author_id.into(),
            profile,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<ClientId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }
}

/// Partial update of a client. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub profile: Option<Profile>,
    pub contact_info: Option<ContactInfo>,
    pub address: Option<Address>,
    pub notes: Option<String>,
}

/// Input for a menu created through its client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewClientMenu {
    pub id: Option<MenuId>,
    pub description: Option<String>,
    pub tags: BTreeSet<Tag>,
    pub meals: Vec<MenuMeal>,
}

/// Computed properties of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProperty {
    MenuIds,
}

impl CachedProperty for ClientProperty {
    const ALL: &'static [Self] = &[ClientProperty::MenuIds];

    fn name(&self) -> &'static str {
        match self {
            ClientProperty::MenuIds => "menu_ids",
        }
    }
}

/// Cache ledger of a client.
#[derive(Debug, Clone, Default)]
pub struct ClientCache {
    pub(crate) menu_ids: Memo<BTreeSet<MenuId>>,
}

impl CacheLedger for ClientCache {
    type Property = ClientProperty;

    fn clear(&mut self, property: ClientProperty) {
        match property {
            ClientProperty::MenuIds => self.menu_ids.clear(),
        }
    }

    fn is_computed(&self, property: ClientProperty) -> bool {
        match property {
            ClientProperty::MenuIds => self.menu_ids.is_computed(),
        }
    }
}

/// Client aggregate root.
///
/// A client references its menus by id; it creates them but does not own
/// them.
#[derive(Debug, Clone)]
pub struct Client {
    id: ClientId,
    author_id: UserId,
    profile: Profile,
    contact_info: Option<ContactInfo>,
    address: Option<Address>,
    notes: Option<String>,
    tags: BTreeSet<Tag>,
    menus: Vec<MenuId>,
    base: EntityBase,
    cache: ClientCache,
}

impl Entity for Client {
    type Id = ClientId;
    type Ledger = ClientCache;

    const ENTITY_TYPE: &'static str = "Client";

    fn id(&self) -> &ClientId {
        &self.id
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn ledger(&self) -> &ClientCache {
        &self.cache
    }

    fn ledger_mut(&mut self) -> &mut ClientCache {
        &mut self.cache
    }
}

impl Aggregate for Client {
    fn author_id(&self) -> &UserId {
        &self.author_id
    }
}

impl Client {
    pub fn create(new: NewClient) -> Result<Self> {
        let NewClient {
            id,
            author_id,
            profile,
            contact_info,
            address,
            notes,
            tags,
        } = new;

        check_rules(tags.iter().map(|tag| BusinessRule::tag_author(tag, &author_id)))?;

        let client = Self {
            id: id.unwrap_or_default(),
            author_id,
            profile,
            contact_info,
            address,
            notes,
            tags,
            menus: Vec::new(),
            base: EntityBase::new(),
            cache: ClientCache::default(),
        };
        tracing::debug!(client_id = %client.id, "client created");
        Ok(client)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn contact_info(&self) -> Option<&ContactInfo> {
        self.contact_info.as_ref()
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    /// Menus in the order they were created.
    pub fn menus(&self) -> &[MenuId] {
        &self.menus
    }

    pub fn menu_ids(&self) -> Arc<BTreeSet<MenuId>> {
        self.cache
            .menu_ids
            .get_or_compute(|| self.menus.iter().cloned().collect())
    }

    pub fn has_menu(&self, menu_id: &MenuId) -> bool {
        self.menu_ids().contains(menu_id)
    }

    /// Creates a menu for this client and starts referencing it.
    ///
    /// The menu's tags must belong to the client's author. The returned menu
    /// still has to be added to its repository by the caller.
    pub fn create_menu(&mut self, new: NewClientMenu) -> Result<Menu> {
        self.ensure_active()?;
        check_rules(
            new.tags
                .iter()
                .map(|tag| BusinessRule::tag_author(tag, &self.author_id)),
        )?;

        let menu = Menu::create(NewMenu {
            id: new.id,
            author_id: self.author_id.clone(),
            client_id: self.id.clone(),
            description: new.description,
            tags: new.tags,
            meals: new.meals,
        })?;

        let menu_id = menu.id().clone();
        self.mutate([], &[ClientProperty::MenuIds], |client| {
            client.menus.push(menu_id)
        })?;
        Ok(menu)
    }

    /// Stops referencing a menu and records `ClientMenuDeleted` so the menu
    /// itself gets discarded.
    pub fn delete_menu(&mut self, menu_id: &MenuId) -> Result<()> {
        self.ensure_active()?;
        if !self.has_menu(menu_id) {
            return Err(DomainError::not_found(Menu::ENTITY_TYPE, menu_id));
        }

        self.mutate([], &[ClientProperty::MenuIds], |client| {
            client.menus.retain(|id| id != menu_id)
        })?;
        self.base
            .record(Event::client_menu_deleted(self.id.clone(), menu_id.clone()));
        Ok(())
    }

    /// Drops a reference to a menu that no longer exists.
    ///
    /// Returns `false` when the client did not reference it.
    pub fn forget_menu(&mut self, menu_id: &MenuId) -> Result<bool> {
        self.ensure_active()?;
        if !self.has_menu(menu_id) {
            return Ok(false);
        }

        self.mutate([], &[ClientProperty::MenuIds], |client| {
            client.menus.retain(|id| id != menu_id);
            true
        })
    }

    pub fn update_properties(&mut self, update: ClientUpdate) -> Result<()> {
        self.mutate([], &[], |client| {
            let ClientUpdate {
                profile,
                contact_info,
                address,
                notes,
            } = update;

            if let Some(profile) = profile {
                client.profile = profile;
            }
            if let Some(contact_info) = contact_info {
                client.contact_info = Some(contact_info);
            }
            if let Some(address) = address {
                client.address = Some(address);
            }
            if let Some(notes) = notes {
                client.notes = Some(notes);
            }
        })
    }

    /// Tags the client on behalf of `user`.
    pub fn add_tag(&mut self, tag: Tag, user: &User) -> Result<()> {
        let rules = [
            BusinessRule::tag_author(&tag, &self.author_id),
            BusinessRule::public_tag(&tag, user),
        ];
        self.mutate(rules, &[], |client| {
            client.tags.insert(tag);
        })
    }

    /// Removes a tag; returns `false` if the client did not carry it.
    pub fn remove_tag(&mut self, tag: &Tag) -> Result<bool> {
        self.ensure_active()?;
        if !self.tags.contains(tag) {
            return Ok(false);
        }
        self.mutate([], &[], |client| client.tags.remove(tag))
    }

    /// Discards the client, recording `ClientDeleted` with its menus.
    pub fn discard(&mut self) -> Result<()> {
        self.mutate([], ClientProperty::ALL, |client| client.base.discard())?;
        self.base
            .record(Event::client_deleted(self.id.clone(), self.menus.clone()));

        tracing::debug!(client_id = %self.id, "client discarded");
        Ok(())
    }
}
