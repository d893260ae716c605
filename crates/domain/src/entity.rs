//! Entity and aggregate base.

use std::collections::VecDeque;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use common::{UserId, Version};
use serde::{Deserialize, Serialize};

use crate::cache::CacheLedger;
use crate::error::{DomainError, Result};
use crate::events::{DomainEvent, Event};
use crate::rules::{BusinessRule, check_rules};

/// Lifecycle of an entity.
///
/// ```text
/// Active ──discard──► Discarded
/// ```
///
/// `Discarded` is terminal: nothing revives an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Active,
    Discarded,
}

impl Lifecycle {
    /// Returns true if the entity still accepts mutations.
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

/// State every entity carries next to its own fields: version, lifecycle,
/// timestamps and the outgoing event queue.
#[derive(Debug, Clone)]
pub struct EntityBase {
    version: Version,
    committed_version: Version,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: VecDeque<Event>,
}

impl EntityBase {
    /// Creates the base of a freshly constructed entity at version 1.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: Version::first(),
            committed_version: Version::initial(),
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
            events: VecDeque::new(),
        }
    }

    /// Returns the current version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the version this instance was last stored at.
    ///
    /// `Version::initial()` means the entity has never been stored.
    pub fn committed_version(&self) -> Version {
        self.committed_version
    }

    /// Records that the current version has been stored.
    pub fn mark_committed(&mut self) {
        self.committed_version = self.version;
    }

    /// Returns the lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns true once the entity has been discarded.
    pub fn is_discarded(&self) -> bool {
        !self.lifecycle.is_active()
    }

    /// Returns when the entity was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the entity last changed.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Fails if the entity has been discarded.
    pub fn ensure_active(&self, entity: &'static str, id: &impl Display) -> Result<()> {
        if self.is_discarded() {
            return Err(DomainError::Discarded {
                entity,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Advances the version after a successful mutation.
    pub fn touch(&mut self) {
        self.version = self.version.next();
        self.updated_at = Utc::now();
    }

    /// Moves the entity to the terminal `Discarded` state.
    pub fn discard(&mut self) {
        self.lifecycle = Lifecycle::Discarded;
    }

    /// Appends an event to the outgoing queue.
    pub fn record(&mut self, event: Event) {
        tracing::debug!(event_type = event.event_type(), "domain event recorded");
        self.events.push_back(event);
    }

    /// Returns the queued events, oldest first.
    pub fn pending_events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Drains the outgoing queue in FIFO order.
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}

impl Default for EntityBase {
    fn default() -> Self {
        Self::new()
    }
}

/// An object with identity, a lifecycle and a cache ledger.
pub trait Entity {
    /// Identifier type.
    type Id: Clone + Eq + Hash + Display + Debug + Send + Sync + 'static;

    /// Cache ledger holding this entity's computed properties.
    type Ledger: CacheLedger;

    /// Entity type name, used in errors and logs.
    const ENTITY_TYPE: &'static str;

    /// Returns the entity's identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the shared entity state.
    fn base(&self) -> &EntityBase;

    /// Returns the shared entity state mutably.
    fn base_mut(&mut self) -> &mut EntityBase;

    /// Returns the cache ledger.
    fn ledger(&self) -> &Self::Ledger;

    /// Returns the cache ledger mutably.
    fn ledger_mut(&mut self) -> &mut Self::Ledger;

    /// Returns the current version.
    fn version(&self) -> Version {
        self.base().version()
    }

    /// Returns true once the entity has been discarded.
    fn is_discarded(&self) -> bool {
        self.base().is_discarded()
    }

    /// Fails with [`DomainError::Discarded`] if the entity was discarded.
    fn ensure_active(&self) -> Result<()> {
        self.base().ensure_active(Self::ENTITY_TYPE, self.id())
    }

    /// Runs one mutation under the entity protocol.
    ///
    /// In order: reject if discarded, check every rule (first violation
    /// aborts with no change), apply `change`, clear the cached properties in
    /// `invalidates`, advance the version. Events are recorded by the caller
    /// once the change has been applied.
    fn mutate<R>(
        &mut self,
        rules: impl IntoIterator<Item = BusinessRule>,
        invalidates: &[<Self::Ledger as CacheLedger>::Property],
        change: impl FnOnce(&mut Self) -> R,
    ) -> Result<R>
    where
        Self: Sized,
    {
        self.ensure_active()?;
        check_rules(rules)?;
        let output = change(self);
        self.ledger_mut().invalidate(invalidates);
        self.base_mut().touch();
        Ok(output)
    }
}

/// An aggregate root: the only entry point for mutating its cluster.
pub trait Aggregate: Entity + Clone + Debug + Send + Sync + 'static {
    /// Returns the author who owns the aggregate.
    fn author_id(&self) -> &UserId;

    /// Drains the events of the root and every owned entity.
    fn collect_events(&mut self) -> Vec<Event> {
        self.base_mut().take_events()
    }

    /// Returns true if any event is waiting to be collected.
    fn has_pending_events(&self) -> bool {
        self.base().pending_events().next().is_some()
    }
}
