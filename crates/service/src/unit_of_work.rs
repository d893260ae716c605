//! Unit of work: one identity map per aggregate type.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use domain::{Aggregate, Client, Entity, Event, Meal, Menu};
use repository::{AggregateQuery, InMemoryRepository, Queryable, Repository, RepositoryError};

use crate::Result;

/// The repositories a unit of work loads from and commits to.
#[derive(Clone)]
pub struct Repositories {
    pub meals: Arc<dyn Repository<Meal>>,
    pub menus: Arc<dyn Repository<Menu>>,
    pub clients: Arc<dyn Repository<Client>>,
}

impl Repositories {
    /// Creates a set of empty in-memory repositories.
    pub fn in_memory() -> Self {
        Self {
            meals: Arc::new(InMemoryRepository::<Meal>::new()),
            menus: Arc::new(InMemoryRepository::<Menu>::new()),
            clients: Arc::new(InMemoryRepository::<Client>::new()),
        }
    }
}

struct Tracked<A> {
    aggregate: A,
    is_new: bool,
}

/// Identity map over one repository.
///
/// Each aggregate is loaded at most once; every later access returns the
/// same in-memory copy, so all mutations within the unit of work land on it.
pub struct TrackingRepository<A: Queryable> {
    inner: Arc<dyn Repository<A>>,
    seen: HashMap<A::Id, Tracked<A>>,
    order: Vec<A::Id>,
}

impl<A: Queryable> TrackingRepository<A> {
    pub fn new(inner: Arc<dyn Repository<A>>) -> Self {
        Self {
            inner,
            seen: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Returns the tracked copy, loading it on first access.
    pub async fn get(&mut self, id: &A::Id) -> Result<&mut A> {
        match self.seen.entry(id.clone()) {
            Entry::Occupied(entry) => Ok(&mut entry.into_mut().aggregate),
            Entry::Vacant(entry) => {
                let aggregate = self.inner.get(id).await?;
                self.order.push(id.clone());
                let tracked = entry.insert(Tracked {
                    aggregate,
                    is_new: false,
                });
                Ok(&mut tracked.aggregate)
            }
        }
    }

    /// Starts tracking a newly created aggregate; it is added on commit.
    pub fn add(&mut self, aggregate: A) -> Result<&mut A> {
        match self.seen.entry(aggregate.id().clone()) {
            Entry::Occupied(_) => Err(RepositoryError::AlreadyExists {
                aggregate_type: A::ENTITY_TYPE,
                id: aggregate.id().to_string(),
            }
            .into()),
            Entry::Vacant(entry) => {
                self.order.push(aggregate.id().clone());
                let tracked = entry.insert(Tracked {
                    aggregate,
                    is_new: true,
                });
                Ok(&mut tracked.aggregate)
            }
        }
    }

    /// Returns the ids of the aggregates matching `query`.
    ///
    /// Matches are tracked. Copies already tracked are kept as they are and
    /// must still match in their current state. Tracked copies that match only
    /// in their current state, such as new aggregates, follow the stored
    /// matches in tracking order; `offset` and `limit` page the stored matches
    /// only.
    pub async fn query(&mut self, query: AggregateQuery) -> Result<Vec<A::Id>> {
        let loaded = self.inner.query(query.clone()).await?;
        let mut ids = Vec::with_capacity(loaded.len());
        for aggregate in loaded {
            let id = aggregate.id().clone();
            match self.seen.entry(id.clone()) {
                Entry::Occupied(entry) => {
                    if !query.matches(&entry.get().aggregate) {
                        continue;
                    }
                }
                Entry::Vacant(entry) => {
                    self.order.push(id.clone());
                    entry.insert(Tracked {
                        aggregate,
                        is_new: false,
                    });
                }
            }
            ids.push(id);
        }

        for id in &self.order {
            if ids.contains(id) {
                continue;
            }
            if let Some(tracked) = self.seen.get(id)
                && query.matches(&tracked.aggregate)
            {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    /// Returns the number of tracked aggregates.
    pub fn tracked(&self) -> usize {
        self.order.len()
    }

    /// Adds new aggregates and persists changed ones, in tracking order.
    async fn commit(&mut self) -> Result<()> {
        for id in &self.order {
            let Some(tracked) = self.seen.get_mut(id) else {
                continue;
            };
            let base = tracked.aggregate.base();
            if tracked.is_new {
                self.inner.add(&tracked.aggregate).await?;
            } else if base.version() != base.committed_version() {
                self.inner.persist(&tracked.aggregate).await?;
            } else {
                continue;
            }
            tracked.aggregate.base_mut().mark_committed();
            tracked.is_new = false;
        }
        Ok(())
    }

    fn collect_events(&mut self, events: &mut Vec<Event>) {
        for id in &self.order {
            if let Some(tracked) = self.seen.get_mut(id) {
                events.extend(tracked.aggregate.collect_events());
            }
        }
    }

    fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

/// Scope of one command or event handler invocation.
///
/// Handlers load and create aggregates through the tracking repositories;
/// the message bus commits the unit of work and collects its events.
pub struct UnitOfWork {
    pub meals: TrackingRepository<Meal>,
    pub menus: TrackingRepository<Menu>,
    pub clients: TrackingRepository<Client>,
}

impl UnitOfWork {
    /// Opens a unit of work over `repositories`.
    pub fn begin(repositories: &Repositories) -> Self {
        Self {
            meals: TrackingRepository::new(Arc::clone(&repositories.meals)),
            menus: TrackingRepository::new(Arc::clone(&repositories.menus)),
            clients: TrackingRepository::new(Arc::clone(&repositories.clients)),
        }
    }

    /// Stores every new or changed aggregate.
    ///
    /// Stops at the first failure; aggregates stored before it stay stored.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&mut self) -> Result<()> {
        self.meals.commit().await?;
        self.menus.commit().await?;
        self.clients.commit().await?;
        Ok(())
    }

    /// Drops every tracked aggregate together with its pending events.
    pub fn rollback(&mut self) {
        self.meals.clear();
        self.menus.clear();
        self.clients.clear();
    }

    /// Drains the pending events of every tracked aggregate.
    ///
    /// Meals come first, then menus, then clients. Events of one entity keep
    /// the order they were recorded in.
    pub fn collect_new_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.meals.collect_events(&mut events);
        self.menus.collect_events(&mut events);
        self.clients.collect_events(&mut events);
        events
    }
}
