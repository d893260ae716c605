use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Version;
use domain::{Aggregate, Entity};
use tokio::sync::RwLock;

use crate::{AggregateQuery, Queryable, RepositoryError, Result, store::Repository};

struct Stored<A> {
    /// Insertion order, so queries return aggregates in the order they were added.
    seq: u64,
    aggregate: A,
}

struct Inner<A: Aggregate> {
    next_seq: u64,
    aggregates: HashMap<A::Id, Stored<A>>,
}

/// In-memory repository implementation.
///
/// Stores a committed copy of every aggregate. Copies never carry pending
/// events: those belong to the unit of work that produced them.
pub struct InMemoryRepository<A: Aggregate> {
    inner: Arc<RwLock<Inner<A>>>,
}

impl<A: Aggregate> Clone for InMemoryRepository<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Aggregate> Default for InMemoryRepository<A> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_seq: 0,
                aggregates: HashMap::new(),
            })),
        }
    }
}

impl<A: Aggregate> InMemoryRepository<A> {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored aggregates, discarded ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.aggregates.len()
    }

    /// Returns true if nothing was ever stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.aggregates.is_empty()
    }

    /// Returns the stored copy whatever its lifecycle, for inspection.
    pub async fn get_any(&self, id: &A::Id) -> Option<A> {
        self.inner
            .read()
            .await
            .aggregates
            .get(id)
            .map(|stored| stored.aggregate.clone())
    }

    /// Clears all aggregates.
    pub async fn clear(&self) {
        self.inner.write().await.aggregates.clear();
    }
}

/// Prepares the copy that gets stored.
fn committed_copy<A: Aggregate>(aggregate: &A) -> A {
    let mut copy = aggregate.clone();
    copy.collect_events();
    copy.base_mut().mark_committed();
    copy
}

#[async_trait]
impl<A: Queryable> Repository<A> for InMemoryRepository<A> {
    async fn get(&self, id: &A::Id) -> Result<A> {
        let inner = self.inner.read().await;
        match inner.aggregates.get(id) {
            Some(stored) if !stored.aggregate.is_discarded() => Ok(stored.aggregate.clone()),
            _ => Err(RepositoryError::not_found(A::ENTITY_TYPE, id)),
        }
    }

    async fn add(&self, aggregate: &A) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let id = aggregate.id().clone();
        if inner.aggregates.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists {
                aggregate_type: A::ENTITY_TYPE,
                id: id.to_string(),
            });
        }

        let version = aggregate.version();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.aggregates.insert(
            id,
            Stored {
                seq,
                aggregate: committed_copy(aggregate),
            },
        );

        tracing::debug!(aggregate_type = A::ENTITY_TYPE, id = %aggregate.id(), %version, "aggregate added");
        Ok(version)
    }

    async fn persist(&self, aggregate: &A) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .aggregates
            .get_mut(aggregate.id())
            .ok_or_else(|| RepositoryError::not_found(A::ENTITY_TYPE, aggregate.id()))?;

        let expected = aggregate.base().committed_version();
        let actual = stored.aggregate.version();
        if expected != actual {
            metrics::counter!("repository_conflicts_total", "aggregate" => A::ENTITY_TYPE)
                .increment(1);
            return Err(RepositoryError::ConcurrencyConflict {
                aggregate_type: A::ENTITY_TYPE,
                id: aggregate.id().to_string(),
                expected,
                actual,
            });
        }

        let version = aggregate.version();
        stored.aggregate = committed_copy(aggregate);

        tracing::debug!(aggregate_type = A::ENTITY_TYPE, id = %aggregate.id(), %version, "aggregate persisted");
        Ok(version)
    }

    async fn query(&self, query: AggregateQuery) -> Result<Vec<A>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&Stored<A>> = inner
            .aggregates
            .values()
            .filter(|stored| query.matches(&stored.aggregate))
            .collect();
        matching.sort_by_key(|stored| stored.seq);

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|stored| stored.aggregate.clone())
            .collect())
    }
}
