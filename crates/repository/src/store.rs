use async_trait::async_trait;
use common::Version;
use domain::Aggregate;

use crate::{AggregateQuery, Result};

/// Core trait for aggregate repositories.
///
/// A repository hands out independent copies: every `get` returns a fresh
/// clone with empty caches, and nothing a caller does to that copy is visible
/// until it is persisted. All implementations must be thread-safe.
#[async_trait]
pub trait Repository<A: Aggregate>: Send + Sync {
    /// Loads an aggregate.
    ///
    /// Fails with `NotFound` if it is absent or discarded.
    async fn get(&self, id: &A::Id) -> Result<A>;

    /// Stores a new aggregate.
    ///
    /// Fails with `AlreadyExists` if the id is taken. Returns the stored
    /// version.
    async fn add(&self, aggregate: &A) -> Result<Version>;

    /// Stores the changes of a loaded aggregate.
    ///
    /// The stored version must still equal the version the aggregate was
    /// loaded at, otherwise the call fails with `ConcurrencyConflict`.
    /// Returns the stored version.
    async fn persist(&self, aggregate: &A) -> Result<Version>;

    /// Returns the aggregates matching `query`.
    async fn query(&self, query: AggregateQuery) -> Result<Vec<A>>;
}

/// Extension trait providing convenience methods for repositories.
#[async_trait]
pub trait RepositoryExt<A: Aggregate>: Repository<A> {
    /// Loads an aggregate, mapping `NotFound` to `None`.
    async fn find(&self, id: &A::Id) -> Result<Option<A>> {
        match self.get(id).await {
            Ok(aggregate) => Ok(Some(aggregate)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Checks if an active aggregate exists.
    async fn exists(&self, id: &A::Id) -> Result<bool> {
        Ok(self.find(id).await?.is_some())
    }
}

// Blanket implementation for all repositories
impl<A: Aggregate, T: Repository<A> + ?Sized> RepositoryExt<A> for T {}
