//! Repository seam for the meal planning aggregates.
//!
//! - [`Repository`]: async load/add/persist/query, with optimistic concurrency
//! - [`InMemoryRepository`]: the storage used by the service layer and tests
//! - [`AggregateQuery`]: filter builder shared by every implementation

pub mod error;
pub mod memory;
pub mod query;
pub mod store;

pub use error::{RepositoryError, Result};
pub use memory::InMemoryRepository;
pub use query::{AggregateQuery, Queryable};
pub use store::{Repository, RepositoryExt};
