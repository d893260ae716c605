use common::{MenuId, UserId};
use domain::{Aggregate, Client, Meal, Menu};

/// Builder for constructing aggregate queries.
///
/// Every filter that is set must match. Discarded aggregates are left out
/// unless `include_discarded` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateQuery {
    /// Filter by id (any of these).
    pub ids: Option<Vec<String>>,

    /// Filter by author.
    pub author_id: Option<UserId>,

    /// Filter by the menu an aggregate points at.
    pub menu_id: Option<MenuId>,

    /// Also return discarded aggregates.
    pub include_discarded: bool,

    /// Maximum number of aggregates to return.
    pub limit: Option<usize>,

    /// Number of aggregates to skip.
    pub offset: Option<usize>,
}

impl AggregateQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for specific ids.
    pub fn for_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            ids: Some(ids.into_iter().map(|id| id.to_string()).collect()),
            ..Default::default()
        }
    }

    /// Filters by author.
    pub fn author(mut self, author_id: impl Into<UserId>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    /// Filters by menu.
    pub fn menu(mut self, menu_id: impl Into<MenuId>) -> Self {
        self.menu_id = Some(menu_id.into());
        self
    }

    /// Includes discarded aggregates.
    pub fn include_discarded(mut self) -> Self {
        self.include_discarded = true;
        self
    }

    /// Limits the number of aggregates returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many aggregates before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `aggregate` passes every filter.
    pub fn matches<A: Queryable>(&self, aggregate: &A) -> bool {
        if !self.include_discarded && aggregate.is_discarded() {
            return false;
        }
        if let Some(ref ids) = self.ids
            && !ids.iter().any(|id| *id == aggregate.id().to_string())
        {
            return false;
        }
        if let Some(ref author_id) = self.author_id
            && aggregate.author_id() != author_id
        {
            return false;
        }
        if let Some(ref menu_id) = self.menu_id
            && aggregate.menu_id() != Some(menu_id)
        {
            return false;
        }
        true
    }
}

/// Aggregate-specific fields a query can filter on.
pub trait Queryable: Aggregate {
    /// The menu the aggregate points at, for aggregates that point at one.
    fn menu_id(&self) -> Option<&MenuId> {
        None
    }
}

impl Queryable for Meal {
    fn menu_id(&self) -> Option<&MenuId> {
        Meal::menu_id(self)
    }
}

impl Queryable for Menu {}

impl Queryable for Client {}
