//! Per-instance memoisation of computed properties.
//!
//! Every entity that exposes derived values (nutrition totals, rating
//! averages, lookup tables) keeps them in a ledger struct with one [`Memo`]
//! slot per property. The ledger implements [`CacheLedger`] over a closed
//! property enum, so clearing a property is an exhaustive `match` and a new
//! slot cannot be added without also teaching the ledger how to clear it.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// A lazily computed value owned by exactly one entity instance.
///
/// The first read runs the compute function and stores its result; every
/// following read returns the same `Arc` until [`Memo::clear`] is called.
/// Cloning a `Memo` yields an empty slot: two copies of an entity never
/// share cached values, even when their state is identical at clone time.
pub struct Memo<T> {
    slot: OnceLock<Arc<T>>,
}

impl<T> Memo<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Returns the cached value, computing and storing it first if needed.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> Arc<T> {
        Arc::clone(self.slot.get_or_init(|| Arc::new(compute())))
    }

    /// Returns the cached value without computing it.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.get().cloned()
    }

    /// Returns true if a value is currently cached.
    pub fn is_computed(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Drops the cached value so the next read recomputes it.
    pub fn clear(&mut self) {
        self.slot.take();
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.get() {
            Some(value) => f.debug_tuple("Memo").field(value).finish(),
            None => f.write_str("Memo(<empty>)"),
        }
    }
}

/// The closed set of computed properties an entity exposes.
pub trait CachedProperty: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every property, in declaration order.
    const ALL: &'static [Self];

    /// Stable name used in logs.
    fn name(&self) -> &'static str;
}

/// Bookkeeping of which computed properties are currently materialised.
pub trait CacheLedger {
    /// The property enum this ledger covers.
    type Property: CachedProperty;

    /// Clears a single property slot.
    fn clear(&mut self, property: Self::Property);

    /// Returns true if the property currently holds a cached value.
    fn is_computed(&self, property: Self::Property) -> bool;

    /// Clears the named properties, leaving every other slot intact.
    fn invalidate(&mut self, properties: &[Self::Property]) {
        for property in properties {
            if self.is_computed(*property) {
                tracing::trace!(property = property.name(), "cached property invalidated");
            }
            self.clear(*property);
        }
    }

    /// Clears every slot of the ledger.
    fn invalidate_all(&mut self) {
        self.invalidate(Self::Property::ALL);
    }

    /// Returns the properties that currently hold a cached value.
    fn computed(&self) -> Vec<Self::Property> {
        Self::Property::ALL
            .iter()
            .copied()
            .filter(|property| self.is_computed(*property))
            .collect()
    }
}
