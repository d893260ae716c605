//! Client aggregate and its value objects.

mod aggregate;
mod profile;

pub use aggregate::{Client, ClientCache, ClientProperty, ClientUpdate, NewClient, NewClientMenu};
pub use profile::{Address, ContactInfo, Profile};
