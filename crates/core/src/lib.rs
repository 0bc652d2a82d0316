//! Indexing and query engine for card realms.
//!
//! A realm is a tree of JSON card instances and the modules that declare
//! their types. [`index::SearchIndex`] walks a realm, resolves card
//! definitions across modules and realms, and answers structured queries.

pub mod card;
pub mod config;
pub mod index;
pub mod links;
pub mod loader;
pub mod module_syntax;
pub mod query;
pub mod realm;
pub mod types;
pub mod walk;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
