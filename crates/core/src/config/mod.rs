//! Configuration: TOML profiles naming a realm and how to index it.

pub mod loader;
pub mod types;
