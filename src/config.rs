//! Configuration loader and schema types.
//!
//! This module exposes the settings schema and helpers to load it from a
//! TOML file and the environment.

mod load;
mod schema;

pub use load::{default_config_path, resolve_config_path};
pub use schema::*;

#[cfg(test)]
mod tests;
