//! Repository traits
//!
//! Storage interfaces implemented by the infrastructure layer.

pub mod kv_store;

pub use kv_store::{KvStore, KvValue};
