//! External service interfaces

pub mod object_store;

pub use object_store::{ObjectData, ObjectStore};
