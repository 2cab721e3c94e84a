//! Interface layer
//!
//! Traits that decouple the application from external collaborators.

pub mod external_services;
