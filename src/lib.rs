//! VidGateD Library
//!
//! Edge video-transformation gateway. Exposes core modules for integration tests and as a library.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod presentation;
pub mod shared;
