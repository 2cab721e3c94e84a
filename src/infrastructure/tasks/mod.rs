//! Background task infrastructure

pub mod scheduler;

pub use scheduler::{BackgroundScheduler, DEFAULT_TASK_LIFETIME_SECONDS};
