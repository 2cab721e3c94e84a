//! Application services

pub mod error_recovery;

pub use error_recovery::{RecoveryHeaders, RecoveryOutcome};
