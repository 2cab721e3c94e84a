//! Domain entities

pub mod derivative;
pub mod origin;
pub mod source;

pub use derivative::Derivative;
pub use origin::{Origin, OriginMatch, TtlPolicy};
pub use source::{AuthType, Source, SourceAuth, SourceKind};
