//! Pure domain services
//!
//! Options resolution, origin matching, and path templating. None of
//! these suspend; they operate on a config snapshot handed in by the
//! caller.

pub mod options_resolver;
pub mod origin_resolver;
pub mod path_template;

pub use options_resolver::{OptionsResolver, DEFAULT_IMQUERY_TOLERANCE};
pub use origin_resolver::{next_source, resolve_origin, ExclusionSet, ResolvedOrigin};
pub use path_template::resolve_template;
