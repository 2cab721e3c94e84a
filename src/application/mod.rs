//! Application layer

pub mod context;
pub mod services;
pub mod use_cases;

pub use context::{DebugFlags, RequestContext, StreamHandle};
pub use use_cases::transform_video::TransformVideoUseCase;
