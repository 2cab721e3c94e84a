//! Use cases

pub mod transform_video;

pub use transform_video::{CacheStatus, GatewayResponse, ResponseBody, TransformVideoUseCase};
