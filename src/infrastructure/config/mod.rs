//! Configuration schema, validation, and distribution

pub mod manager;
pub mod schema;
pub mod validator;

pub use manager::{
    CompiledCacheProfile, ConfigManager, ConfigSubscriber, RuntimeConfig, CONFIG_KV_KEY,
};
pub use schema::{
    CacheConfig, CdnCgiConfig, DebugConfig, GatewayConfigDoc, LoggingConfig, OriginConfig,
    SourceConfig, VideoConfig,
};
pub use validator::validate;
