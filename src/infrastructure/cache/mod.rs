//! KV cache infrastructure
//!
//! Key derivation, the in-memory store, version counters, and the
//! chunked content cache.

pub mod cache_key;
pub mod in_memory_kv;
pub mod version_store;
pub mod video_cache;

pub use in_memory_kv::InMemoryKvStore;
pub use version_store::{VersionStore, INITIAL_VERSION};
pub use video_cache::{
    CacheHit, CacheMetadata, CachePolicy, ChunkManifest, VideoCache, DEFAULT_CHUNK_SIZE,
    DEFAULT_INLINE_THRESHOLD,
};
