//! Origin backends
//!
//! The source fetcher, the S3-compatible object store adapter, and the
//! presigned URL cache.

pub mod fetcher;
pub mod presigner;
pub mod s3_object_store;

pub use fetcher::{
    PresignRefresh, ResolvedSourceUrl, SourceBody, SourceFetcher, SourceResponse,
};
pub use presigner::{PresignedUrl, PresignedUrlCache, DEFAULT_PRESIGN_EXPIRES_SECONDS};
pub use s3_object_store::{BucketBinding, S3ObjectStore};
