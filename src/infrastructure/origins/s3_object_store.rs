//! S3-compatible object store adapter
//!
//! Wraps the `rust-s3` client over named bucket bindings. Credentials
//! come from process environment variables named in the binding config;
//! custom endpoints cover R2 and other S3-compatible stores.

use async_trait::async_trait;
use awsregion::Region;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use std::collections::HashMap;

use crate::interfaces::external_services::{ObjectData, ObjectStore};
use crate::shared::error::ProcessingError;

/// One configured bucket binding
#[derive(Debug, Clone)]
pub struct BucketBinding {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (R2, MinIO, …)
    pub endpoint: Option<String>,
    /// Env var names holding the credentials; anonymous when absent
    pub access_key_var: Option<String>,
    pub secret_key_var: Option<String>,
    /// Base URL for world-readable buckets
    pub public_base_url: Option<String>,
}

/// Object store over `rust-s3` buckets
pub struct S3ObjectStore {
    bindings: HashMap<String, BucketBinding>,
}

impl S3ObjectStore {
    pub fn new(bindings: HashMap<String, BucketBinding>) -> Self {
        Self { bindings }
    }

    fn binding(&self, name: &str) -> Result<&BucketBinding, ProcessingError> {
        self.bindings.get(name).ok_or_else(|| {
            ProcessingError::FetchFailed(format!("unknown bucket binding: {}", name))
        })
    }

    fn bucket(&self, name: &str) -> Result<Bucket, ProcessingError> {
        let binding = self.binding(name)?;

        let region = match &binding.endpoint {
            Some(endpoint) => Region::Custom {
                region: binding.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => binding
                .region
                .parse()
                .map_err(|e| ProcessingError::FetchFailed(format!("bad region: {}", e)))?,
        };

        let credentials = resolve_credentials(binding)?;

        let bucket = Bucket::new(&binding.bucket, region, credentials)
            .map_err(|e| ProcessingError::FetchFailed(format!("bucket setup failed: {}", e)))?;

        // Path-style addressing for custom endpoints
        Ok(if binding.endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

fn resolve_credentials(binding: &BucketBinding) -> Result<Credentials, ProcessingError> {
    let access_key = binding
        .access_key_var
        .as_deref()
        .and_then(|var| std::env::var(var).ok());
    let secret_key = binding
        .secret_key_var
        .as_deref()
        .and_then(|var| std::env::var(var).ok());

    match (access_key, secret_key) {
        (Some(access), Some(secret)) => {
            Credentials::new(Some(&access), Some(&secret), None, None, None)
                .map_err(|e| ProcessingError::FetchFailed(format!("credentials error: {}", e)))
        }
        _ => Credentials::anonymous()
            .map_err(|e| ProcessingError::FetchFailed(format!("credentials error: {}", e))),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(
        &self,
        bucket_binding: &str,
        key: &str,
    ) -> Result<Option<ObjectData>, ProcessingError> {
        let bucket = self.bucket(bucket_binding)?;
        let key = key.trim_start_matches('/');

        let response = bucket
            .get_object(key)
            .await
            .map_err(|e| ProcessingError::FetchFailed(format!("object fetch failed: {}", e)))?;

        match response.status_code() {
            200 => Ok(Some(ObjectData {
                bytes: Bytes::from(response.bytes().to_vec()),
                content_type: mime_guess::from_path(key)
                    .first()
                    .map(|m| m.essence_str().to_string()),
                etag: None,
            })),
            404 => Ok(None),
            status => Err(ProcessingError::FetchFailed(format!(
                "object store returned {} for {}/{}",
                status, bucket_binding, key
            ))),
        }
    }

    async fn presign_get(
        &self,
        bucket_binding: &str,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<String, ProcessingError> {
        let bucket = self.bucket(bucket_binding)?;
        let key = key.trim_start_matches('/');

        bucket
            .presign_get(key, expires_in_seconds as u32, None)
            .map_err(|e| ProcessingError::FetchFailed(format!("presign failed: {}", e)))
    }

    fn public_url(&self, bucket_binding: &str, key: &str) -> Option<String> {
        let binding = self.bindings.get(bucket_binding)?;
        let base = binding.public_base_url.as_deref()?;
        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            key.trim_start_matches('/')
        ))
    }
}
