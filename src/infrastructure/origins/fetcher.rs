//! Source fetcher
//!
//! Two jobs per source variant: produce the URL the upstream
//! transformation service fetches the origin through, and fetch origin
//! bytes directly for the passthrough fallback. Auth is applied per
//! variant; header-based schemes only exist on the direct path because
//! the upstream service sees nothing but the URL.

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::presigner::{PresignedUrlCache, DEFAULT_PRESIGN_EXPIRES_SECONDS};
use crate::domain::entities::{AuthType, OriginMatch, Source, SourceAuth};
use crate::domain::services::resolve_template;
use crate::interfaces::external_services::ObjectStore;
use crate::shared::error::{GatewayError, ProcessingError, ResolutionError};

/// A pending presigned-URL refresh the caller should run in the background
#[derive(Debug, Clone)]
pub struct PresignRefresh {
    pub bucket_binding: String,
    pub key: String,
    pub expires_in_seconds: u64,
}

/// URL the upstream service can fetch the origin through
#[derive(Debug, Clone)]
pub struct ResolvedSourceUrl {
    pub url: String,
    pub presign_refresh: Option<PresignRefresh>,
}

/// Body of a directly-fetched origin response
pub enum SourceBody {
    Buffered(Bytes),
    Stream(BoxStream<'static, Result<Bytes, std::io::Error>>),
}

impl SourceBody {
    /// Buffers the whole body; used by the background cache writer
    pub async fn collect(self) -> Result<Bytes, ProcessingError> {
        match self {
            SourceBody::Buffered(bytes) => Ok(bytes),
            SourceBody::Stream(stream) => {
                let chunks: Vec<Bytes> = stream
                    .try_collect()
                    .await
                    .map_err(|e| ProcessingError::FetchFailed(e.to_string()))?;
                let mut out = Vec::new();
                for chunk in chunks {
                    out.extend_from_slice(&chunk);
                }
                Ok(Bytes::from(out))
            }
        }
    }
}

/// A directly-fetched origin response
pub struct SourceResponse {
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub body: SourceBody,
}

/// Fetches origin bytes across the source variants
#[derive(Clone)]
pub struct SourceFetcher {
    http: Client,
    object_store: Arc<dyn ObjectStore>,
    presigner: Arc<PresignedUrlCache>,
}

impl SourceFetcher {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        presigner: Arc<PresignedUrlCache>,
        timeout_seconds: u64,
    ) -> Result<Self, ProcessingError> {
        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(timeout_seconds))
                .build()
                .map_err(|e| ProcessingError::FetchFailed(e.to_string()))?,
            object_store,
            presigner,
        })
    }

    /// Resolves the source's path template and produces the URL handed
    /// to the upstream transformation service
    pub async fn resolve_source_url(
        &self,
        source: &Source,
        captures: &OriginMatch,
        request_path: &str,
    ) -> Result<ResolvedSourceUrl, GatewayError> {
        let path = resolve_template(source.path_template(), captures, request_path)?;

        match source {
            Source::R2 { bucket_binding, .. } => {
                if let Some(url) = self.object_store.public_url(bucket_binding, &path) {
                    return Ok(ResolvedSourceUrl {
                        url,
                        presign_refresh: None,
                    });
                }
                let signed = self
                    .presigner
                    .presigned_url(bucket_binding, &path, DEFAULT_PRESIGN_EXPIRES_SECONDS)
                    .await?;
                Ok(ResolvedSourceUrl {
                    url: signed.url,
                    presign_refresh: signed.needs_refresh.then(|| PresignRefresh {
                        bucket_binding: bucket_binding.clone(),
                        key: path,
                        expires_in_seconds: DEFAULT_PRESIGN_EXPIRES_SECONDS,
                    }),
                })
            }
            Source::Remote { url, auth, .. } | Source::Fallback { url, auth, .. } => {
                if auth.enabled && auth.auth_type == AuthType::AwsS3PresignedUrl {
                    let binding = auth.bucket_binding.as_deref().ok_or_else(|| {
                        ResolutionError::AuthMisconfigured(
                            "aws-s3-presigned-url auth requires a bucket binding".to_string(),
                        )
                    })?;
                    let expires = auth
                        .expires_in_seconds
                        .unwrap_or(DEFAULT_PRESIGN_EXPIRES_SECONDS);
                    let signed = self.presigner.presigned_url(binding, &path, expires).await?;
                    return Ok(ResolvedSourceUrl {
                        url: signed.url,
                        presign_refresh: signed.needs_refresh.then(|| PresignRefresh {
                            bucket_binding: binding.to_string(),
                            key: path,
                            expires_in_seconds: expires,
                        }),
                    });
                }

                let mut joined = join_url(url, &path);
                if auth.enabled && auth.auth_type == AuthType::TokenQuery {
                    let token = env_secret(auth)?;
                    let param = auth.query_param.as_deref().unwrap_or("token");
                    let separator = if joined.contains('?') { '&' } else { '?' };
                    joined.push(separator);
                    joined.push_str(&format!("{}={}", param, urlencoding::encode(&token)));
                }
                Ok(ResolvedSourceUrl {
                    url: joined,
                    presign_refresh: None,
                })
            }
        }
    }

    /// Re-signs a nearly-expired presigned URL; background refresh path
    pub async fn refresh_presigned(&self, refresh: &PresignRefresh) -> Result<(), ProcessingError> {
        self.presigner
            .refresh(
                &refresh.bucket_binding,
                &refresh.key,
                refresh.expires_in_seconds,
            )
            .await
    }

    /// Fetches the original bytes straight from the source, bypassing
    /// the transformation service
    pub async fn fetch_direct(
        &self,
        source: &Source,
        captures: &OriginMatch,
        request_path: &str,
    ) -> Result<SourceResponse, GatewayError> {
        let path = resolve_template(source.path_template(), captures, request_path)?;

        match source {
            Source::R2 { bucket_binding, .. } => {
                self.fetch_from_object_store(bucket_binding, &path).await
            }
            Source::Remote {
                url, headers, auth, ..
            } => {
                if auth.enabled
                    && matches!(auth.auth_type, AuthType::AwsS3 | AuthType::AwsS3PresignedUrl)
                {
                    let binding = auth.bucket_binding.as_deref().ok_or_else(|| {
                        ResolutionError::AuthMisconfigured(
                            "aws-s3 auth requires a bucket binding".to_string(),
                        )
                    })?;
                    return self.fetch_from_object_store(binding, &path).await;
                }
                self.fetch_http(url, &path, Some(headers), auth).await
            }
            Source::Fallback { url, auth, .. } => {
                if auth.enabled
                    && matches!(auth.auth_type, AuthType::AwsS3 | AuthType::AwsS3PresignedUrl)
                {
                    let binding = auth.bucket_binding.as_deref().ok_or_else(|| {
                        ResolutionError::AuthMisconfigured(
                            "aws-s3 auth requires a bucket binding".to_string(),
                        )
                    })?;
                    return self.fetch_from_object_store(binding, &path).await;
                }
                self.fetch_http(url, &path, None, auth).await
            }
        }
    }

    async fn fetch_from_object_store(
        &self,
        bucket_binding: &str,
        path: &str,
    ) -> Result<SourceResponse, GatewayError> {
        let object = self
            .object_store
            .fetch(bucket_binding, path)
            .await?
            .ok_or_else(|| GatewayError::NotFound(path.to_string()))?;

        Ok(SourceResponse {
            status: 200,
            content_type: object
                .content_type
                .unwrap_or_else(|| guess_content_type(path)),
            content_length: Some(object.bytes.len() as u64),
            etag: object.etag,
            body: SourceBody::Buffered(object.bytes),
        })
    }

    async fn fetch_http(
        &self,
        base_url: &str,
        path: &str,
        headers: Option<&std::collections::HashMap<String, String>>,
        auth: &SourceAuth,
    ) -> Result<SourceResponse, GatewayError> {
        let mut url = join_url(base_url, path);
        if auth.enabled && auth.auth_type == AuthType::TokenQuery {
            let token = env_secret(auth)?;
            let param = auth.query_param.as_deref().unwrap_or("token");
            let separator = if url.contains('?') { '&' } else { '?' };
            url.push(separator);
            url.push_str(&format!("{}={}", param, urlencoding::encode(&token)));
        }

        let mut request = self.http.get(&url);

        if let Some(headers) = headers {
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        if auth.enabled {
            match auth.auth_type {
                AuthType::Bearer => {
                    request = request.bearer_auth(env_secret(auth)?);
                }
                AuthType::Basic => {
                    let credentials = env_secret(auth)?;
                    let (user, password) = credentials.split_once(':').ok_or_else(|| {
                        ResolutionError::AuthMisconfigured(
                            "basic auth secret must be user:password".to_string(),
                        )
                    })?;
                    request = request.basic_auth(user, Some(password));
                }
                AuthType::Header => {
                    let name = auth.header_name.as_deref().ok_or_else(|| {
                        ResolutionError::AuthMisconfigured(
                            "header auth requires a header name".to_string(),
                        )
                    })?;
                    request = request.header(name, env_secret(auth)?);
                }
                AuthType::None
                | AuthType::TokenQuery
                | AuthType::AwsS3
                | AuthType::AwsS3PresignedUrl => {}
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Processing(e.into()))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(GatewayError::NotFound(path.to_string()));
        }
        if !(200..300).contains(&status) {
            return Err(GatewayError::Processing(ProcessingError::FetchFailed(
                format!("source returned {}", status),
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .unwrap_or_else(|| guess_content_type(path));
        let content_length = response.content_length();
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed();

        Ok(SourceResponse {
            status,
            content_type,
            content_length,
            etag,
            body: SourceBody::Stream(stream),
        })
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn guess_content_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn env_secret(auth: &SourceAuth) -> Result<String, ResolutionError> {
    let var = auth.token_var.as_deref().ok_or_else(|| {
        ResolutionError::AuthMisconfigured("auth enabled without a credential name".to_string())
    })?;
    std::env::var(var).map_err(|_| {
        ResolutionError::AuthMisconfigured(format!("credential env var '{}' is not set", var))
    })
}
