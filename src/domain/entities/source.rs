//! Source entity
//!
//! A concrete backend an origin can serve from. The closed variant set
//! replaces runtime polymorphism: callers dispatch by match, and
//! authentication is a per-variant field rather than a side table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Authentication scheme for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    None,
    AwsS3,
    AwsS3PresignedUrl,
    Bearer,
    Basic,
    TokenQuery,
    Header,
}

impl Default for AuthType {
    fn default() -> Self {
        AuthType::None
    }
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::AwsS3 => "aws-s3",
            AuthType::AwsS3PresignedUrl => "aws-s3-presigned-url",
            AuthType::Bearer => "bearer",
            AuthType::Basic => "basic",
            AuthType::TokenQuery => "token-query",
            AuthType::Header => "header",
        }
    }
}

/// Source authentication. Credential fields name process-level secrets
/// (environment variables) resolved by the host, never literal values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceAuth {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// Env var holding the access key id (aws-s3 variants)
    pub access_key_var: Option<String>,
    /// Env var holding the secret access key (aws-s3 variants)
    pub secret_key_var: Option<String>,
    /// Env var holding the token (bearer / basic / token-query / header)
    pub token_var: Option<String>,
    pub region: Option<String>,
    pub service: Option<String>,
    /// Bucket binding used by the aws-s3 variants to route through the
    /// object-store client
    pub bucket_binding: Option<String>,
    pub expires_in_seconds: Option<u64>,
    /// Header name for `header` auth
    pub header_name: Option<String>,
    /// Query parameter name for `token-query` auth
    pub query_param: Option<String>,
}

impl SourceAuth {
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Kind tag used in exclusion sets and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    R2,
    Remote,
    Fallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::R2 => "r2",
            SourceKind::Remote => "remote",
            SourceKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete backend with auth and a path template.
///
/// Path templates contain `${name}` references substituted from origin
/// captures plus the literal `${request_path}` token.
#[derive(Debug, Clone)]
pub enum Source {
    /// Object-store bucket reachable through the S3-compatible client
    R2 {
        bucket_binding: String,
        path: String,
        priority: i32,
    },
    /// Remote HTTP backend
    Remote {
        url: String,
        path: String,
        headers: HashMap<String, String>,
        auth: SourceAuth,
        priority: i32,
    },
    /// Last-resort HTTP backend
    Fallback {
        url: String,
        path: String,
        auth: SourceAuth,
        priority: i32,
    },
}

impl Source {
    pub fn priority(&self) -> i32 {
        match self {
            Source::R2 { priority, .. }
            | Source::Remote { priority, .. }
            | Source::Fallback { priority, .. } => *priority,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::R2 { .. } => SourceKind::R2,
            Source::Remote { .. } => SourceKind::Remote,
            Source::Fallback { .. } => SourceKind::Fallback,
        }
    }

    pub fn path_template(&self) -> &str {
        match self {
            Source::R2 { path, .. }
            | Source::Remote { path, .. }
            | Source::Fallback { path, .. } => path,
        }
    }

    pub fn auth(&self) -> Option<&SourceAuth> {
        match self {
            Source::R2 { .. } => None,
            Source::Remote { auth, .. } | Source::Fallback { auth, .. } => Some(auth),
        }
    }

    /// Identity within an origin: kind plus priority. Error recovery uses
    /// this to exclude a source that already failed for the request.
    pub fn identity(&self) -> (SourceKind, i32) {
        (self.kind(), self.priority())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_identity() {
        let source = Source::R2 {
            bucket_binding: "VIDEOS".into(),
            path: "${1}".into(),
            priority: 1,
        };
        assert_eq!(source.identity(), (SourceKind::R2, 1));
        assert_eq!(source.kind().as_str(), "r2");
        assert!(source.auth().is_none());
    }

    #[test]
    fn test_auth_type_wire_names() {
        let auth: AuthType = serde_json::from_str("\"aws-s3-presigned-url\"").unwrap();
        assert_eq!(auth, AuthType::AwsS3PresignedUrl);
        assert_eq!(auth.as_str(), "aws-s3-presigned-url");
    }
}
