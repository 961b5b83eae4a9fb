//! OAuth error types.
//!
//! Every failure carries what a transport needs to answer the client: an
//! HTTP status, an optional `WWW-Authenticate` challenge and structured
//! details. Mapping these onto the wire is left to the transport.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

/// Boxed cause for failures raised by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    SignatureInvalid,
    InsufficientScope,
    DiscoveryFailed,
    JwksFetchFailed,
    RegistrationFailed,
    NotDiscovered,
}

/// Why fetching authorization server metadata failed.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("invalid metadata document: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("metadata is missing required field `{0}`")]
    MissingField(&'static str),
}

/// OAuth errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No bearer token was presented.
    #[error("missing bearer token")]
    TokenMissing { realm: String },

    /// The token could not be parsed or its claims were rejected.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token expired")]
    TokenExpired,

    #[error("token signature is invalid")]
    SignatureInvalid,

    /// The token is valid but does not carry the scope the call needs.
    #[error("insufficient scope: requires {}", .required.join(" "))]
    InsufficientScope {
        required: Vec<String>,
        presented: Vec<String>,
        resource: Option<String>,
    },

    #[error("authorization server discovery failed: {0}")]
    DiscoveryFailed(#[from] DiscoveryError),

    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(#[source] BoxError),

    #[error("client registration failed: {0}")]
    RegistrationFailed(#[source] BoxError),

    /// Metadata was requested before any successful discovery.
    #[error("authorization server metadata has not been discovered")]
    NotDiscovered,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenMissing { .. } => ErrorKind::TokenMissing,
            Self::TokenInvalid(_) => ErrorKind::TokenInvalid,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::SignatureInvalid => ErrorKind::SignatureInvalid,
            Self::InsufficientScope { .. } => ErrorKind::InsufficientScope,
            Self::DiscoveryFailed(_) => ErrorKind::DiscoveryFailed,
            Self::JwksFetchFailed(_) => ErrorKind::JwksFetchFailed,
            Self::RegistrationFailed(_) => ErrorKind::RegistrationFailed,
            Self::NotDiscovered => ErrorKind::NotDiscovered,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::TokenMissing
            | ErrorKind::TokenInvalid
            | ErrorKind::TokenExpired
            | ErrorKind::SignatureInvalid => StatusCode::UNAUTHORIZED,
            ErrorKind::InsufficientScope => StatusCode::FORBIDDEN,
            ErrorKind::DiscoveryFailed
            | ErrorKind::JwksFetchFailed
            | ErrorKind::RegistrationFailed
            | ErrorKind::NotDiscovered => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `WWW-Authenticate` challenge for 401/403 errors.
    pub fn www_authenticate(&self) -> Option<String> {
        match self {
            Self::TokenMissing { realm } => Some(format!("Bearer realm={}", quote(realm))),
            Self::TokenInvalid(_) | Self::TokenExpired | Self::SignatureInvalid => {
                Some(r#"Bearer error="invalid_token""#.to_string())
            }
            Self::InsufficientScope {
                required,
                presented,
                ..
            } => {
                let presented = if presented.is_empty() {
                    "none".to_string()
                } else {
                    presented.join(" ")
                };
                Some(format!(
                    r#"Bearer error="insufficient_scope", scope={}, error_description={}"#,
                    quote(&required.join(" ")),
                    quote(&format!("presented scopes: {presented}")),
                ))
            }
            _ => None,
        }
    }

    /// Structured details for the response body, where there are any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InsufficientScope {
                required,
                presented,
                resource,
            } => Some(json!({
                "required": required,
                "presented": presented,
                "resource": resource,
            })),
            Self::DiscoveryFailed(DiscoveryError::Status(status)) => {
                Some(json!({ "upstream_status": status.as_u16() }))
            }
            Self::DiscoveryFailed(DiscoveryError::MissingField(field)) => {
                Some(json!({ "missing_field": field }))
            }
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.kind(),
            error_description: self.to_string(),
            status: self.status().as_u16(),
            www_authenticate: self.www_authenticate(),
            details: self.details(),
        }
    }
}

/// Serializable form of an [`Error`], for transports to render.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub error_description: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub www_authenticate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// RFC 7230 quoted-string.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
