//! Authorization server (RFC 8414) and protected resource (RFC 9728) metadata.

use crate::DiscoveryError;
use policy::SUPPORTED_SCOPES;
use serde::{Deserialize, Serialize};

/// Metadata published by an authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
}

/// The document as served, before required fields are checked.
#[derive(Debug, Deserialize)]
struct RawMetadata {
    issuer: Option<String>,
    token_endpoint: Option<String>,
    jwks_uri: Option<String>,
    registration_endpoint: Option<String>,
    scopes_supported: Option<Vec<String>>,
    authorization_endpoint: Option<String>,
    response_types_supported: Option<Vec<String>>,
    grant_types_supported: Option<Vec<String>>,
    code_challenge_methods_supported: Option<Vec<String>>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DiscoveryError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(DiscoveryError::MissingField(field))
}

impl TryFrom<RawMetadata> for AuthorizationServerMetadata {
    type Error = DiscoveryError;

    fn try_from(raw: RawMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            issuer: required(raw.issuer, "issuer")?,
            token_endpoint: required(raw.token_endpoint, "token_endpoint")?,
            jwks_uri: raw.jwks_uri,
            registration_endpoint: raw.registration_endpoint,
            scopes_supported: raw.scopes_supported,
            authorization_endpoint: raw.authorization_endpoint,
            response_types_supported: raw.response_types_supported,
            grant_types_supported: raw.grant_types_supported,
            code_challenge_methods_supported: raw.code_challenge_methods_supported,
        })
    }
}

impl AuthorizationServerMetadata {
    /// Parse and validate a metadata document.
    pub fn from_slice(body: &[u8]) -> Result<Self, DiscoveryError> {
        let raw: RawMetadata = serde_json::from_slice(body)?;
        raw.try_into()
    }

    pub fn supports_client_registration(&self) -> bool {
        self.registration_endpoint.is_some()
    }

    /// Servers that do not list their scopes are assumed to support any.
    pub fn is_scope_supported(&self, scope: &str) -> bool {
        match &self.scopes_supported {
            Some(scopes) => scopes.iter().any(|s| s == scope),
            None => true,
        }
    }
}

/// Metadata this server publishes about itself as a protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bearer_methods_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

impl ProtectedResourceMetadata {
    /// Path at which the document is served.
    pub const WELL_KNOWN_PATH: &'static str = "/.well-known/oauth-protected-resource";

    /// A document advertising the base scopes and header-borne bearer tokens.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            authorization_servers: Vec::new(),
            scopes_supported: SUPPORTED_SCOPES.iter().map(|s| s.to_string()).collect(),
            bearer_methods_supported: vec!["header".to_string()],
            resource_name: None,
        }
    }

    pub fn authorization_server(mut self, issuer: impl Into<String>) -> Self {
        self.authorization_servers.push(issuer.into());
        self
    }

    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }
}
