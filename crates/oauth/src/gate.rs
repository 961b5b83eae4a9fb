//! Per-call access decisions.

use std::collections::BTreeSet;

use policy::capability::all_capabilities;
use policy::{Resource, required_scope};

use crate::{Error, Result, TokenClaims};

/// Default realm used in `WWW-Authenticate` challenges.
pub const DEFAULT_REALM: &str = "dbgate";

/// Decides whether a caller's claims permit a capability call.
///
/// Which capabilities exist is settled earlier by the capability filter; the
/// gate only ever sees calls to registered capabilities.
#[derive(Debug, Clone)]
pub struct AccessGate {
    enabled: bool,
    realm: String,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(DEFAULT_REALM)
    }
}

impl AccessGate {
    /// A gate that requires a token on every call.
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            enabled: true,
            realm: realm.into(),
        }
    }

    /// A gate that lets everything through, for deployments without auth.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            realm: DEFAULT_REALM.to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Check a call against the caller's claims.
    ///
    /// Fails with `TokenMissing` when no claims were presented and with
    /// `InsufficientScope` when no scope grants the capability or the
    /// targeted database/table.
    pub fn authorize(
        &self,
        claims: Option<&TokenClaims>,
        capability: &str,
        resource: Option<&Resource>,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let Some(claims) = claims else {
            return Err(Error::TokenMissing {
                realm: self.realm.clone(),
            });
        };

        let scopes = claims.scope_set();

        if !scopes.grants_capability(capability) {
            tracing::debug!(
                subject = %claims.subject,
                capability = %capability,
                scopes = %scopes,
                "capability denied"
            );
            return Err(Error::InsufficientScope {
                required: vec![required_scope(capability).to_string()],
                presented: claims.scopes.clone(),
                resource: None,
            });
        }

        if let Some(resource) = resource {
            if !scopes.grants_resource(resource) {
                tracing::debug!(
                    subject = %claims.subject,
                    capability = %capability,
                    resource = %resource,
                    "resource denied"
                );
                return Err(Error::InsufficientScope {
                    required: vec![resource.required_scope().to_string()],
                    presented: claims.scopes.clone(),
                    resource: Some(resource.to_string()),
                });
            }
        }

        Ok(())
    }

    /// Whether the caller could invoke `capability` on some resource.
    pub fn permits(&self, claims: Option<&TokenClaims>, capability: &str) -> bool {
        self.authorize(claims, capability, None).is_ok()
    }

    /// Catalog capabilities the caller could invoke on some resource.
    ///
    /// Everything when the gate is disabled, nothing for anonymous callers.
    pub fn visible_capabilities(&self, claims: Option<&TokenClaims>) -> BTreeSet<&'static str> {
        if !self.enabled {
            return all_capabilities().collect();
        }
        match claims {
            Some(claims) => claims.scope_set().accessible_capabilities(),
            None => BTreeSet::new(),
        }
    }
}
