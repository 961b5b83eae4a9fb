//! Bearer tokens and the claims a verifier extracts from them.

use chrono::{DateTime, Utc};
use policy::ScopeSet;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::{Error, Result};

/// Validated claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub subject: String,
    /// Scopes in the order the token listed them.
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub issuer: String,
    #[serde(default)]
    pub audience: Vec<String>,
}

impl TokenClaims {
    pub fn scope_set(&self) -> ScopeSet {
        ScopeSet::from_strings(&self.scopes)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Verifies a raw bearer token and extracts its claims.
///
/// Signature checks, JWKS retrieval and claim validation live behind this
/// trait; this crate only consumes the result.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> impl Future<Output = Result<TokenClaims>> + Send;
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer<'a>(header: Option<&'a str>, realm: &str) -> Result<&'a str> {
    let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
        return Err(Error::TokenMissing {
            realm: realm.to_string(),
        });
    };

    match header.split_once(|c: char| c.is_ascii_whitespace()) {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(Error::TokenInvalid("empty bearer token".to_string()))
            } else {
                Ok(token)
            }
        }
        _ => Err(Error::TokenInvalid(
            "authorization header is not a bearer token".to_string(),
        )),
    }
}

/// Extract, verify and expiry-check a bearer token.
pub async fn authenticate<V: TokenVerifier>(
    verifier: &V,
    header: Option<&str>,
    realm: &str,
) -> Result<TokenClaims> {
    let token = extract_bearer(header, realm)?;
    let claims = verifier.verify(token).await?;
    if claims.is_expired() {
        return Err(Error::TokenExpired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(scopes: &[&str], expires_in: Duration) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            subject: "agent-7".into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expires_at: now + expires_in,
            issued_at: now,
            issuer: "https://auth.example.com".into(),
            audience: vec!["dbgate".into()],
        }
    }

    struct StaticVerifier(TokenClaims);

    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<TokenClaims> {
            match token {
                "good" => Ok(self.0.clone()),
                "forged" => Err(Error::SignatureInvalid),
                other => Err(Error::TokenInvalid(format!("unknown token {other}"))),
            }
        }
    }

    #[test]
    fn extract_bearer_variants() {
        assert_eq!(extract_bearer(Some("Bearer abc"), "r").unwrap(), "abc");
        assert_eq!(extract_bearer(Some("bearer   abc "), "r").unwrap(), "abc");
        assert_eq!(extract_bearer(Some("Bearer\tabc"), "r").unwrap(), "abc");
        assert_eq!(extract_bearer(Some("Bearer \t abc"), "r").unwrap(), "abc");
        assert!(matches!(
            extract_bearer(None, "r"),
            Err(Error::TokenMissing { realm }) if realm == "r"
        ));
        assert!(matches!(extract_bearer(Some("  "), "r"), Err(Error::TokenMissing { .. })));
        assert!(matches!(extract_bearer(Some("Basic abc"), "r"), Err(Error::TokenInvalid(_))));
        assert!(matches!(extract_bearer(Some("Bearer"), "r"), Err(Error::TokenInvalid(_))));
    }

    #[test]
    fn scope_set_view_keeps_order() {
        let c = claims(&["db:sales", "read"], Duration::hours(1));
        assert_eq!(c.scope_set().to_string(), "db:sales read");
        assert!(c.scope_set().has_read());
    }

    #[test]
    fn expiry_is_inclusive() {
        let c = claims(&["read"], Duration::hours(1));
        assert!(!c.is_expired());
        assert!(c.is_expired_at(c.expires_at));
    }

    #[tokio::test]
    async fn authenticate_passes_through_verifier() {
        let verifier = StaticVerifier(claims(&["read"], Duration::hours(1)));
        let ok = authenticate(&verifier, Some("Bearer good"), "r").await.unwrap();
        assert_eq!(ok.subject, "agent-7");

        let err = authenticate(&verifier, Some("Bearer forged"), "r").await.unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid));

        let err = authenticate(&verifier, None, "r").await.unwrap_err();
        assert!(matches!(err, Error::TokenMissing { .. }));
    }

    #[tokio::test]
    async fn authenticate_rejects_expired_claims() {
        let verifier = StaticVerifier(claims(&["read"], Duration::seconds(-5)));
        let err = authenticate(&verifier, Some("Bearer good"), "r").await.unwrap_err();
        assert!(matches!(err, Error::TokenExpired));
    }
}
