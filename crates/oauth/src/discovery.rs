//! Authorization server discovery (RFC 8414) with a TTL cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::ACCEPT;
use tracing::{debug, info, warn};

use crate::{AuthorizationServerMetadata, DiscoveryError, Error, Result};

/// Default lifetime of cached metadata.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default bound on a single discovery request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Path appended to the issuer to locate its metadata.
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

#[derive(Debug, Clone)]
struct CachedMetadata {
    metadata: Arc<AuthorizationServerMetadata>,
    /// `None` when the TTL is too large to represent.
    expires_at: Option<Instant>,
    fetched_at: DateTime<Utc>,
}

impl CachedMetadata {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// Cache for discovered metadata, keyed by normalized issuer URL.
///
/// Shared between collaborators through an `Arc`. Each store replaces the
/// whole entry for its issuer and leaves other issuers alone.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, CachedMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached metadata for `issuer`, if present and not yet expired.
    pub fn fresh(&self, issuer: &str) -> Option<Arc<AuthorizationServerMetadata>> {
        self.entries
            .read()
            .get(issuer)
            .filter(|e| e.is_fresh())
            .map(|e| Arc::clone(&e.metadata))
    }

    /// Cached metadata for `issuer` regardless of expiry.
    pub fn get(&self, issuer: &str) -> Option<Arc<AuthorizationServerMetadata>> {
        self.entries.read().get(issuer).map(|e| Arc::clone(&e.metadata))
    }

    pub fn store(&self, issuer: &str, metadata: Arc<AuthorizationServerMetadata>, ttl: Duration) {
        let entry = CachedMetadata {
            metadata,
            expires_at: Instant::now().checked_add(ttl),
            fetched_at: Utc::now(),
        };
        self.entries.write().insert(issuer.to_string(), entry);
    }

    /// Forget the entry for `issuer`.
    pub fn remove(&self, issuer: &str) {
        self.entries.write().remove(issuer);
    }

    /// Forget every issuer.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn is_valid(&self, issuer: &str) -> bool {
        self.entries
            .read()
            .get(issuer)
            .is_some_and(CachedMetadata::is_fresh)
    }

    /// Wall-clock time of the last successful fetch for `issuer`.
    pub fn fetched_at(&self, issuer: &str) -> Option<DateTime<Utc>> {
        self.entries.read().get(issuer).map(|e| e.fetched_at)
    }
}

/// Builder for [`Discovery`].
#[derive(Debug, Clone)]
pub struct DiscoveryBuilder {
    issuer: String,
    cache_ttl: Duration,
    timeout: Duration,
    client: Option<reqwest::Client>,
    cache: Option<Arc<MetadataCache>>,
}

impl DiscoveryBuilder {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
            client: None,
            cache: None,
        }
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reuse an existing HTTP client.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Share a cache with other collaborators.
    pub fn cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Discovery {
        Discovery {
            issuer: self.issuer.trim_end_matches('/').to_string(),
            cache_ttl: self.cache_ttl,
            timeout: self.timeout,
            client: self.client.unwrap_or_default(),
            cache: self.cache.unwrap_or_default(),
        }
    }
}

/// Discovers and caches an authorization server's metadata.
///
/// Concurrent cold calls may each fetch; the last successful fetch wins.
/// A failed fetch leaves the cache as it was.
#[derive(Debug)]
pub struct Discovery {
    issuer: String,
    cache_ttl: Duration,
    timeout: Duration,
    client: reqwest::Client,
    cache: Arc<MetadataCache>,
}

impl Discovery {
    /// Discovery for `issuer` with default TTL and timeout.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self::builder(issuer).build()
    }

    pub fn builder(issuer: impl Into<String>) -> DiscoveryBuilder {
        DiscoveryBuilder::new(issuer)
    }

    /// The configured issuer, without trailing slashes.
    pub fn issuer_url(&self) -> &str {
        &self.issuer
    }

    pub fn metadata_url(&self) -> String {
        format!("{}{WELL_KNOWN_PATH}", self.issuer)
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return cached metadata, fetching it if absent or expired.
    pub async fn discover(&self) -> Result<Arc<AuthorizationServerMetadata>> {
        if let Some(metadata) = self.cache.fresh(&self.issuer) {
            debug!(issuer = %self.issuer, "using cached authorization server metadata");
            return Ok(metadata);
        }

        let metadata = self.fetch().await.map_err(|e| {
            warn!(issuer = %self.issuer, error = %e, "authorization server discovery failed");
            Error::DiscoveryFailed(e)
        })?;

        if metadata.issuer != self.issuer {
            warn!(
                expected = %self.issuer,
                actual = %metadata.issuer,
                "authorization server reports a different issuer"
            );
        }

        info!(
            issuer = %metadata.issuer,
            token_endpoint = %metadata.token_endpoint,
            "discovered authorization server metadata"
        );

        let metadata = Arc::new(metadata);
        self.cache.store(&self.issuer, Arc::clone(&metadata), self.cache_ttl);
        Ok(metadata)
    }

    async fn fetch(&self) -> std::result::Result<AuthorizationServerMetadata, DiscoveryError> {
        let url = self.metadata_url();
        let request = async {
            let response = self
                .client
                .get(&url)
                .header(ACCEPT, "application/json")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(DiscoveryError::Status(status));
            }

            let body = response.bytes().await?;
            let metadata = AuthorizationServerMetadata::from_slice(&body)?;
            Ok::<_, DiscoveryError>(metadata)
        };

        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| DiscoveryError::Timeout(self.timeout))?
    }

    fn metadata(&self) -> Result<Arc<AuthorizationServerMetadata>> {
        self.cache.get(&self.issuer).ok_or(Error::NotDiscovered)
    }

    /// The issuer the server reported, which may differ from [`issuer_url`](Self::issuer_url).
    pub fn issuer(&self) -> Result<String> {
        Ok(self.metadata()?.issuer.clone())
    }

    pub fn token_endpoint(&self) -> Result<String> {
        Ok(self.metadata()?.token_endpoint.clone())
    }

    pub fn jwks_uri(&self) -> Result<Option<String>> {
        Ok(self.metadata()?.jwks_uri.clone())
    }

    pub fn registration_endpoint(&self) -> Result<Option<String>> {
        Ok(self.metadata()?.registration_endpoint.clone())
    }

    pub fn supports_client_registration(&self) -> Result<bool> {
        Ok(self.metadata()?.supports_client_registration())
    }

    pub fn supported_scopes(&self) -> Result<Option<Vec<String>>> {
        Ok(self.metadata()?.scopes_supported.clone())
    }

    pub fn is_scope_supported(&self, scope: &str) -> Result<bool> {
        Ok(self.metadata()?.is_scope_supported(scope))
    }

    /// Forget this issuer's cached metadata.
    pub fn clear_cache(&self) {
        self.cache.remove(&self.issuer);
    }

    pub fn is_cache_valid(&self) -> bool {
        self.cache.is_valid(&self.issuer)
    }

    /// Wall-clock time of this issuer's last successful fetch.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.cache.fetched_at(&self.issuer)
    }
}
