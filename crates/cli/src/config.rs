//! Configuration loading from dbgate.toml.

use oauth::{DEFAULT_CACHE_TTL, DEFAULT_REALM, DEFAULT_TIMEOUT, Discovery, ProtectedResourceMetadata};
use policy::{CapabilityFilter, FILTER_ENV_VAR};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Token-based access control.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Require a bearer token on every tool call.
    pub enabled: bool,

    /// Authorization server issuer URL.
    pub issuer: Option<String>,

    /// Realm named in `WWW-Authenticate` challenges.
    pub realm: String,

    /// This server's resource identifier, for the protected resource document.
    pub resource: Option<String>,

    pub cache_ttl_secs: u64,

    pub timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: None,
            realm: DEFAULT_REALM.to_string(),
            resource: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Capability filter string, e.g. `"-admin,+vacuum_database"`.
    pub filter: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.enabled && self.auth.issuer.is_none() {
            return Err(ConfigError::MissingIssuer);
        }
        if self.auth.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// The filter string in effect; the environment wins over the file.
    pub fn filter_source(&self, env: Option<String>) -> Option<String> {
        env.or_else(|| self.tools.filter.clone())
    }

    /// Build the capability filter, reading the override from the environment.
    pub fn capability_filter(&self) -> CapabilityFilter {
        let source = self.filter_source(std::env::var(FILTER_ENV_VAR).ok());
        CapabilityFilter::parse(source.as_deref())
    }

    /// Discovery client for `issuer`, or the configured issuer.
    pub fn discovery(&self, issuer: Option<&str>) -> Result<Discovery, ConfigError> {
        let issuer = issuer
            .or(self.auth.issuer.as_deref())
            .ok_or(ConfigError::MissingIssuer)?;
        Ok(Discovery::builder(issuer)
            .cache_ttl(Duration::from_secs(self.auth.cache_ttl_secs))
            .timeout(Duration::from_millis(self.auth.timeout_ms))
            .build())
    }

    /// The document served at the protected resource well-known path.
    pub fn resource_metadata(&self) -> Result<ProtectedResourceMetadata, ConfigError> {
        let resource = self
            .auth
            .resource
            .as_deref()
            .ok_or(ConfigError::MissingResource)?;
        let mut doc = ProtectedResourceMetadata::new(resource).resource_name(&self.auth.realm);
        if let Some(issuer) = &self.auth.issuer {
            doc = doc.authorization_server(issuer);
        }
        Ok(doc)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("authorization server not configured: set auth.issuer or pass --issuer")]
    MissingIssuer,

    #[error("resource identifier not configured: set auth.resource")]
    MissingResource,

    #[error("auth.timeout_ms must be greater than zero")]
    ZeroTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.realm, "dbgate");
        assert_eq!(config.auth.cache_ttl_secs, 3600);
        assert_eq!(config.auth.timeout_ms, 5000);
        assert!(config.tools.filter.is_none());
    }

    #[test]
    fn full_config() {
        let config = Config::parse(
            r#"
            [auth]
            enabled = true
            issuer = "https://auth.example.com"
            realm = "warehouse"
            resource = "https://db.example.com/mcp"
            cache_ttl_secs = 60
            timeout_ms = 250

            [tools]
            filter = "starter,+export_csv"
            "#,
        )
        .unwrap();
        assert!(config.auth.enabled);
        assert_eq!(config.auth.realm, "warehouse");

        let discovery = config.discovery(None).unwrap();
        assert_eq!(discovery.issuer_url(), "https://auth.example.com");
        assert_eq!(discovery.cache_ttl(), Duration::from_secs(60));
        assert_eq!(discovery.timeout(), Duration::from_millis(250));

        let doc = config.resource_metadata().unwrap();
        assert_eq!(doc.authorization_servers, ["https://auth.example.com"]);
        assert_eq!(doc.resource_name.as_deref(), Some("warehouse"));
    }

    #[test]
    fn enabled_auth_requires_issuer() {
        let err = Config::parse("[auth]\nenabled = true").unwrap_err();
        assert!(matches!(err, ConfigError::MissingIssuer));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::parse("[auth]\ntimeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("[tools]\nfliter = \"-admin\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_file_filter() {
        let config = Config::parse("[tools]\nfilter = \"-admin\"").unwrap();
        assert_eq!(config.filter_source(None).as_deref(), Some("-admin"));
        assert_eq!(
            config.filter_source(Some("minimal".into())).as_deref(),
            Some("minimal")
        );
    }

    #[test]
    fn explicit_issuer_wins() {
        let config = Config::default();
        assert!(matches!(config.discovery(None), Err(ConfigError::MissingIssuer)));
        let discovery = config.discovery(Some("https://other.example.com/")).unwrap();
        assert_eq!(discovery.issuer_url(), "https://other.example.com");
    }

    #[test]
    fn resource_metadata_requires_resource() {
        assert!(matches!(
            Config::default().resource_metadata(),
            Err(ConfigError::MissingResource)
        ));
    }
}
