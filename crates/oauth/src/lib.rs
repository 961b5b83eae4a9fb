//! OAuth resource-server support.
//!
//! This crate discovers the authorization server that issues our tokens,
//! defines the boundary with the external token verifier, and turns a
//! caller's claims into an allow/deny decision for each tool call.
//!
//! # Example
//!
//! ```no_run
//! use oauth::{AccessGate, Discovery};
//! use std::time::Duration;
//!
//! # async fn example() -> oauth::Result<()> {
//! let discovery = Discovery::builder("https://auth.example.com")
//!     .cache_ttl(Duration::from_secs(600))
//!     .build();
//!
//! let metadata = discovery.discover().await?;
//! println!("tokens are issued at {}", metadata.token_endpoint);
//! println!("keys live at {:?}", discovery.jwks_uri()?);
//!
//! let gate = AccessGate::new("dbgate");
//! assert!(gate.authorize(None, "read_query", None).is_err());
//! # Ok(())
//! # }
//! ```

mod discovery;
mod error;
mod gate;
mod metadata;
mod token;

pub use discovery::{
    DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT, Discovery, DiscoveryBuilder, MetadataCache, WELL_KNOWN_PATH,
};
pub use error::{BoxError, DiscoveryError, Error, ErrorKind, ErrorResponse, Result};
pub use gate::{AccessGate, DEFAULT_REALM};
pub use metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};
pub use token::{TokenClaims, TokenVerifier, authenticate, extract_bearer};
