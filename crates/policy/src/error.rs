//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A scope string matched none of the known shapes.
    #[error("invalid scope: {0}")]
    InvalidScope(String),
}

pub type Result<T> = std::result::Result<T, Error>;
