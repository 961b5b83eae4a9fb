//! Scope-based access policy for database tools.
//!
//! Two independent layers decide whether a tool can run:
//!
//! - the [`CapabilityFilter`], applied once at startup, decides which tools
//!   exist at all;
//! - the [`ScopeSet`] carried by a caller's token decides, per call, which of
//!   those tools and which databases the caller may use.

pub mod capability;
mod error;
pub mod filter;
mod scope;

pub use capability::{CapabilityGroup, MetaGroup, required_scope};
pub use error::{Error, Result};
pub use filter::{
    CapabilityFilter, Enabled, FILTER_ENV_VAR, FilterRule, FilterSummary, GroupSummary,
    RuleKind,
};
pub use scope::{BaseScope, Resource, SUPPORTED_SCOPES, Scope, ScopeSet};
