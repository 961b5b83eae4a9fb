//! MCP tool surface for database capabilities.
//!
//! Tools are registered into a [`ToolRegistry`] under a capability filter and
//! invoked through a [`Dispatcher`], which checks every call against the
//! caller's token claims.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp::{CallToolParams, Dispatcher, ToolHandler, ToolRegistry};
//! use oauth::AccessGate;
//! use policy::CapabilityFilter;
//!
//! # async fn example(read_query: Arc<dyn ToolHandler>, claims: oauth::TokenClaims) -> mcp::Result<()> {
//! let mut registry = ToolRegistry::new(CapabilityFilter::from_env());
//! registry.register(read_query);
//!
//! let dispatcher = Dispatcher::new(registry, AccessGate::default());
//! let result = dispatcher
//!     .call_tool(Some(&claims), CallToolParams::new("read_query"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod error;
mod protocol;
mod registry;

pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcError, ListToolsResult, Tool, ToolContent,
};
pub use registry::{RegisteredTool, ToolHandler, ToolRegistry, resource_from_arguments};
