//! Tool registration under a capability filter.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use policy::{CapabilityFilter, Resource};
use serde_json::Value;

use crate::{CallToolResult, Result, Tool};

/// A tool the server can expose.
///
/// The tool's name doubles as the capability name checked by the filter and
/// the access gate.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;

    /// The database or table a call targets, if any.
    fn resource(&self, arguments: Option<&Value>) -> Option<Resource> {
        resource_from_arguments(arguments)
    }

    async fn call(&self, arguments: Option<Value>) -> Result<CallToolResult>;
}

/// Read the conventional `database` and optional `table` string arguments.
pub fn resource_from_arguments(arguments: Option<&Value>) -> Option<Resource> {
    let args = arguments?.as_object()?;
    let database = args.get("database")?.as_str()?;
    match args.get("table").and_then(Value::as_str) {
        Some(table) => Some(Resource::table(database, table)),
        None => Some(Resource::database(database)),
    }
}

/// A tool with its handler.
#[derive(Clone)]
pub struct RegisteredTool {
    pub tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    pub fn handler(&self) -> &dyn ToolHandler {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("tool", &self.tool.name)
            .finish_non_exhaustive()
    }
}

/// The set of tools a server exposes.
///
/// Tools the filter disables are never registered, so they are absent from
/// listings and unknown to dispatch.
#[derive(Debug)]
pub struct ToolRegistry {
    filter: CapabilityFilter,
    tools: BTreeMap<String, RegisteredTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(CapabilityFilter::allow_all())
    }
}

impl ToolRegistry {
    pub fn new(filter: CapabilityFilter) -> Self {
        Self {
            filter,
            tools: BTreeMap::new(),
        }
    }

    pub fn filter(&self) -> &CapabilityFilter {
        &self.filter
    }

    /// Register a tool if the filter enables it. Returns whether it was added.
    ///
    /// A second registration under the same name replaces the first.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> bool {
        let tool = handler.definition();
        if !self.filter.is_enabled(&tool.name) {
            tracing::debug!(tool = %tool.name, "tool disabled by filter");
            return false;
        }

        let name = tool.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { tool, handler })
            .is_some()
        {
            tracing::warn!(tool = %name, "tool registered twice, keeping the latest");
        }
        true
    }

    /// Registered tools, sorted by name.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.values().map(|r| r.tool.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
