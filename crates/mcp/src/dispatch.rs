//! Gated tool dispatch.

use oauth::{AccessGate, TokenClaims};

use crate::{CallToolParams, CallToolResult, Error, ListToolsResult, Result, ToolRegistry};

/// Routes tool calls through the access gate to registered handlers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: ToolRegistry,
    gate: AccessGate,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, gate: AccessGate) -> Self {
        Self { registry, gate }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Tools the caller may invoke on some resource.
    pub fn list_tools(&self, claims: Option<&TokenClaims>) -> ListToolsResult {
        let tools = self
            .registry
            .list_tools()
            .into_iter()
            .filter(|tool| self.gate.permits(claims, &tool.name))
            .collect();
        ListToolsResult { tools }
    }

    /// Authorize and run a tool call.
    ///
    /// Unregistered tools fail with `ToolNotFound` before any authorization,
    /// so a filtered-out tool looks the same as one that never existed.
    pub async fn call_tool(
        &self,
        claims: Option<&TokenClaims>,
        params: CallToolParams,
    ) -> Result<CallToolResult> {
        let CallToolParams { name, arguments } = params;

        let registered = self
            .registry
            .get(&name)
            .ok_or_else(|| Error::ToolNotFound(name.clone()))?;
        let handler = registered.handler();

        let resource = handler.resource(arguments.as_ref());
        if let Err(err) = self.gate.authorize(claims, &name, resource.as_ref()) {
            tracing::info!(
                tool = %name,
                subject = claims.map(|c| c.subject.as_str()).unwrap_or("anonymous"),
                error = %err,
                "tool call denied"
            );
            return Err(err.into());
        }

        tracing::debug!(tool = %name, "dispatching tool call");
        handler.call(arguments).await
    }
}
