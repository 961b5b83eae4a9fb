//! MCP error types.

use crate::protocol::JsonRpcError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No tool of that name is registered, either because it does not exist
    /// or because the capability filter left it out.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The caller's token does not permit the call.
    #[error(transparent)]
    Unauthorized(#[from] oauth::Error),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The JSON-RPC error object a transport should send back.
    pub fn to_json_rpc(&self) -> JsonRpcError {
        match self {
            Self::ToolNotFound(name) => JsonRpcError {
                code: JsonRpcError::INVALID_PARAMS,
                message: format!("Unknown tool: {name}"),
                data: None,
            },
            Self::Unauthorized(err) => JsonRpcError {
                code: JsonRpcError::UNAUTHORIZED,
                message: err.to_string(),
                data: Some(json!({
                    "error": err.kind(),
                    "status": err.status().as_u16(),
                    "www_authenticate": err.www_authenticate(),
                    "details": err.details(),
                })),
            },
            Self::InvalidArguments(msg) => JsonRpcError {
                code: JsonRpcError::INVALID_PARAMS,
                message: msg.clone(),
                data: None,
            },
            Self::ToolCallFailed(_) | Self::Serialize(_) => JsonRpcError {
                code: JsonRpcError::INTERNAL_ERROR,
                message: self.to_string(),
                data: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_invalid_params() {
        let rpc = Error::ToolNotFound("vacuum_database".into()).to_json_rpc();
        assert_eq!(rpc.code, JsonRpcError::INVALID_PARAMS);
        assert_eq!(rpc.message, "Unknown tool: vacuum_database");
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let err = Error::from(oauth::Error::TokenMissing {
            realm: "dbgate".into(),
        });
        let rpc = err.to_json_rpc();
        assert_eq!(rpc.code, JsonRpcError::UNAUTHORIZED);
        let data = rpc.data.unwrap();
        assert_eq!(data["status"], 401);
        assert_eq!(data["error"], "token_missing");
        assert_eq!(data["www_authenticate"], r#"Bearer realm="dbgate""#);
    }
}
