//! Shared error taxonomy (§7).
//!
//! Components raise [`CoreError`]; [`crate::server`] and [`crate::mcp`]
//! translate it into the HTTP and JSON-RPC response envelopes respectively,
//! so both surfaces share one mapping instead of duplicating match arms.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        CoreError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        CoreError::UpstreamUnavailable(msg.into())
    }

    /// A short machine-readable kind tag, shared by the HTTP error envelope
    /// and the MCP `CallToolResult` error payload so both surfaces agree on
    /// vocabulary for the same taxonomy.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::BadRequest(_) => "bad_request",
            CoreError::NotFound(_) => "not_found",
            CoreError::UpstreamUnavailable(_) => "upstream_unavailable",
            CoreError::Internal(_) => "internal",
        }
    }

    /// The structured error payload an MCP tool reports as `text` on a
    /// `CallToolResult` with `isError: true` (§6).
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({"error": self.to_string(), "code": self.kind()})
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
