//! Call outcomes and the error taxonomy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical response shape of a downstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownstreamResponse {
    pub service: String,
    pub message: String,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Failure category of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure or timeout.
    Transport,
    /// Non-2xx status.
    Http,
    /// 2xx with a body that is not a [`DownstreamResponse`].
    Decode,
    /// A downstream failure the orchestrator tolerated and reported as data.
    UpstreamPartial,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport_error",
            ErrorKind::Http => "http_error",
            ErrorKind::Decode => "decode_error",
            ErrorKind::UpstreamPartial => "upstream_partial",
        }
    }
}

/// Errors returned by [`OutboundClient::call`](crate::client::OutboundClient::call).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Transport(_) | CallError::Timeout(_) => ErrorKind::Transport,
            CallError::Http { .. } => ErrorKind::Http,
            CallError::Decode(_) => ErrorKind::Decode,
        }
    }
}

/// Result of one downstream call. Exactly one side is populated.
pub type CallOutcome = Result<DownstreamResponse, CallError>;
