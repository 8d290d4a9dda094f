//! Response envelope construction.
//!
//! # Responsibilities
//! - Wrap every outcome (success, tolerated failure, hard failure) in one
//!   reporting shape
//! - Carry the correlation identifier of the inbound request, even on
//!   total failure
//!
//! # Design Decisions
//! - `Envelope::build` is pure apart from capturing the timestamp
//! - The identifier is taken from the request's carrier only; identifiers
//!   reported by downstream services never flow back into it

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ContextCarrier;

/// Body of every response this service produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub service: String,
    pub message: String,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn build(
        service: &str,
        message: impl Into<String>,
        carrier: &ContextCarrier,
        payload: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            service: service.to_string(),
            message: message.into(),
            trace_id: carrier.correlation_id().to_string(),
            timestamp: Utc::now(),
            data: payload.map(Value::Object),
        }
    }
}

/// An envelope paired with the status it is sent with.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl Reply {
    pub fn new(status: StatusCode, envelope: Envelope) -> Self {
        Self { status, envelope }
    }

    pub fn ok(envelope: Envelope) -> Self {
        Self::new(StatusCode::OK, envelope)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
