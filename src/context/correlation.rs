//! Correlation identifiers.
//!
//! # Responsibilities
//! - Represent the human-oriented identifier that joins logs of one request
//! - Read it from inbound headers under the historically used spellings
//! - Mint a fresh one when the caller did not send any
//!
//! # Design Decisions
//! - Inbound values are reused verbatim, never normalized
//! - Minted values combine a nanosecond timestamp and a random UUID prefix;
//!   unique with high probability, not cryptographically secure

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;

/// Canonical header carrying the correlation identifier.
pub const X_TRACE_ID: &str = "x-trace-id";

/// Legacy spelling still sent by some load balancers.
pub const X_AMZN_TRACE_ID: &str = "x-amzn-trace-id";

/// Headers checked for an inbound identifier, in priority order.
pub const INBOUND_HEADERS: [&str; 2] = [X_TRACE_ID, X_AMZN_TRACE_ID];

/// Per-request correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a new identifier: `trace-<unix nanos>-<8 hex chars>`.
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("trace-{}-{}", nanos, &random[..8]))
    }

    /// Look up an identifier in the inbound headers.
    ///
    /// Returns the identifier together with the header it was found under.
    /// Blank or non-visible-ASCII values are treated as absent.
    pub fn from_headers(headers: &HeaderMap) -> Option<(Self, &'static str)> {
        INBOUND_HEADERS.iter().find_map(|&name| {
            let value = headers.get(name)?.to_str().ok()?;
            if value.trim().is_empty() {
                return None;
            }
            Some((Self(value.to_string()), name))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
