//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate downstream URLs and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// Most downstream calls any pattern makes one after another (the chain).
pub const LONGEST_SEQUENCE: u64 = 3;

/// Time the longest sequential pattern may legitimately take: every call
/// running to its timeout, plus the local processing delay.
pub fn request_budget_ms(config: &ServiceConfig) -> u64 {
    config
        .timeouts
        .call_ms
        .saturating_mul(LONGEST_SEQUENCE)
        .saturating_add(config.process.delay_ms)
}

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: {value:?} is not an http(s) URL")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("timeouts.request_ms ({request_ms}) must exceed 3 x timeouts.call_ms + process.delay_ms ({budget_ms})")]
    RequestTimeoutTooShort { request_ms: u64, budget_ms: u64 },

    #[error("observability.otlp_endpoint: {value:?} is not an http(s) URL")]
    InvalidOtlpEndpoint { value: String },

    #[error("observability.service_name: must not be empty")]
    EmptyServiceName,
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    for (field, value) in [
        ("downstream.service_b_url", &config.downstream.service_b_url),
        ("downstream.service_c_url", &config.downstream.service_c_url),
    ] {
        if !is_http_url(value) {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }

    if config.timeouts.call_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.call_ms" });
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.request_ms" });
    } else if config.timeouts.request_ms <= request_budget_ms(config) {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_ms: config.timeouts.request_ms,
            budget_ms: request_budget_ms(config),
        });
    }

    if config.observability.service_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Some(endpoint) = &config.observability.otlp_endpoint {
        if !is_http_url(endpoint) {
            errors.push(ValidationError::InvalidOtlpEndpoint {
                value: endpoint.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
