//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. Every problem is reported,
//! not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("resources: duplicate resource name '{0}'")]
    DuplicateResource(String),
}

fn invalid(field: impl Into<String>, reason: &str) -> ValidationError {
    ValidationError::Invalid {
        field: field.into(),
        reason: reason.to_string(),
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(invalid("listener.bind_address", "not a socket address"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(invalid("observability.metrics_address", "not a socket address"));
    }
    if config.gateway.request_timeout_secs == 0 {
        errors.push(invalid("gateway.request_timeout_secs", "must be non-zero"));
    }
    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(invalid("admin.api_key", "must be set when admin is enabled"));
    }

    let guard = &config.guard;
    if guard.stat_window_ms == 0 {
        errors.push(invalid("guard.stat_window_ms", "must be non-zero"));
    }
    if guard.probe_quota == 0 {
        errors.push(invalid("guard.probe_quota", "must be at least 1"));
    }
    if guard.hotkey_capacity == 0 {
        errors.push(invalid("guard.hotkey_capacity", "must be at least 1"));
    }

    let mut seen = HashSet::new();
    for resource in &config.resources {
        let field = |name: &str| format!("resources.{}.{name}", resource.name);

        if resource.name.is_empty() {
            errors.push(invalid("resources.name", "must not be empty"));
        } else if !seen.insert(resource.name.as_str()) {
            errors.push(ValidationError::DuplicateResource(resource.name.clone()));
        }

        for (name, ratio) in [
            ("error_ratio_threshold", resource.error_ratio_threshold),
            ("slow_call_ratio_threshold", resource.slow_call_ratio_threshold),
        ] {
            if let Some(ratio) = ratio {
                if !(0.0..=1.0).contains(&ratio) {
                    errors.push(invalid(field(name), "must be within [0, 1]"));
                }
            }
        }
        if resource.error_ratio_window_ms == Some(0) {
            errors.push(invalid(field("error_ratio_window_ms"), "must be non-zero"));
        }
        if resource.slow_call_ratio_threshold.is_some() && resource.slow_call_threshold_ms.is_none() {
            errors.push(invalid(
                field("slow_call_threshold_ms"),
                "required when slow_call_ratio_threshold is set",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
